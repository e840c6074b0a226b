//! Overwriting ring buffer with a single producer and claimable tail.

use alloc::{boxed::Box, vec::Vec};
use core::{
    convert::Infallible,
    fmt,
    mem::{self, MaybeUninit},
    ops::Deref,
    ptr,
};

use snafu::{OptionExt, ensure};

use crate::{
    builder::RingBuilder,
    error::{AllocationFailureSnafu, InvalidCapacitySnafu, Result},
    index::{Eviction, HeadIndex, MAX_POSITION, TailClaim, TailCursor, TailState},
    sync::{AtomicUsize, Ordering, UnsafeCell, fence},
    traits::{RingConsumer, RingInfo, RingProducer},
};

/// Slot wrapper holding one element of the arena.
///
/// All access goes through the cell's `with`/`with_mut`, so loom models see
/// every element write, read and drop.
#[repr(transparent)]
pub(crate) struct Slot<T> {
    data: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Slot<T> {
    fn new() -> Self {
        Self {
            data: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    /// Fill the slot's bytes with zeros. No `T` is produced.
    #[inline]
    fn zero(&mut self) {
        self.data.with_mut(|p| unsafe { ptr::write_bytes(p, 0, 1) });
    }

    /// # Safety
    ///
    /// The slot is empty and owned by the caller.
    #[inline]
    unsafe fn write(&self, item: T) {
        self.data.with_mut(|p| unsafe { p.cast::<T>().write(item) });
    }

    /// # Safety
    ///
    /// The slot is live and owned by the caller; it is empty afterwards.
    #[inline]
    unsafe fn read(&self) -> T {
        self.data.with(|p| unsafe { p.cast::<T>().read() })
    }

    /// # Safety
    ///
    /// Same as [`read`](Self::read).
    #[inline]
    unsafe fn drop_in_place(&self) {
        self.data.with_mut(|p| unsafe { ptr::drop_in_place(p.cast::<T>()) });
    }
}

/// Keeps its contents on a cache line of their own.
///
/// 64 bytes is correct for x86-64 and most ARM64 server cores.
#[repr(C, align(64))]
struct CachePadded<T>(T);

impl<T> Deref for CachePadded<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.0
    }
}

/// Fixed-capacity ring buffer that overwrites its oldest element when full.
///
/// One producer inserts without ever blocking or failing; when the ring is
/// full the oldest element is dropped to make room. Any number of consumers
/// may call [`try_remove`](Self::try_remove) concurrently; removals are
/// serialized by a short claim on the tail cursor and never block the producer.
///
/// The arena holds `capacity + 1` slots so that `head == tail` always means
/// empty. Producer methods on the ring take `&mut self`; use
/// [`split`](Self::split) to drive it from separate threads.
///
/// # Ordering
///
/// Elements come out in insertion order, minus those evicted. When the
/// producer wants to evict the exact element a consumer is removing at that
/// moment, it leaves that element to the consumer instead; the next insertion
/// re-checks and evicts as usual.
#[repr(C)]
pub struct SwmrRing<T> {
    // ── Producer cache line (producer writes head, consumers read it) ──
    head: CachePadded<HeadIndex>,

    // ── Consumer cache line (consumers claim tail, producer CASes it) ──
    tail: CachePadded<TailCursor>,

    // ── Cold fields ──────────────────────────────────────────────────
    arena: Box<[Slot<T>]>,
    /// Elements dropped by the producer to make room. Producer-written.
    evictions: AtomicUsize,
}

unsafe impl<T: Send> Send for SwmrRing<T> {}
unsafe impl<T: Send> Sync for SwmrRing<T> {}

impl<T> SwmrRing<T> {
    /// Create a builder for configuring a [`SwmrRing`].
    ///
    /// # Example
    ///
    /// ```
    /// use swmr_ring::SwmrRing;
    ///
    /// let ring = SwmrRing::<u64>::builder()
    ///     .capacity(256)
    ///     .cold()
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(ring.capacity(), 256);
    /// ```
    #[must_use]
    pub fn builder() -> RingBuilder<T> {
        RingBuilder::new()
    }

    /// Create a ring holding up to `capacity` elements, with pre-warmed slots.
    ///
    /// # Errors
    ///
    /// [`InvalidCapacity`](crate::Error::InvalidCapacity) if `capacity` is zero,
    /// [`AllocationFailure`](crate::Error::AllocationFailure) if the arena
    /// cannot be allocated.
    pub fn new(capacity: usize) -> Result<Self> {
        Self::builder().capacity(capacity).build()
    }

    pub(crate) fn with_config(capacity: usize, warm: bool) -> Result<Self> {
        ensure!(capacity != 0, InvalidCapacitySnafu);
        let slots = capacity
            .checked_add(1)
            .filter(|&slots| slots <= MAX_POSITION)
            .context(AllocationFailureSnafu { capacity })?;

        let mut arena = Vec::new();
        arena
            .try_reserve_exact(slots)
            .ok()
            .context(AllocationFailureSnafu { capacity })?;
        arena.resize_with(slots, Slot::new);

        let mut ring = Self {
            head: CachePadded(HeadIndex::new(0)),
            tail: CachePadded(TailCursor::new(0)),
            arena: arena.into_boxed_slice(),
            evictions: AtomicUsize::new(0),
        };
        if warm {
            ring.warm();
        }
        log::debug!("swmr ring ready: capacity {capacity}, {slots} slots, warm: {warm}");
        Ok(ring)
    }

    /// Fault every slot into memory before first use.
    ///
    /// Writes zeroed bytes into uninitialized storage; no `T` is produced.
    fn warm(&mut self) {
        for slot in self.arena.iter_mut() {
            slot.zero();
        }
    }

    #[inline]
    fn advance(&self, pos: usize) -> usize {
        if pos + 1 == self.arena.len() { 0 } else { pos + 1 }
    }

    // ── Producer ─────────────────────────────────────────────────────

    /// Producer step shared by the ring and the [`Producer`](crate::Producer) handle.
    ///
    /// # Safety
    ///
    /// No other call may run on the same ring while this one does, whether
    /// from another thread or re-entered from `make` or an evicted element's
    /// destructor. Callers hold `&mut` to the ring or to its only producer.
    pub(crate) unsafe fn produce<E>(
        &self,
        make: impl FnOnce() -> Result<T, E>,
    ) -> Result<(), E> {
        let head = self.head.load_relaxed();
        let next_head = self.advance(head);

        // The previous call left `head` to a consumer; wait for it to move out.
        self.tail.wait_deferred(head);

        match self.tail.evict(next_head, self.advance(next_head)) {
            Eviction::Claimed => {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                // Safety: tail moved past `next_head`, which held the oldest
                // live element. No consumer can claim it any more.
                unsafe { self.arena[next_head].drop_in_place() };
            }
            Eviction::Deferred => {
                log::trace!("eviction of slot {next_head} left to the consumer holding it");
            }
            Eviction::NotNeeded => {}
        }

        let item = make()?;
        // Safety: `head` is outside the live range and not held by a consumer.
        unsafe { self.arena[head].write(item) };

        // Element writes must be visible before the new head is.
        fence(Ordering::Release);
        self.head.store_relaxed(next_head);
        Ok(())
    }

    /// Insert an element. If the ring is full, the oldest element is dropped.
    #[inline]
    pub fn insert(&mut self, item: T) {
        self.insert_with(|| item);
    }

    /// Insert an element built by `make`.
    ///
    /// `make` runs after any eviction this call performs. If it panics, the
    /// eviction stands and nothing is inserted.
    #[inline]
    pub fn insert_with(&mut self, make: impl FnOnce() -> T) {
        let Ok(()) = self.try_insert_with(|| Ok::<T, Infallible>(make()));
    }

    /// Insert an element built by a fallible `make`.
    ///
    /// # Errors
    ///
    /// Returns the error from `make`. The ring stays usable and unchanged,
    /// except that an eviction performed by this call is not undone.
    #[inline]
    pub fn try_insert_with<E>(&mut self, make: impl FnOnce() -> Result<T, E>) -> Result<(), E> {
        // Safety: `&mut self` rules out any other producer.
        unsafe { self.produce(make) }
    }

    // ── Consumer ─────────────────────────────────────────────────────

    /// Remove the oldest element, or `None` if the ring is empty.
    ///
    /// Safe to call from any number of threads at once. Waits only while
    /// another consumer is mid-removal.
    #[must_use]
    pub fn try_remove(&self) -> Option<T> {
        self.remove_claimed(self.tail.claim())
    }

    fn remove_claimed(&self, claim: TailClaim<'_>) -> Option<T> {
        let pos = claim.position();

        let head = self.head.load_relaxed();
        // Pairs with the producer's Release fence.
        fence(Ordering::Acquire);

        let claim = if head == pos {
            match claim.release_unchanged() {
                Ok(()) => return None,
                // The producer filled the arena around this claim.
                Err(claim) => claim,
            }
        } else {
            claim
        };

        // Safety: `pos` is the oldest live slot and this consumer holds it.
        let item = unsafe { self.arena[pos].read() };
        claim.release(self.advance(pos));
        Some(item)
    }

    /// Remove the oldest element into `out`. Returns `false` if empty.
    ///
    /// The value previously in `out` is dropped after the tail is released,
    /// so a panicking destructor there cannot leave the ring claimed.
    pub fn try_remove_into(&self, out: &mut T) -> bool {
        match self.try_remove() {
            Some(item) => {
                drop(mem::replace(out, item));
                true
            }
            None => false,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Number of elements in the ring.
    ///
    /// Exact when no other thread is operating on the ring; a snapshot
    /// otherwise.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        let head = self.head.load_relaxed();
        let slots = self.arena.len();
        match self.tail.state() {
            // The producer wrapped onto a claimed slot: full, not empty.
            TailState::Locked {
                pos,
                deferred: true,
            } if pos == head => slots - 1,
            state => ((head + slots - state.position()) % slots).min(slots - 1),
        }
    }

    /// True if empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if full: the next insertion will evict.
    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity()
    }

    /// Maximum number of live elements.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.arena.len() - 1
    }

    /// Number of elements the producer has dropped to make room.
    #[inline]
    #[must_use]
    pub fn evictions(&self) -> usize {
        self.evictions.load(Ordering::Relaxed)
    }

    // ── Exclusive access ─────────────────────────────────────────────

    /// Drain all elements, oldest first.
    #[inline]
    pub fn drain(&mut self) -> Drain<'_, T> {
        Drain { ring: self }
    }

    /// Drop every element.
    pub fn clear(&mut self) {
        self.drain().for_each(drop);
    }
}

/// Draining iterator over a [`SwmrRing`].
pub struct Drain<'a, T> {
    ring: &'a mut SwmrRing<T>,
}

impl<T> Iterator for Drain<'_, T> {
    type Item = T;

    #[inline]
    fn next(&mut self) -> Option<T> {
        self.ring.try_remove()
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.ring.len();
        (len, Some(len))
    }
}

impl<T> ExactSizeIterator for Drain<'_, T> {}

impl<T> Extend<T> for SwmrRing<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.insert(item);
        }
    }
}

impl<T> fmt::Debug for SwmrRing<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwmrRing")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .field("evictions", &self.evictions())
            .finish()
    }
}

/// Drops the live slots still owed, oldest first.
///
/// Teardown runs [`drop_all`](Self::drop_all) in the body and again from
/// `Drop`, so a panicking destructor does not skip the elements after it.
struct LiveSlots<'a, T> {
    arena: &'a [Slot<T>],
    pos: usize,
    remaining: usize,
}

impl<T> LiveSlots<'_, T> {
    fn drop_all(&mut self) {
        while self.remaining > 0 {
            let slot = &self.arena[self.pos];
            self.pos = if self.pos + 1 == self.arena.len() { 0 } else { self.pos + 1 };
            self.remaining -= 1;
            // Safety: each live slot is visited once; the cursor moved first.
            unsafe { slot.drop_in_place() };
        }
    }
}

impl<T> Drop for LiveSlots<'_, T> {
    fn drop(&mut self) {
        self.drop_all();
    }
}

impl<T> Drop for SwmrRing<T> {
    fn drop(&mut self) {
        let head = self.head.0.load_mut();
        let tail = self.tail.0.load_mut();
        let slots = self.arena.len();
        let live = (head + slots - tail) % slots;
        log::trace!("dropping swmr ring with {live} live elements");

        if !mem::needs_drop::<T>() {
            return;
        }

        // Exactly the slots in [tail, head) hold live elements. The arena
        // itself is freed by its own drop, after this, even on unwind.
        LiveSlots {
            arena: &self.arena,
            pos: tail,
            remaining: live,
        }
        .drop_all();
    }
}

impl<T> RingInfo for SwmrRing<T> {
    #[inline]
    fn len(&self) -> usize {
        SwmrRing::len(self)
    }

    #[inline]
    fn capacity(&self) -> usize {
        SwmrRing::capacity(self)
    }
}

impl<T> RingProducer<T> for SwmrRing<T> {
    #[inline]
    fn insert(&mut self, item: T) {
        SwmrRing::insert(self, item);
    }
}

impl<T> RingConsumer<T> for SwmrRing<T> {
    #[inline]
    fn try_remove(&self) -> Option<T> {
        SwmrRing::try_remove(self)
    }
}
