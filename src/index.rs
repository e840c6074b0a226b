//! Cursor abstractions for the producer-owned head and the claimable tail.

use crate::sync::{AtomicUsize, Ordering, spin_loop};

// ── HeadIndex (written by the producer only) ──────────────────────────

/// Position of the next slot the producer will write.
///
/// Only the producer stores to it. Consumers read it relaxed and pair the
/// read with an Acquire fence before touching slot data.
#[repr(transparent)]
pub struct HeadIndex(AtomicUsize);

impl HeadIndex {
    #[inline]
    pub fn new(pos: usize) -> Self {
        Self(AtomicUsize::new(pos))
    }

    #[inline]
    pub fn load_relaxed(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }

    /// Publish a new head. Callers issue the Release fence first.
    #[inline]
    pub fn store_relaxed(&self, pos: usize) {
        self.0.store(pos, Ordering::Relaxed);
    }

    /// Load without atomics (exclusive access).
    #[inline]
    pub fn load_mut(&mut self) -> usize {
        #[cfg(not(loom))]
        {
            *self.0.get_mut()
        }
        #[cfg(loom)]
        {
            self.0.with_mut(|v| *v)
        }
    }
}

// ── TailCursor (claimed by consumers, CAS'd by the producer) ──────────

/// Tag bit marking the tail as claimed by a consumer.
pub const LOCKED: usize = 1 << (usize::BITS - 1);

/// Tag bit set by the producer on a claim whose slot it wanted to evict.
pub const DEFERRED: usize = 1 << (usize::BITS - 2);

const POSITION: usize = !(LOCKED | DEFERRED);

/// Positions must stay below this bound so the tag bits never collide.
pub const MAX_POSITION: usize = POSITION;

/// Decoded tail word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailState {
    /// Oldest live slot, free for a consumer to claim.
    Unlocked(usize),
    /// A consumer holds `pos`. `deferred` means the producer needed that slot
    /// and published a head equal to it, so the arena is full rather than empty.
    Locked { pos: usize, deferred: bool },
}

impl TailState {
    #[inline]
    const fn decode(raw: usize) -> Self {
        let pos = raw & POSITION;
        if raw & LOCKED == 0 {
            Self::Unlocked(pos)
        } else {
            Self::Locked {
                pos,
                deferred: raw & DEFERRED != 0,
            }
        }
    }

    /// Position regardless of tags.
    #[inline]
    pub const fn position(self) -> usize {
        match self {
            Self::Unlocked(pos) | Self::Locked { pos, .. } => pos,
        }
    }
}

/// Outcome of the producer's attempt to evict ahead of its write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eviction {
    /// Tail moved past `next_head`; the producer now owns that slot's element.
    Claimed,
    /// A consumer is removing the element at `next_head`; the claim was tagged.
    Deferred,
    /// Tail was elsewhere, nothing to do.
    NotNeeded,
}

/// Tail word: an unlocked position or a consumer claim on one.
#[repr(transparent)]
pub struct TailCursor(AtomicUsize);

impl TailCursor {
    #[inline]
    pub fn new(pos: usize) -> Self {
        debug_assert!(pos <= MAX_POSITION);
        Self(AtomicUsize::new(pos))
    }

    #[inline]
    pub fn state(&self) -> TailState {
        TailState::decode(self.0.load(Ordering::Acquire))
    }

    /// Spin until this consumer holds the tail. Returns the claimed position.
    ///
    /// Waits at most as long as another consumer's critical section.
    #[inline]
    pub fn claim(&self) -> TailClaim<'_> {
        loop {
            let prev = self.0.fetch_or(LOCKED, Ordering::Acquire);
            if prev & LOCKED == 0 {
                return TailClaim {
                    cursor: self,
                    pos: prev & POSITION,
                };
            }
            spin_loop();
        }
    }

    /// Producer-side eviction check for the slot at `next_head`.
    ///
    /// Retries only when the tail word changed under it, which requires a
    /// consumer to make progress on that exact slot.
    pub fn evict(&self, next_head: usize, next_tail: usize) -> Eviction {
        let mut expected = next_head;
        loop {
            let desired = match TailState::decode(expected) {
                TailState::Unlocked(pos) if pos == next_head => next_tail,
                TailState::Locked {
                    pos,
                    deferred: false,
                } if pos == next_head => expected | DEFERRED,
                _ => return Eviction::NotNeeded,
            };
            match self.0.compare_exchange(
                expected,
                desired,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) if desired & LOCKED == 0 => return Eviction::Claimed,
                Ok(_) => return Eviction::Deferred,
                Err(actual) => expected = actual,
            }
        }
    }

    /// Spin while a deferred claim is held on `pos`.
    #[inline]
    pub fn wait_deferred(&self, pos: usize) {
        let held = pos | LOCKED | DEFERRED;
        while self.0.load(Ordering::Acquire) == held {
            spin_loop();
        }
    }

    /// Load without atomics (exclusive access). No claim can be outstanding.
    #[inline]
    pub fn load_mut(&mut self) -> usize {
        #[cfg(not(loom))]
        let raw = *self.0.get_mut();
        #[cfg(loom)]
        let raw = self.0.with_mut(|v| *v);
        debug_assert_eq!(raw & LOCKED, 0, "tail claimed during exclusive access");
        raw & POSITION
    }
}

/// A consumer's hold on the tail.
///
/// Dropping the claim releases the original position, so an unwind between
/// claim and commit leaves the cursor as it was.
#[must_use = "dropping a claim releases it immediately"]
pub struct TailClaim<'a> {
    cursor: &'a TailCursor,
    pos: usize,
}

impl TailClaim<'_> {
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Hand the tail back at the claimed position, unless the producer tagged
    /// the claim while it was held. A tagged claim is returned: the producer
    /// wrapped around onto this slot, so it holds a live element after all.
    #[inline]
    pub fn release_unchanged(self) -> Result<(), Self> {
        let held = self.pos | LOCKED;
        match self
            .cursor
            .0
            .compare_exchange(held, self.pos, Ordering::Release, Ordering::Acquire)
        {
            Ok(_) => {
                core::mem::forget(self);
                Ok(())
            }
            Err(_) => Err(self),
        }
    }

    /// Release the tail at `pos`, clearing both tags.
    #[inline]
    pub fn release(mut self, pos: usize) {
        self.pos = pos;
    }
}

impl Drop for TailClaim<'_> {
    #[inline]
    fn drop(&mut self) {
        self.cursor.0.store(self.pos, Ordering::Release);
    }
}
