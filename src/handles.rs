//! Typed producer and consumer handles for concurrent use.

use core::{cell::Cell, fmt, marker::PhantomData};

use crate::{
    SwmrRing,
    sync::Arc,
    traits::{RingConsumer, RingInfo, RingProducer},
};

impl<T> SwmrRing<T> {
    /// Split into a producer handle and a consumer handle.
    ///
    /// The producer is neither `Clone` nor `Sync` and inserts through
    /// `&mut self`, so exactly one insertion runs at a time. The consumer is `Clone`: hand a copy to every
    /// thread that removes. The ring is dropped with its last handle.
    ///
    /// # Example
    ///
    /// ```
    /// use swmr_ring::SwmrRing;
    /// use std::thread;
    ///
    /// let (mut producer, consumer) = SwmrRing::<u64>::new(256).unwrap().split();
    ///
    /// let t = thread::spawn(move || {
    ///     for i in 0..100 {
    ///         producer.insert(i);
    ///     }
    /// });
    ///
    /// t.join().unwrap();
    /// let mut seen = Vec::new();
    /// while let Some(val) = consumer.try_remove() {
    ///     seen.push(val);
    /// }
    /// assert_eq!(seen, (0..100).collect::<Vec<_>>());
    /// ```
    pub fn split(self) -> (Producer<T>, Consumer<T>) {
        let arc = Arc::new(self);
        (
            Producer {
                ring: Arc::clone(&arc),
                _not_sync: PhantomData,
            },
            Consumer { ring: arc },
        )
    }
}

/// Producer handle for a [`SwmrRing`]. Can only insert.
///
/// Created by [`SwmrRing::split()`]. Not `Clone` and not `Sync`: only one
/// producer is permitted per ring.
///
/// Insertion takes `&mut self`, so an element constructor cannot insert
/// through the same producer while its own insertion is in flight:
///
/// ```compile_fail
/// use swmr_ring::SwmrRing;
///
/// let (mut producer, _consumer) = SwmrRing::<u32>::new(3).unwrap().split();
/// producer.insert_with(|| {
///     producer.insert(1);
///     2
/// });
/// ```
pub struct Producer<T> {
    ring: Arc<SwmrRing<T>>,
    _not_sync: PhantomData<Cell<()>>,
}

impl<T> Producer<T> {
    /// Insert an item. If the ring is full, the oldest item is dropped.
    #[inline]
    pub fn insert(&mut self, item: T) {
        self.insert_with(|| item);
    }

    /// Insert an item built by `make`.
    ///
    /// `make` runs after any eviction this call performs. If it panics, the
    /// eviction stands and nothing is inserted.
    #[inline]
    pub fn insert_with(&mut self, make: impl FnOnce() -> T) {
        let Ok(()) = self.try_insert_with(|| Ok::<T, core::convert::Infallible>(make()));
    }

    /// Insert an item built by a fallible `make`.
    ///
    /// # Errors
    ///
    /// Returns the error from `make`; nothing is inserted. An eviction made
    /// by this call is not undone.
    #[inline]
    pub fn try_insert_with<E>(&mut self, make: impl FnOnce() -> Result<T, E>) -> Result<(), E> {
        // Safety: this handle is the ring's only producer, and `&mut self`
        // keeps `make` from reaching it again.
        unsafe { self.ring.produce(make) }
    }

    /// Another consumer handle for the same ring.
    #[must_use]
    pub fn consumer(&self) -> Consumer<T> {
        Consumer {
            ring: Arc::clone(&self.ring),
        }
    }

    /// Number of items currently in the ring.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// True if the ring is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// True if the next insertion will evict.
    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }

    /// Buffer capacity.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Number of items dropped to make room.
    #[inline]
    #[must_use]
    pub fn evictions(&self) -> usize {
        self.ring.evictions()
    }
}

impl<T> fmt::Debug for Producer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer").field("ring", &self.ring).finish()
    }
}

/// Consumer handle for a [`SwmrRing`]. Can only remove.
///
/// Created by [`SwmrRing::split()`] or [`Producer::consumer()`]. Cloning
/// gives another consumer on the same ring.
pub struct Consumer<T> {
    ring: Arc<SwmrRing<T>>,
}

impl<T> Consumer<T> {
    /// Remove the oldest item, or `None` if empty.
    #[inline]
    #[must_use]
    pub fn try_remove(&self) -> Option<T> {
        self.ring.try_remove()
    }

    /// Remove the oldest item into `out`. Returns `false` if empty.
    #[inline]
    pub fn try_remove_into(&self, out: &mut T) -> bool {
        self.ring.try_remove_into(out)
    }

    /// Number of items currently in the ring.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// True if the ring is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Buffer capacity.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}

impl<T> Clone for Consumer<T> {
    fn clone(&self) -> Self {
        Self {
            ring: Arc::clone(&self.ring),
        }
    }
}

impl<T> fmt::Debug for Consumer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer").field("ring", &self.ring).finish()
    }
}

impl<T> RingInfo for Producer<T> {
    #[inline]
    fn len(&self) -> usize {
        self.ring.len()
    }

    #[inline]
    fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}

impl<T> RingProducer<T> for Producer<T> {
    #[inline]
    fn insert(&mut self, item: T) {
        Producer::insert(self, item);
    }
}

impl<T> RingInfo for Consumer<T> {
    #[inline]
    fn len(&self) -> usize {
        self.ring.len()
    }

    #[inline]
    fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}

impl<T> RingConsumer<T> for Consumer<T> {
    #[inline]
    fn try_remove(&self) -> Option<T> {
        self.ring.try_remove()
    }
}
