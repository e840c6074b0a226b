/// Occupancy queries shared by the ring and both of its handles.
pub trait RingInfo {
    /// Live elements right now. A snapshot while other threads operate.
    fn len(&self) -> usize;

    /// Most elements the ring keeps before evicting.
    fn capacity(&self) -> usize;

    /// Nothing left to remove.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The next insertion drops the oldest element.
    fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }
}

/// Write side of an overwriting ring.
///
/// Insertion neither fails nor waits for consumers; when there is no room
/// the oldest element is dropped.
///
/// Implemented by [`SwmrRing`](crate::SwmrRing) and [`Producer`](crate::Producer).
pub trait RingProducer<T>: RingInfo {
    /// Add `item` as the newest element.
    fn insert(&mut self, item: T);
}

/// Read side of an overwriting ring.
///
/// Removal takes `&self`, so any number of threads may remove at once.
///
/// Implemented by [`SwmrRing`](crate::SwmrRing) and [`Consumer`](crate::Consumer).
pub trait RingConsumer<T>: RingInfo {
    /// Take the oldest element, or `None` when the ring is empty.
    #[must_use]
    fn try_remove(&self) -> Option<T>;
}
