//! Builder for configuring a [`SwmrRing`].

use core::marker::PhantomData;

use crate::{SwmrRing, error::Result};

/// Configures and builds a [`SwmrRing`].
///
/// Created by [`SwmrRing::builder()`].
///
/// ```
/// use swmr_ring::{Error, SwmrRing};
///
/// let ring = SwmrRing::<u32>::builder().capacity(8).build().unwrap();
/// assert_eq!(ring.capacity(), 8);
///
/// // Capacity must be set to something nonzero.
/// let err = SwmrRing::<u32>::builder().build().unwrap_err();
/// assert_eq!(err, Error::InvalidCapacity);
/// ```
#[must_use]
pub struct RingBuilder<T> {
    capacity: usize,
    warm: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T> RingBuilder<T> {
    pub(crate) fn new() -> Self {
        Self {
            capacity: 0,
            warm: true,
            _marker: PhantomData,
        }
    }

    /// Maximum number of live elements. Must be nonzero.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Skip touching the arena at construction.
    ///
    /// By default every slot is written with zero bytes so its pages are
    /// resident before the first insertion. Use this in constrained
    /// environments where that up-front cost is unwanted.
    pub fn cold(mut self) -> Self {
        self.warm = false;
        self
    }

    /// Allocate the ring.
    ///
    /// # Errors
    ///
    /// [`InvalidCapacity`](crate::Error::InvalidCapacity) if no nonzero
    /// capacity was set, [`AllocationFailure`](crate::Error::AllocationFailure)
    /// if the arena cannot be allocated.
    pub fn build(self) -> Result<SwmrRing<T>> {
        SwmrRing::with_config(self.capacity, self.warm)
    }
}

impl<T> Default for RingBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}
