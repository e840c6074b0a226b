//! Construction errors.

use snafu::Snafu;

/// Errors returned when building a [`SwmrRing`](crate::SwmrRing).
///
/// Runtime element failures are not represented here: a fallible element
/// constructor returns the caller's own error from
/// [`try_insert_with`](crate::SwmrRing::try_insert_with), and panicking
/// destructors unwind through the call that ran them.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum Error {
    /// A ring must hold at least one element.
    #[snafu(display("capacity must be nonzero"))]
    InvalidCapacity,

    /// The arena of `capacity + 1` slots could not be allocated.
    #[snafu(display("failed to allocate arena for capacity {capacity}"))]
    AllocationFailure {
        /// Requested capacity.
        capacity: usize,
    },
}

/// Result alias defaulting to this crate's [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;
