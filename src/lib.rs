//! Fixed-capacity ring buffer with one non-blocking producer and any number
//! of consumers.
//!
//! The producer never waits and never fails for lack of room: when the ring
//! is full it drops the oldest element and writes the new one. Consumers
//! remove the oldest element with [`SwmrRing::try_remove`], serialized among
//! themselves by a short claim on the tail cursor. Suited to telemetry rings,
//! best-effort log staging and "latest N" snapshots, where bounded memory and
//! a wait-free writer matter more than delivering every item.
//!
//! ```
//! use swmr_ring::SwmrRing;
//!
//! let mut ring = SwmrRing::new(3).unwrap();
//! for i in 0..5 {
//!     ring.insert(i);
//! }
//! // 0 and 1 were evicted to make room.
//! assert_eq!(ring.drain().collect::<Vec<_>>(), [2, 3, 4]);
//! assert_eq!(ring.try_remove(), None);
//! ```

#![cfg_attr(not(any(feature = "std", test)), no_std)]
#![warn(missing_docs)]

extern crate alloc;

mod builder;
mod error;
mod handles;
mod index;
mod ring;
mod sync;
mod traits;

#[cfg(all(test, not(loom)))]
mod tests;

pub use builder::RingBuilder;
pub use error::{Error, Result};
pub use handles::{Consumer, Producer};
pub use ring::{Drain, SwmrRing};
pub use traits::{RingConsumer, RingInfo, RingProducer};
