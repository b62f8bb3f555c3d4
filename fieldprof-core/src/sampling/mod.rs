//! Bounded-memory sampling primitives.
//!
//! - [`StreamingStats`]: exact running count, extrema, mean and variance
//! - [`ReservoirSampler`]: uniform fixed-capacity sample of any item type

mod reservoir;
mod streaming;

pub use reservoir::{MAX_EXACT_VALUES, ReservoirSampler};
pub use streaming::StreamingStats;
