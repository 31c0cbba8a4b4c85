//! Foundational services shared by every population topology.
//!
//! This module provides the slot-recycling allocator and the random number
//! service the rest of the engine is built on.

mod arena;
mod rng;

pub use arena::RecyclingBin;
pub use rng::{DiscreteSampler, SimRng};
