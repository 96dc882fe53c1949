//! Concurrent region container for one world.
//!
//! [`RegionIndex`] owns the region objects and is the sole mutator of the
//! parent graph: every mutation that could corrupt it (duplicate ids,
//! unknown parents, cycles) fails fast here, so queries never have to.
//! The region table is copy-on-write: each mutation builds the next table
//! and swaps it in whole, so a concurrent query always observes a state
//! entirely before or entirely after any mutation.

mod index;
mod tracker;

pub use index::{RegionIndex, RemovalStrategy};
pub use tracker::RegionDiff;
