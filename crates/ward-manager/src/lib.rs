//! Per-world region management.
//!
//! [`RegionManager`] ties the pieces together: it owns the [`RegionIndex`]
//! for one world, a [`RegionStore`](ward_store::RegionStore) driver, and the
//! flag registry, and orchestrates the load/save lifecycle around them.
//! Mutations go through the manager so its chunk cache stays honest; queries
//! are forwarded to immutable snapshots and never block saves.

mod error;
mod manager;

pub use error::{ManagerError, ManagerResult};
pub use manager::RegionManager;
pub use ward_index::{RegionDiff, RegionIndex, RemovalStrategy};
