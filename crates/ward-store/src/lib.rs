//! Region persistence.
//!
//! A [`RegionStore`] is a passive collaborator: it never mutates regions and
//! never resolves flags, it only moves region data between an index snapshot
//! and a backing medium. Drivers advertise their capability through
//! [`SaveMode`] once, at wiring time; a driver that claims
//! [`SaveMode::Incremental`] may still refuse a particular diff with
//! [`StoreError::PartialSaveUnsupported`], which callers treat as "fall back
//! to a full save", not as data loss.

mod error;
mod json_file;
mod memory;

use std::sync::Arc;

use ward_index::RegionDiff;
use ward_region::Region;

pub use error::{StoreError, StoreResult};
pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

/// What a driver can do with a diff.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveMode {
    /// The driver can apply a [`RegionDiff`] without rewriting everything.
    Incremental,
    /// Every save rewrites the full region set.
    FullOnly,
}

/// A persistence driver for one world's regions.
pub trait RegionStore: Send + Sync {
    /// Capability probe. Read once at wiring time; the answer must not
    /// change over the driver's lifetime.
    fn save_mode(&self) -> SaveMode;

    /// Load every stored region. An empty medium loads an empty set.
    fn load_all(&self) -> StoreResult<Vec<Region>>;

    /// Replace the stored set with the given regions. Transient regions
    /// are skipped.
    fn save_all(&self, regions: &[Arc<Region>]) -> StoreResult<()>;

    /// Apply a diff to the stored set.
    ///
    /// Drivers answering [`SaveMode::FullOnly`] keep this default, which
    /// signals the caller to fall back to [`save_all`](Self::save_all).
    fn save_diff(&self, _diff: &RegionDiff) -> StoreResult<()> {
        Err(StoreError::PartialSaveUnsupported)
    }
}
