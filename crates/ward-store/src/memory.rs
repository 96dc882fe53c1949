//! In-memory driver.

use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::Mutex;
use tracing::debug;
use ward_index::RegionDiff;
use ward_region::{Region, RegionId};

use crate::{RegionStore, SaveMode, StoreResult};

/// Keeps the stored set in a map. Used by tests and by worlds that opt out
/// of persistence but still want the save/load lifecycle to work.
#[derive(Default)]
pub struct MemoryStore {
    regions: Mutex<HashMap<RegionId, Region>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.lock().is_empty()
    }
}

impl RegionStore for MemoryStore {
    fn save_mode(&self) -> SaveMode {
        SaveMode::Incremental
    }

    fn load_all(&self) -> StoreResult<Vec<Region>> {
        let regions = self.regions.lock();
        let mut out: Vec<Region> = regions.values().cloned().collect();
        out.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(out)
    }

    fn save_all(&self, regions: &[Arc<Region>]) -> StoreResult<()> {
        let mut stored = self.regions.lock();
        stored.clear();
        for region in regions {
            if !region.is_transient() {
                stored.insert(region.id().clone(), (**region).clone());
            }
        }
        Ok(())
    }

    fn save_diff(&self, diff: &RegionDiff) -> StoreResult<()> {
        let mut stored = self.regions.lock();
        for region in diff.created.iter().chain(&diff.changed) {
            if !region.is_transient() {
                stored.insert(region.id().clone(), (**region).clone());
            }
        }
        for id in &diff.removed {
            stored.remove(id);
        }
        debug!(
            created = diff.created.len(),
            changed = diff.changed.len(),
            removed = diff.removed.len(),
            "applied region diff"
        );
        Ok(())
    }
}
