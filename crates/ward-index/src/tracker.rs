//! Mutation tracking for incremental persistence.

use std::sync::Arc;

use hashbrown::HashSet;
use ward_region::{Region, RegionId};

/// The batch of mutations since the last drain: what the storage
/// collaborator needs to bring persistence up to date.
///
/// Transient regions never appear here.
#[derive(Clone, Debug, Default)]
pub struct RegionDiff {
    /// Regions created since the last drain.
    pub created: Vec<Arc<Region>>,
    /// Pre-existing regions whose fields changed.
    pub changed: Vec<Arc<Region>>,
    /// Ids of regions removed since the last drain.
    pub removed: Vec<RegionId>,
}

impl RegionDiff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.changed.is_empty() && self.removed.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.created.len() + self.changed.len() + self.removed.len()
    }
}

/// Accumulates dirty ids between drains.
#[derive(Debug, Default)]
pub(crate) struct ChangeTracker {
    created: HashSet<RegionId>,
    changed: HashSet<RegionId>,
    removed: HashSet<RegionId>,
}

impl ChangeTracker {
    pub fn note_created(&mut self, id: &RegionId) {
        // A remove followed by a re-add nets out to a change of the
        // persisted copy.
        if self.removed.remove(id) {
            self.changed.insert(id.clone());
        } else {
            self.created.insert(id.clone());
        }
    }

    pub fn note_changed(&mut self, id: &RegionId) {
        if !self.created.contains(id) {
            self.changed.insert(id.clone());
        }
    }

    pub fn note_removed(&mut self, id: &RegionId) {
        // Created and removed between drains: storage never saw it.
        if self.created.remove(id) {
            return;
        }
        self.changed.remove(id);
        self.removed.insert(id.clone());
    }

    pub fn is_clean(&self) -> bool {
        self.created.is_empty() && self.changed.is_empty() && self.removed.is_empty()
    }

    pub fn clear(&mut self) {
        self.created.clear();
        self.changed.clear();
        self.removed.clear();
    }

    /// Drain into a diff, resolving ids against the live table and
    /// dropping transient regions.
    pub fn drain<F>(&mut self, mut resolve: F) -> RegionDiff
    where
        F: FnMut(&RegionId) -> Option<Arc<Region>>,
    {
        let mut diff = RegionDiff::default();
        for id in self.created.drain() {
            if let Some(region) = resolve(&id) {
                if !region.is_transient() {
                    diff.created.push(region);
                }
            }
        }
        for id in self.changed.drain() {
            if let Some(region) = resolve(&id) {
                if !region.is_transient() {
                    diff.changed.push(region);
                }
            }
        }
        diff.removed = self.removed.drain().collect();

        // Deterministic order for storage drivers and tests.
        diff.created.sort_by(|a, b| a.id().cmp(b.id()));
        diff.changed.sort_by(|a, b| a.id().cmp(b.id()));
        diff.removed.sort();
        diff
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ward_region::{BlockPos, RegionShape};

    fn id(name: &str) -> RegionId {
        RegionId::new(name).unwrap()
    }

    fn arc_region(name: &str) -> Arc<Region> {
        Arc::new(Region::new(
            id(name),
            RegionShape::cuboid(BlockPos::new(0, 0, 0), BlockPos::new(1, 1, 1)),
        ))
    }

    #[test]
    fn test_created_then_removed_nets_out() {
        let mut tracker = ChangeTracker::default();
        tracker.note_created(&id("a"));
        tracker.note_removed(&id("a"));
        assert!(tracker.is_clean());
    }

    #[test]
    fn test_removed_then_recreated_is_changed() {
        let mut tracker = ChangeTracker::default();
        tracker.note_removed(&id("a"));
        tracker.note_created(&id("a"));

        let region = arc_region("a");
        let diff = tracker.drain(|_| Some(Arc::clone(&region)));
        assert!(diff.created.is_empty());
        assert_eq!(diff.changed.len(), 1);
        assert!(diff.removed.is_empty());
    }

    #[test]
    fn test_change_on_created_stays_created() {
        let mut tracker = ChangeTracker::default();
        tracker.note_created(&id("a"));
        tracker.note_changed(&id("a"));

        let region = arc_region("a");
        let diff = tracker.drain(|_| Some(Arc::clone(&region)));
        assert_eq!(diff.created.len(), 1);
        assert!(diff.changed.is_empty());
    }

    #[test]
    fn test_transient_excluded() {
        let mut tracker = ChangeTracker::default();
        tracker.note_created(&id("a"));

        let mut region = Region::new(
            id("a"),
            RegionShape::cuboid(BlockPos::new(0, 0, 0), BlockPos::new(1, 1, 1)),
        );
        region.set_transient(true);
        let region = Arc::new(region);
        let diff = tracker.drain(|_| Some(Arc::clone(&region)));
        assert!(diff.is_empty());
    }
}
