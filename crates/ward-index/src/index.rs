//! The region index.

use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;
use ward_region::{
    BlockPos, ChunkPos, Region, RegionError, RegionId, RegionResult, RegionShape,
};
use ward_resolve::ApplicableRegionSet;

use crate::tracker::{ChangeTracker, RegionDiff};

type Table = HashMap<RegionId, Arc<Region>>;

/// What to do with the children of a removed region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemovalStrategy {
    /// Remove every descendant along with the region.
    RemoveChildren,
    /// Reparent children to the removed region's own parent (or detach
    /// them when it had none).
    UnsetParent,
}

struct Inner {
    /// Current region table. Mutations build the next table and replace
    /// the whole `Arc`; queries clone the `Arc` and work on a frozen view.
    table: Arc<Table>,
    tracker: ChangeTracker,
}

/// Container of the regions for one world.
///
/// Many threads may query concurrently while one mutates; every query sees
/// the table either entirely before or entirely after a mutation. A failed
/// mutation leaves the index in its last valid state.
pub struct RegionIndex {
    inner: RwLock<Inner>,
}

impl RegionIndex {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                table: Arc::new(Table::new()),
                tracker: ChangeTracker::default(),
            }),
        }
    }

    fn snapshot(&self) -> Arc<Table> {
        Arc::clone(&self.inner.read().table)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().table.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().table.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &RegionId) -> Option<Arc<Region>> {
        self.inner.read().table.get(id).cloned()
    }

    /// All regions, sorted by id.
    #[must_use]
    pub fn all(&self) -> Vec<Arc<Region>> {
        let table = self.snapshot();
        let mut out: Vec<_> = table.values().cloned().collect();
        out.sort_by(|a, b| a.id().cmp(b.id()));
        out
    }

    /// All regions that belong in storage, sorted by id.
    #[must_use]
    pub fn persistent_regions(&self) -> Vec<Arc<Region>> {
        let mut out = self.all();
        out.retain(|r| !r.is_transient());
        out
    }

    // ==================== Mutation ====================

    /// Insert a region. The parent, if any, must already be indexed.
    pub fn add(&self, region: Region) -> RegionResult<()> {
        let mut guard = self.inner.write();
        if guard.table.contains_key(region.id()) {
            return Err(RegionError::DuplicateId(region.id().clone()));
        }
        if let Some(parent) = region.parent() {
            if !guard.table.contains_key(parent) {
                return Err(RegionError::UnknownParent {
                    child: region.id().clone(),
                    parent: parent.clone(),
                });
            }
        }
        let id = region.id().clone();
        let transient = region.is_transient();
        let mut table = (*guard.table).clone();
        table.insert(id.clone(), Arc::new(region));
        guard.table = Arc::new(table);
        if !transient {
            guard.tracker.note_created(&id);
        }
        Ok(())
    }

    /// Insert a family of regions in any order. The whole batch is
    /// validated against the index before anything is inserted.
    pub fn add_all(&self, regions: Vec<Region>) -> RegionResult<()> {
        let mut guard = self.inner.write();
        let mut table = (*guard.table).clone();
        let mut added = Vec::with_capacity(regions.len());
        for region in regions {
            if table.contains_key(region.id()) {
                return Err(RegionError::DuplicateId(region.id().clone()));
            }
            let id = region.id().clone();
            let transient = region.is_transient();
            table.insert(id.clone(), Arc::new(region));
            if !transient {
                added.push(id);
            }
        }
        validate_graph(&table)?;
        guard.table = Arc::new(table);
        for id in &added {
            guard.tracker.note_created(id);
        }
        Ok(())
    }

    /// Replace the whole index with a freshly loaded collection.
    ///
    /// The incoming set is validated first; on error the previous table
    /// stays live. A successful swap clears the change tracker; the new
    /// state is by definition what storage holds.
    pub fn set_regions(&self, regions: Vec<Region>) -> RegionResult<()> {
        let mut table = Table::with_capacity(regions.len());
        for region in regions {
            if table.contains_key(region.id()) {
                return Err(RegionError::DuplicateId(region.id().clone()));
            }
            table.insert(region.id().clone(), Arc::new(region));
        }
        validate_graph(&table)?;

        let mut guard = self.inner.write();
        guard.table = Arc::new(table);
        guard.tracker.clear();
        Ok(())
    }

    /// Clone-mutate-swap a region's fields.
    ///
    /// Parent links cannot be changed here; [`set_parent`](Self::set_parent)
    /// is the validated entry point for those.
    pub fn update<F>(&self, id: &RegionId, f: F) -> RegionResult<Arc<Region>>
    where
        F: FnOnce(&mut Region),
    {
        let mut guard = self.inner.write();
        let Some(current) = guard.table.get(id) else {
            return Err(RegionError::UnknownRegion(id.clone()));
        };
        let mut next = (**current).clone();
        let old_parent = next.parent().cloned();
        f(&mut next);
        if next.parent() != old_parent.as_ref() {
            return Err(RegionError::ParentViaUpdate(id.clone()));
        }
        let next = Arc::new(next);
        let mut table = (*guard.table).clone();
        table.insert(id.clone(), Arc::clone(&next));
        guard.table = Arc::new(table);
        guard.tracker.note_changed(id);
        Ok(next)
    }

    /// Set or clear a region's parent, rejecting unknown regions and any
    /// assignment that would make the region its own ancestor.
    pub fn set_parent(&self, child: &RegionId, parent: Option<&RegionId>) -> RegionResult<()> {
        let mut guard = self.inner.write();
        let Some(child_region) = guard.table.get(child) else {
            return Err(RegionError::UnknownRegion(child.clone()));
        };
        if let Some(parent_id) = parent {
            if !guard.table.contains_key(parent_id) {
                return Err(RegionError::UnknownParent {
                    child: child.clone(),
                    parent: parent_id.clone(),
                });
            }
            // Walk up from the prospective parent; finding the child means
            // the assignment closes a loop.
            let mut steps = 0usize;
            let mut current = Some(parent_id.clone());
            while let Some(id) = current {
                if &id == child {
                    return Err(RegionError::CircularInheritance {
                        child: child.clone(),
                        parent: parent_id.clone(),
                    });
                }
                steps += 1;
                if steps > guard.table.len() {
                    return Err(RegionError::CircularInheritance {
                        child: child.clone(),
                        parent: parent_id.clone(),
                    });
                }
                current = guard.table.get(&id).and_then(|r| r.parent().cloned());
            }
        }
        let mut next = (**child_region).clone();
        next.set_parent_unchecked(parent.cloned());
        let mut table = (*guard.table).clone();
        table.insert(child.clone(), Arc::new(next));
        guard.table = Arc::new(table);
        guard.tracker.note_changed(child);
        Ok(())
    }

    /// Remove a region, applying the strategy to its children. Returns the
    /// regions actually removed; an unknown id removes nothing.
    pub fn remove(&self, id: &RegionId, strategy: RemovalStrategy) -> Vec<Arc<Region>> {
        let mut guard = self.inner.write();
        let mut table = (*guard.table).clone();
        let Some(root) = table.remove(id) else {
            return Vec::new();
        };
        let root_parent = root.parent().cloned();
        let mut removed = vec![root];

        match strategy {
            RemovalStrategy::RemoveChildren => {
                let mut queue = vec![id.clone()];
                while let Some(current) = queue.pop() {
                    let children: Vec<RegionId> = table
                        .values()
                        .filter(|r| r.parent() == Some(&current))
                        .map(|r| r.id().clone())
                        .collect();
                    for child in children {
                        if let Some(region) = table.remove(&child) {
                            removed.push(region);
                            queue.push(child);
                        }
                    }
                }
            }
            RemovalStrategy::UnsetParent => {
                let grandparent = root_parent;
                let children: Vec<RegionId> = table
                    .values()
                    .filter(|r| r.parent() == Some(id))
                    .map(|r| r.id().clone())
                    .collect();
                for child in children {
                    if let Some(existing) = table.get(&child) {
                        let mut next = (**existing).clone();
                        next.set_parent_unchecked(grandparent.clone());
                        table.insert(child.clone(), Arc::new(next));
                        guard.tracker.note_changed(&child);
                    }
                }
            }
        }

        for region in &removed {
            if !region.is_transient() {
                guard.tracker.note_removed(region.id());
            }
        }
        guard.table = Arc::new(table);
        removed.sort_by(|a, b| a.id().cmp(b.id()));
        removed
    }

    // ==================== Queries ====================

    /// Snapshot of the regions containing a point, their ancestors, and
    /// the global region.
    #[must_use]
    pub fn applicable_at(&self, pos: BlockPos) -> ApplicableRegionSet {
        let table = self.snapshot();
        let candidates = table
            .values()
            .filter(|r| !r.is_global() && r.shape().contains(pos))
            .cloned()
            .collect();
        let global = table.get(&RegionId::global()).cloned();
        ApplicableRegionSet::new(candidates, global, |id| table.get(id).cloned())
    }

    /// Snapshot of the regions intersecting a shape.
    #[must_use]
    pub fn applicable_to_shape(&self, shape: &RegionShape) -> ApplicableRegionSet {
        let table = self.snapshot();
        let candidates = table
            .values()
            .filter(|r| !r.is_global() && r.shape().intersects(shape))
            .cloned()
            .collect();
        let global = table.get(&RegionId::global()).cloned();
        ApplicableRegionSet::new(candidates, global, |id| table.get(id).cloned())
    }

    /// Snapshot of the regions intersecting another region, excluding
    /// itself.
    #[must_use]
    pub fn applicable_to(&self, region: &Region) -> ApplicableRegionSet {
        let table = self.snapshot();
        let candidates = table
            .values()
            .filter(|r| {
                !r.is_global() && r.id() != region.id() && r.shape().intersects(region.shape())
            })
            .cloned()
            .collect();
        let global = table.get(&RegionId::global()).cloned();
        ApplicableRegionSet::new(candidates, global, |id| table.get(id).cloned())
    }

    /// Regions overlapping a chunk column, sorted by id. The global region
    /// is not listed; it covers every chunk.
    #[must_use]
    pub fn intersecting_chunk(&self, chunk: ChunkPos) -> Vec<Arc<Region>> {
        let shape = RegionShape::cuboid(chunk.min_block(), chunk.max_block());
        let table = self.snapshot();
        let mut out: Vec<_> = table
            .values()
            .filter(|r| !r.is_global() && r.shape().intersects(&shape))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.id().cmp(b.id()));
        out
    }

    // ==================== Change tracking ====================

    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.inner.read().tracker.is_clean()
    }

    /// Drain the mutations since the last drain (or the last
    /// [`set_regions`](Self::set_regions)) into a diff for storage.
    #[must_use]
    pub fn take_changes(&self) -> RegionDiff {
        let mut guard = self.inner.write();
        let Inner { table, tracker } = &mut *guard;
        tracker.drain(|id| table.get(id).cloned())
    }

    /// Put a drained diff back into the tracker after a failed save, so the
    /// mutations are retried on the next drain. Merges with anything noted
    /// since the drain.
    pub fn restore_changes(&self, diff: &RegionDiff) {
        let mut guard = self.inner.write();
        for region in &diff.created {
            guard.tracker.note_created(region.id());
        }
        for region in &diff.changed {
            guard.tracker.note_changed(region.id());
        }
        for id in &diff.removed {
            guard.tracker.note_removed(id);
        }
    }
}

impl Default for RegionIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate parent existence and acyclicity over a whole table.
fn validate_graph(table: &Table) -> RegionResult<()> {
    for region in table.values() {
        let Some(direct_parent) = region.parent() else {
            continue;
        };
        if !table.contains_key(direct_parent) {
            return Err(RegionError::UnknownParent {
                child: region.id().clone(),
                parent: direct_parent.clone(),
            });
        }
        let mut steps = 0usize;
        let mut current = Some(direct_parent.clone());
        while let Some(id) = current {
            if &id == region.id() {
                return Err(RegionError::CircularInheritance {
                    child: region.id().clone(),
                    parent: direct_parent.clone(),
                });
            }
            steps += 1;
            if steps > table.len() {
                return Err(RegionError::CircularInheritance {
                    child: region.id().clone(),
                    parent: direct_parent.clone(),
                });
            }
            current = table.get(&id).and_then(|r| r.parent().cloned());
        }
    }
    Ok(())
}
