//! The per-world manager.

use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use ward_index::{RegionIndex, RemovalStrategy};
use ward_region::{
    Actor, BlockPos, ChunkPos, FlagDef, FlagId, FlagRegistry, FlagValue, Region, RegionError,
    RegionGroup, RegionId, RegionResult, State,
};
use ward_resolve::ApplicableRegionSet;
use ward_store::{RegionStore, SaveMode, StoreError};

use crate::error::ManagerResult;

/// Owns one world's regions, their persistence, and the flag registry.
///
/// All region mutation for the world goes through this type. Queries hand
/// out immutable snapshots ([`ApplicableRegionSet`]) and stay answerable
/// while a save or load is in flight.
pub struct RegionManager {
    world: String,
    index: RegionIndex,
    store: Arc<dyn RegionStore>,
    /// Probed once at construction; drivers must not change their answer.
    save_mode: SaveMode,
    registry: Arc<FlagRegistry>,
    /// Chunk id lists handed to chunk-load hooks. Purely an optimization:
    /// dropped wholesale on every mutation.
    chunk_cache: Mutex<HashMap<ChunkPos, Vec<RegionId>>>,
}

impl RegionManager {
    #[must_use]
    pub fn new(
        world: impl Into<String>,
        store: Arc<dyn RegionStore>,
        registry: Arc<FlagRegistry>,
    ) -> Self {
        let world = world.into();
        let save_mode = store.save_mode();
        info!(%world, ?save_mode, "region manager created");
        Self {
            world,
            index: RegionIndex::new(),
            store,
            save_mode,
            registry,
            chunk_cache: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn world(&self) -> &str {
        &self.world
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<FlagRegistry> {
        &self.registry
    }

    fn invalidate_chunks(&self) {
        self.chunk_cache.lock().clear();
    }

    // ==================== Lifecycle ====================

    /// Load the stored regions and swap them in as the world's region set.
    ///
    /// Queries running concurrently keep answering from the previous set
    /// until the swap. Returns the number of regions loaded.
    pub fn load(&self) -> ManagerResult<usize> {
        let regions = self.store.load_all()?;
        let count = regions.len();
        self.index.set_regions(regions)?;
        self.invalidate_chunks();
        info!(world = %self.world, count, "regions loaded");
        Ok(count)
    }

    /// Persist everything, regardless of what changed. Returns the number
    /// of regions written.
    pub fn save(&self) -> ManagerResult<usize> {
        let regions = self.index.persistent_regions();
        self.store.save_all(&regions)?;
        // Storage now matches the index; pending diffs are stale.
        let _ = self.index.take_changes();
        info!(world = %self.world, count = regions.len(), "regions saved");
        Ok(regions.len())
    }

    /// Persist the mutations since the last save. No-op when clean.
    ///
    /// Incremental drivers get the diff; `FullOnly` drivers, and incremental
    /// drivers that refuse a particular diff, get a full save instead. A
    /// failed save puts the diff back so the next call retries it.
    pub fn save_changes(&self) -> ManagerResult<usize> {
        let diff = self.index.take_changes();
        if diff.is_empty() {
            return Ok(0);
        }

        if self.save_mode == SaveMode::Incremental {
            match self.store.save_diff(&diff) {
                Ok(()) => {
                    debug!(world = %self.world, count = diff.len(), "region diff saved");
                    return Ok(diff.len());
                }
                Err(StoreError::PartialSaveUnsupported) => {
                    warn!(world = %self.world, "driver refused diff, saving everything");
                }
                Err(err) => {
                    self.index.restore_changes(&diff);
                    return Err(err.into());
                }
            }
        }

        let regions = self.index.persistent_regions();
        if let Err(err) = self.store.save_all(&regions) {
            self.index.restore_changes(&diff);
            return Err(err.into());
        }
        info!(world = %self.world, count = regions.len(), "regions saved");
        Ok(diff.len())
    }

    #[must_use]
    pub fn has_unsaved_changes(&self) -> bool {
        self.index.has_changes()
    }

    // ==================== Region mutation ====================

    pub fn add(&self, region: Region) -> RegionResult<()> {
        self.index.add(region)?;
        self.invalidate_chunks();
        Ok(())
    }

    pub fn add_all(&self, regions: Vec<Region>) -> RegionResult<()> {
        self.index.add_all(regions)?;
        self.invalidate_chunks();
        Ok(())
    }

    pub fn remove(&self, id: &RegionId, strategy: RemovalStrategy) -> Vec<Arc<Region>> {
        let removed = self.index.remove(id, strategy);
        if !removed.is_empty() {
            self.invalidate_chunks();
        }
        removed
    }

    pub fn update<F>(&self, id: &RegionId, f: F) -> RegionResult<Arc<Region>>
    where
        F: FnOnce(&mut Region),
    {
        let updated = self.index.update(id, f)?;
        self.invalidate_chunks();
        Ok(updated)
    }

    pub fn set_parent(&self, child: &RegionId, parent: Option<&RegionId>) -> RegionResult<()> {
        self.index.set_parent(child, parent)?;
        self.invalidate_chunks();
        Ok(())
    }

    /// Set or unset a flag on a region, validated against the registry:
    /// the flag must be registered and the value must match its kind.
    pub fn set_flag(
        &self,
        id: &RegionId,
        flag: &str,
        value: Option<FlagValue>,
    ) -> RegionResult<Arc<Region>> {
        let def = self
            .registry
            .get(flag)
            .ok_or_else(|| RegionError::UnknownFlag(FlagId::new(flag)))?;
        if let Some(value) = &value {
            def.check(value)?;
        }
        self.update(id, |r| r.set_flag(def.id().clone(), value))
    }

    /// Override (or clear) a registered flag's group scope on a region.
    pub fn set_flag_group(
        &self,
        id: &RegionId,
        flag: &str,
        group: Option<RegionGroup>,
    ) -> RegionResult<Arc<Region>> {
        let def = self
            .registry
            .get(flag)
            .ok_or_else(|| RegionError::UnknownFlag(FlagId::new(flag)))?;
        self.update(id, |r| r.set_flag_group(def.id().clone(), group))
    }

    // ==================== Region access ====================

    #[must_use]
    pub fn get(&self, id: &RegionId) -> Option<Arc<Region>> {
        self.index.get(id)
    }

    #[must_use]
    pub fn all(&self) -> Vec<Arc<Region>> {
        self.index.all()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// The world's global region, when one exists.
    #[must_use]
    pub fn global_region(&self) -> Option<Arc<Region>> {
        self.index.get(&RegionId::global())
    }

    /// The global region, created empty on demand (for flag edits on a
    /// world with no explicit global region yet).
    pub fn ensure_global(&self) -> RegionResult<Arc<Region>> {
        loop {
            if let Some(global) = self.index.get(&RegionId::global()) {
                return Ok(global);
            }
            match self.add(Region::global()) {
                // Lost a race with another creator; loop reads theirs.
                Ok(()) | Err(RegionError::DuplicateId(_)) => {}
                Err(err) => return Err(err),
            }
        }
    }

    // ==================== Queries ====================

    /// Snapshot of the regions applicable at a point.
    #[must_use]
    pub fn applicable_regions(&self, pos: BlockPos) -> ApplicableRegionSet {
        self.index.applicable_at(pos)
    }

    #[must_use]
    pub fn query_value(
        &self,
        pos: BlockPos,
        actor: Option<&dyn Actor>,
        def: &FlagDef,
    ) -> Option<FlagValue> {
        self.index.applicable_at(pos).query_value(actor, def)
    }

    #[must_use]
    pub fn query_state(
        &self,
        pos: BlockPos,
        actor: Option<&dyn Actor>,
        def: &FlagDef,
    ) -> Option<State> {
        self.index.applicable_at(pos).query_state(actor, def)
    }

    /// Boolean answer for a state flag, falling back to the definition's
    /// static default when resolution returns unset.
    #[must_use]
    pub fn test_state(&self, pos: BlockPos, actor: Option<&dyn Actor>, def: &FlagDef) -> bool {
        self.index.applicable_at(pos).test_state(actor, def)
    }

    /// Whether the actor may build at the point.
    #[must_use]
    pub fn test_build(&self, pos: BlockPos, actor: Option<&dyn Actor>) -> bool {
        self.index.applicable_at(pos).test_build(actor)
    }

    // ==================== Chunk hints ====================

    /// Regions overlapping a freshly loaded chunk, cached until the next
    /// mutation or unload.
    #[must_use]
    pub fn chunk_loaded(&self, chunk: ChunkPos) -> Vec<RegionId> {
        // The lock spans the index read and the insert: a fill computed
        // from a pre-mutation snapshot must not land after that mutation
        // cleared the cache. Mutations finish their index write before
        // touching the cache, so the two locks never interleave in the
        // opposite order.
        let mut cache = self.chunk_cache.lock();
        if let Some(ids) = cache.get(&chunk) {
            return ids.clone();
        }
        let ids: Vec<RegionId> = self
            .index
            .intersecting_chunk(chunk)
            .iter()
            .map(|r| r.id().clone())
            .collect();
        cache.insert(chunk, ids.clone());
        ids
    }

    pub fn chunk_unloaded(&self, chunk: ChunkPos) {
        self.chunk_cache.lock().remove(&chunk);
    }
}

#[cfg(test)]
mod tests {
    use ward_region::{FlagId, RegionShape};
    use ward_store::MemoryStore;

    use super::*;

    fn manager() -> RegionManager {
        RegionManager::new(
            "overworld",
            Arc::new(MemoryStore::new()),
            Arc::new(FlagRegistry::with_builtins()),
        )
    }

    fn id(name: &str) -> RegionId {
        RegionId::new(name).unwrap()
    }

    fn region(name: &str) -> Region {
        Region::new(
            id(name),
            RegionShape::cuboid(BlockPos::new(0, 0, 0), BlockPos::new(31, 63, 31)),
        )
    }

    #[test]
    fn test_chunk_cache_invalidated_by_mutation() {
        let mgr = manager();
        mgr.add(region("spawn")).unwrap();

        let chunk = ChunkPos::new(0, 0);
        assert_eq!(mgr.chunk_loaded(chunk), vec![id("spawn")]);

        let mut arena = region("arena");
        arena.set_shape(RegionShape::cuboid(
            BlockPos::new(8, 0, 8),
            BlockPos::new(40, 64, 40),
        ));
        mgr.add(arena).unwrap();
        // Stale answer would miss the new region.
        assert_eq!(mgr.chunk_loaded(chunk), vec![id("arena"), id("spawn")]);

        let _ = mgr.remove(&id("spawn"), RemovalStrategy::RemoveChildren);
        assert_eq!(mgr.chunk_loaded(chunk), vec![id("arena")]);
    }

    #[test]
    fn test_chunk_cache_agrees_with_index_under_concurrent_mutation() {
        let mgr = manager();
        mgr.add(region("spawn")).unwrap();
        let chunk = ChunkPos::new(0, 0);

        // A fill racing a mutation must never publish a pre-mutation list
        // past that mutation's invalidation.
        std::thread::scope(|s| {
            s.spawn(|| {
                for i in 0..64 {
                    let name = format!("r{i}");
                    mgr.add(region(&name)).unwrap();
                    let _ = mgr.remove(
                        &RegionId::new(&name).unwrap(),
                        RemovalStrategy::RemoveChildren,
                    );
                }
            });
            for _ in 0..256 {
                let _ = mgr.chunk_loaded(chunk);
            }
        });

        // All the churned regions are gone; a stale cached fill would
        // still list one of them here.
        assert_eq!(mgr.chunk_loaded(chunk), vec![id("spawn")]);
    }

    #[test]
    fn test_set_flag_validated_against_registry() {
        let mgr = manager();
        mgr.add(region("plot")).unwrap();

        mgr.set_flag(&id("plot"), "pvp", Some(FlagValue::State(State::Deny)))
            .unwrap();
        let def = FlagDef::state("pvp");
        assert_eq!(
            mgr.query_state(BlockPos::new(5, 5, 5), None, &def),
            Some(State::Deny)
        );

        assert!(matches!(
            mgr.set_flag(&id("plot"), "pvp", Some(FlagValue::Str("nope".into()))),
            Err(RegionError::WrongFlagType { .. })
        ));
        assert!(matches!(
            mgr.set_flag(&id("plot"), "no-such-flag", Some(FlagValue::State(State::Allow))),
            Err(RegionError::UnknownFlag(_))
        ));
        // Rejected edits left the stored value alone.
        assert_eq!(
            mgr.get(&id("plot")).unwrap().flag(&FlagId::new("pvp")),
            Some(&FlagValue::State(State::Deny))
        );

        mgr.set_flag(&id("plot"), "pvp", None).unwrap();
        assert_eq!(mgr.query_state(BlockPos::new(5, 5, 5), None, &def), None);
    }

    #[test]
    fn test_set_flag_group_scopes_value() {
        let mgr = manager();
        mgr.add(region("plot")).unwrap();
        mgr.set_flag(&id("plot"), "pvp", Some(FlagValue::State(State::Deny)))
            .unwrap();
        mgr.set_flag_group(&id("plot"), "pvp", Some(RegionGroup::Members))
            .unwrap();

        // An environmental cause is a non-member and falls out of scope.
        let def = FlagDef::state("pvp");
        assert_eq!(mgr.query_state(BlockPos::new(5, 5, 5), None, &def), None);

        assert!(matches!(
            mgr.set_flag_group(&id("plot"), "no-such-flag", Some(RegionGroup::All)),
            Err(RegionError::UnknownFlag(_))
        ));
    }

    #[test]
    fn test_ensure_global() {
        let mgr = manager();
        assert!(mgr.global_region().is_none());

        let global = mgr.ensure_global().unwrap();
        assert!(global.is_global());
        // Second call returns the existing one.
        let again = mgr.ensure_global().unwrap();
        assert!(Arc::ptr_eq(&global, &again));
    }

    #[test]
    fn test_query_wiring() {
        let mgr = manager();
        let mut r = region("no-pvp");
        r.set_flag(FlagId::new("pvp"), Some(FlagValue::State(State::Deny)));
        mgr.add(r).unwrap();

        let def = FlagDef::state("pvp");
        let inside = BlockPos::new(5, 5, 5);
        let outside = BlockPos::new(500, 5, 500);

        assert_eq!(mgr.query_state(inside, None, &def), Some(State::Deny));
        assert!(!mgr.test_state(inside, None, &def));
        assert_eq!(mgr.query_state(outside, None, &def), None);
        // Unconstrained points allow building.
        assert!(mgr.test_build(outside, None));
    }

    #[test]
    fn test_save_changes_incremental_and_noop() {
        let mgr = manager();
        assert_eq!(mgr.save_changes().unwrap(), 0);

        mgr.add(region("a")).unwrap();
        mgr.add(region("b")).unwrap();
        assert!(mgr.has_unsaved_changes());
        assert_eq!(mgr.save_changes().unwrap(), 2);
        assert!(!mgr.has_unsaved_changes());

        mgr.update(&id("a"), |r| r.set_priority(4)).unwrap();
        assert_eq!(mgr.save_changes().unwrap(), 1);
    }

    #[test]
    fn test_load_replaces_index() {
        let store = Arc::new(MemoryStore::new());
        let seed = RegionManager::new(
            "overworld",
            Arc::clone(&store) as Arc<dyn RegionStore>,
            Arc::new(FlagRegistry::with_builtins()),
        );
        seed.add(region("town")).unwrap();
        seed.save().unwrap();

        let mgr = RegionManager::new(
            "overworld",
            store,
            Arc::new(FlagRegistry::with_builtins()),
        );
        mgr.add(region("scratch")).unwrap();
        assert_eq!(mgr.load().unwrap(), 1);
        assert!(mgr.get(&id("town")).is_some());
        assert!(mgr.get(&id("scratch")).is_none());
        // Loaded state is clean.
        assert!(!mgr.has_unsaved_changes());
    }
}
