//! JSON flat-file driver.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use hashbrown::HashSet;
use parking_lot::Mutex;
use tracing::debug;
use ward_region::{Region, RegionId};

use crate::{RegionStore, SaveMode, StoreError, StoreResult};

/// All regions of a world in one JSON file.
///
/// Writes go through a temporary sibling file and an atomic rename, so a
/// crash mid-save leaves the previous file intact. The format is a plain
/// JSON array of regions sorted by id, which keeps the file diffable.
pub struct JsonFileStore {
    path: PathBuf,
    /// Serializes writers; the rename itself is atomic but two concurrent
    /// saves would race on the temporary file.
    write_guard: Mutex<()>,
}

impl JsonFileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_guard: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl RegionStore for JsonFileStore {
    fn save_mode(&self) -> SaveMode {
        // One file holds everything; there is no cheaper write than a
        // rewrite.
        SaveMode::FullOnly
    }

    fn load_all(&self) -> StoreResult<Vec<Region>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "region file absent, loading empty set");
                return Ok(Vec::new());
            }
            Err(err) => return Err(err.into()),
        };
        let regions: Vec<Region> = serde_json::from_slice(&bytes)?;

        {
            let mut seen: HashSet<&RegionId> = HashSet::with_capacity(regions.len());
            for region in &regions {
                if !seen.insert(region.id()) {
                    return Err(StoreError::Corrupt(format!(
                        "duplicate region id '{}'",
                        region.id()
                    )));
                }
            }
        }

        debug!(path = %self.path.display(), count = regions.len(), "loaded regions");
        Ok(regions)
    }

    fn save_all(&self, regions: &[Arc<Region>]) -> StoreResult<()> {
        let mut persisted: Vec<&Region> = regions
            .iter()
            .map(AsRef::as_ref)
            .filter(|r| !r.is_transient())
            .collect();
        persisted.sort_by(|a, b| a.id().cmp(b.id()));
        let json = serde_json::to_vec_pretty(&persisted)?;

        let _guard = self.write_guard.lock();
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let tmp = self.tmp_path();
        fs::write(&tmp, &json)?;
        fs::rename(&tmp, &self.path)?;

        debug!(path = %self.path.display(), count = persisted.len(), "saved regions");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ward_region::{BlockPos, RegionShape, State, FlagId, FlagValue};

    use super::*;

    fn region(name: &str) -> Arc<Region> {
        Arc::new(Region::new(
            RegionId::new(name).unwrap(),
            RegionShape::cuboid(BlockPos::new(0, 0, 0), BlockPos::new(15, 15, 15)),
        ))
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("regions.json"));
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("world").join("regions.json"));

        let mut town = Region::new(
            RegionId::new("town").unwrap(),
            RegionShape::cuboid(BlockPos::new(-50, 0, -50), BlockPos::new(50, 128, 50)),
        );
        town.set_priority(3);
        town.set_flag(FlagId::new("pvp"), Some(FlagValue::State(State::Deny)));

        store
            .save_all(&[Arc::new(town), region("spawn")])
            .unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 2);
        // Sorted by id on disk.
        assert_eq!(loaded[0].id().as_str(), "spawn");
        assert_eq!(loaded[1].priority(), 3);
        assert_eq!(
            loaded[1].flag(&FlagId::new("pvp")),
            Some(&FlagValue::State(State::Deny))
        );
    }

    #[test]
    fn test_transient_regions_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("regions.json"));

        let mut ephemeral = Region::new(
            RegionId::new("ephemeral").unwrap(),
            RegionShape::cuboid(BlockPos::new(0, 0, 0), BlockPos::new(1, 1, 1)),
        );
        ephemeral.set_transient(true);

        store
            .save_all(&[region("keep"), Arc::new(ephemeral)])
            .unwrap();
        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id().as_str(), "keep");
    }

    #[test]
    fn test_corrupt_duplicate_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("regions.json");
        let one = serde_json::to_value(&*region("twin")).unwrap();
        std::fs::write(&path, serde_json::to_vec(&vec![&one, &one]).unwrap()).unwrap();

        let store = JsonFileStore::new(path);
        assert!(matches!(store.load_all(), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn test_diff_save_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("regions.json"));
        assert_eq!(store.save_mode(), SaveMode::FullOnly);
        assert!(matches!(
            store.save_diff(&ward_index::RegionDiff::default()),
            Err(StoreError::PartialSaveUnsupported)
        ));
    }
}
