//! On-disk persistence for mapping tables and apply progress.
//!
//! One JSON file per entity kind under the mapping directory:
//! `<kind>.json` holds the confirmed table, `<kind>.applied.json` holds the
//! ids already applied to the target. Writes go through a temp file and
//! rename so an interrupted run never leaves a truncated unit.

use super::MappingTable;
use crate::entity::EntityKind;
use crate::error::{MigrateError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Old id → new id for record branches already applied to the target.
///
/// A branch counts as applied only once the record and all of its nested
/// content are in the target, so resume never half-skips an issue. The new
/// ids let a resumed run rebuild its foreign-key tables without touching
/// the target.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AppliedLog {
    pub ids: BTreeMap<i64, i64>,
}

impl AppliedLog {
    pub fn contains(&self, old_id: i64) -> bool {
        self.ids.contains_key(&old_id)
    }

    pub fn get(&self, old_id: i64) -> Option<i64> {
        self.ids.get(&old_id).copied()
    }

    pub fn insert(&mut self, old_id: i64, new_id: i64) {
        self.ids.insert(old_id, new_id);
    }

    /// `(old_id, new_id)` pairs in old-id order.
    pub fn iter(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        self.ids.iter().map(|(old, new)| (*old, *new))
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Directory-backed store of mapping units.
#[derive(Debug, Clone)]
pub struct MappingStore {
    dir: PathBuf,
}

impl MappingStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the mapping directory if it does not exist yet.
    pub fn ensure_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    fn table_path(&self, kind: EntityKind) -> PathBuf {
        self.dir.join(format!("{}.json", kind.as_str()))
    }

    fn applied_path(&self, kind: EntityKind) -> PathBuf {
        self.dir.join(format!("{}.applied.json", kind.as_str()))
    }

    /// Load a persisted table, or `None` when the kind has never been
    /// resolved.
    pub fn load(&self, kind: EntityKind) -> Result<Option<MappingTable>> {
        let path = self.table_path(kind);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        let table: MappingTable = serde_json::from_str(&content)?;
        if table.kind != kind {
            return Err(MigrateError::MappingStore(format!(
                "{} holds a {} table, expected {}",
                path.display(),
                table.kind,
                kind
            )));
        }
        Ok(Some(table))
    }

    /// Persist a confirmed table as pretty JSON.
    pub fn save(&self, table: &MappingTable) -> Result<()> {
        let content = serde_json::to_string_pretty(table)?;
        write_atomic(&self.table_path(table.kind), &content)
    }

    /// Load the applied-progress log, empty when no progress was recorded.
    pub fn load_applied(&self, kind: EntityKind) -> Result<AppliedLog> {
        let path = self.applied_path(kind);
        if !path.exists() {
            return Ok(AppliedLog::default());
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Persist the applied-progress log.
    pub fn save_applied(&self, kind: EntityKind, applied: &AppliedLog) -> Result<()> {
        let content = serde_json::to_string_pretty(applied)?;
        write_atomic(&self.applied_path(kind), &content)
    }

    /// Drop recorded progress for a kind. A fresh (non-resume) run starts
    /// from zero.
    pub fn clear_applied(&self, kind: EntityKind) -> Result<()> {
        let path = self.applied_path(kind);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        Ok(())
    }

    /// Record the configuration hash the stored units were produced under.
    pub fn save_config_hash(&self, hash: &str) -> Result<()> {
        write_atomic(&self.dir.join(CONFIG_HASH_FILE), hash)
    }

    /// Reject a resume whose configuration differs from the run that wrote
    /// the store. A store without a recorded hash passes.
    pub fn verify_config_hash(&self, hash: &str) -> Result<()> {
        let path = self.dir.join(CONFIG_HASH_FILE);
        if !path.exists() {
            return Ok(());
        }
        let stored = std::fs::read_to_string(&path)?;
        if stored.trim() != hash {
            return Err(MigrateError::MappingStore(format!(
                "configuration changed since the run that wrote {}; \
                 start a fresh run or restore the original configuration",
                self.dir.display()
            )));
        }
        Ok(())
    }
}

const CONFIG_HASH_FILE: &str = "config.hash";

fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let temp_path = path.with_extension("tmp");
    std::fs::write(&temp_path, content)?;
    std::fs::rename(&temp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{Candidate, MappingEntry, TargetOption};
    use tempfile::TempDir;

    fn sample_table() -> MappingTable {
        let mut table = MappingTable::new(EntityKind::Status);
        table.entries.insert(
            10,
            MappingEntry {
                candidate: Candidate::new(10, "new"),
                chosen: TargetOption::new(1, "New"),
            },
        );
        table.entries.insert(
            90,
            MappingEntry {
                candidate: Candidate::new(90, "closed"),
                chosen: TargetOption::new(5, "Closed"),
            },
        );
        table
    }

    #[test]
    fn test_load_missing_table_is_none() {
        let dir = TempDir::new().unwrap();
        let store = MappingStore::new(dir.path());
        assert!(store.load(EntityKind::Status).unwrap().is_none());
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = MappingStore::new(dir.path());
        let table = sample_table();
        store.save(&table).unwrap();
        let loaded = store.load(EntityKind::Status).unwrap().unwrap();
        assert_eq!(loaded, table);
    }

    #[test]
    fn test_resave_is_byte_identical() {
        let dir = TempDir::new().unwrap();
        let store = MappingStore::new(dir.path());
        let table = sample_table();
        store.save(&table).unwrap();
        let first = std::fs::read(dir.path().join("status.json")).unwrap();
        store.save(&table).unwrap();
        let second = std::fs::read(dir.path().join("status.json")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let store = MappingStore::new(dir.path());
        store.save(&sample_table()).unwrap();
        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["status.json"]);
    }

    #[test]
    fn test_kind_mismatch_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = MappingStore::new(dir.path());
        store.save(&sample_table()).unwrap();
        std::fs::rename(
            dir.path().join("status.json"),
            dir.path().join("priority.json"),
        )
        .unwrap();
        let result = store.load(EntityKind::Priority);
        assert!(matches!(result, Err(MigrateError::MappingStore(_))));
    }

    #[test]
    fn test_applied_progress_round_trip_and_clear() {
        let dir = TempDir::new().unwrap();
        let store = MappingStore::new(dir.path());

        assert!(store.load_applied(EntityKind::Issue).unwrap().is_empty());

        let mut applied = AppliedLog::default();
        applied.insert(101, 5001);
        applied.insert(102, 5002);
        store.save_applied(EntityKind::Issue, &applied).unwrap();

        let loaded = store.load_applied(EntityKind::Issue).unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(loaded.contains(101));
        assert_eq!(loaded.get(101), Some(5001));
        assert!(!loaded.contains(103));
        assert_eq!(
            loaded.iter().collect::<Vec<_>>(),
            vec![(101, 5001), (102, 5002)]
        );

        store.clear_applied(EntityKind::Issue).unwrap();
        assert!(store.load_applied(EntityKind::Issue).unwrap().is_empty());
        // Clearing twice is fine.
        store.clear_applied(EntityKind::Issue).unwrap();
    }

    #[test]
    fn test_config_hash_guard() {
        let dir = TempDir::new().unwrap();
        let store = MappingStore::new(dir.path());

        // No recorded hash: any config passes.
        store.verify_config_hash("abc").unwrap();

        store.save_config_hash("abc").unwrap();
        store.verify_config_hash("abc").unwrap();
        assert!(store.verify_config_hash("def").is_err());
    }

    #[test]
    fn test_ensure_dir_creates_nested_path() {
        let dir = TempDir::new().unwrap();
        let store = MappingStore::new(dir.path().join("a").join("b"));
        store.ensure_dir().unwrap();
        store.save(&sample_table()).unwrap();
        assert!(store.load(EntityKind::Status).unwrap().is_some());
    }
}
