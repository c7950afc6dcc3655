//! In-memory old-id → new-id tables used to rewrite foreign keys.
//!
//! Every apply stage registers the ids it produced (or reused) here; later
//! stages look their references up instead of carrying source ids into the
//! target.

use crate::entity::EntityKind;
use crate::error::{MigrateError, Result};
use std::collections::BTreeMap;

/// Placeholder new id recorded for rows a preview run would have created.
/// Never written to the target.
pub const PREVIEW_ID: i64 = -1;

/// Per-kind id translation tables.
#[derive(Debug, Default)]
pub struct ForeignKeyMap {
    maps: BTreeMap<EntityKind, BTreeMap<i64, i64>>,
}

impl ForeignKeyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a translation for one record.
    pub fn insert(&mut self, kind: EntityKind, old_id: i64, new_id: i64) {
        self.maps.entry(kind).or_default().insert(old_id, new_id);
    }

    /// Look up a translation.
    pub fn get(&self, kind: EntityKind, old_id: i64) -> Option<i64> {
        self.maps.get(&kind).and_then(|m| m.get(&old_id)).copied()
    }

    /// Look up a translation that must exist by the time the caller runs.
    pub fn require(&self, kind: EntityKind, old_id: i64) -> Result<i64> {
        self.get(kind, old_id).ok_or_else(|| {
            MigrateError::Unmapped(format!("no {kind} mapping for source id {old_id}"))
        })
    }

    /// Number of translations registered for a kind.
    pub fn len(&self, kind: EntityKind) -> usize {
        self.maps.get(&kind).map_or(0, BTreeMap::len)
    }

    /// All translations for a kind, in old-id order.
    pub fn iter(&self, kind: EntityKind) -> impl Iterator<Item = (i64, i64)> + '_ {
        self.maps
            .get(&kind)
            .into_iter()
            .flat_map(|m| m.iter().map(|(old, new)| (*old, *new)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_lookup() {
        let mut map = ForeignKeyMap::new();
        map.insert(EntityKind::Project, 3, 41);
        map.insert(EntityKind::Project, 5, 42);
        map.insert(EntityKind::User, 3, 7);

        assert_eq!(map.get(EntityKind::Project, 3), Some(41));
        assert_eq!(map.get(EntityKind::User, 3), Some(7));
        assert_eq!(map.get(EntityKind::User, 5), None);
        assert_eq!(map.len(EntityKind::Project), 2);
        assert_eq!(map.len(EntityKind::Issue), 0);
    }

    #[test]
    fn test_require_missing_is_unmapped_error() {
        let map = ForeignKeyMap::new();
        let err = map.require(EntityKind::Version, 9).unwrap_err();
        assert!(matches!(err, MigrateError::Unmapped(_)));
        assert!(err.to_string().contains("version"));
    }

    #[test]
    fn test_iter_is_old_id_ordered() {
        let mut map = ForeignKeyMap::new();
        map.insert(EntityKind::Issue, 30, 103);
        map.insert(EntityKind::Issue, 10, 101);
        map.insert(EntityKind::Issue, 20, 102);
        let pairs: Vec<_> = map.iter(EntityKind::Issue).collect();
        assert_eq!(pairs, vec![(10, 101), (20, 102), (30, 103)]);
    }
}
