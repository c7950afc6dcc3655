//! Mapping tables: the old-id → chosen-target correspondence for one
//! entity kind.

mod resolver;
mod store;

pub use resolver::{
    describe_choice, premap, AutoConfirmConsole, MappingConsole, ResolutionSession,
    ScriptedConsole, SessionCommand,
};
pub use store::{AppliedLog, MappingStore};

use crate::entity::EntityKind;
use crate::error::{MigrateError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sentinel target id meaning "no existing record fits; create one".
pub const CREATE_NEW_ID: i64 = -1;

/// A source-side record exposed to the resolver.
///
/// `fields` carries whatever the kind's create-new path needs so a persisted
/// mapping can reconstruct the row without re-querying the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Source record id.
    pub old_id: i64,

    /// Human-readable label the pre-match heuristic compares on.
    pub label: String,

    /// Extra source fields, keyed by column name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
}

impl Candidate {
    /// Create a candidate with no extra fields.
    pub fn new(old_id: i64, label: impl Into<String>) -> Self {
        Self {
            old_id,
            label: label.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Attach an extra field (builder style).
    pub fn with_field(mut self, key: &str, value: impl Into<String>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    /// Look up an extra field as a string.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Look up an extra field parsed as an integer.
    pub fn field_i64(&self, key: &str) -> Option<i64> {
        self.fields.get(key).and_then(|v| v.parse().ok())
    }

    /// Look up an extra field parsed as a boolean ("1"/"true").
    pub fn field_bool(&self, key: &str) -> bool {
        matches!(self.fields.get(key).map(String::as_str), Some("1" | "true"))
    }
}

/// A target-side record the resolver can map a candidate onto.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetOption {
    /// Target record id, or [`CREATE_NEW_ID`] for the create-new sentinel.
    pub id: i64,

    /// Target label (name, login, ...).
    pub label: String,

    /// Extra target fields, keyed by column name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
}

impl TargetOption {
    /// Create a target option with no extra fields.
    pub fn new(id: i64, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            fields: BTreeMap::new(),
        }
    }

    /// The create-new sentinel, carrying the source label as the name to use
    /// on creation.
    pub fn create_new(label: impl Into<String>) -> Self {
        Self::new(CREATE_NEW_ID, label)
    }

    /// Whether this option is the create-new sentinel.
    pub fn is_create_new(&self) -> bool {
        self.id == CREATE_NEW_ID
    }
}

/// Where an unmatched candidate lands after the pre-match heuristic.
#[derive(Debug, Clone)]
pub enum Fallback {
    /// Point the candidate at the create-new sentinel.
    CreateNew,

    /// Point the candidate at a designated existing target record.
    Existing(TargetOption),
}

/// One resolved correspondence: a source candidate and its chosen target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    /// The source record this entry resolves.
    pub candidate: Candidate,

    /// The chosen target, possibly the create-new sentinel.
    pub chosen: TargetOption,
}

/// Finalized old-id → chosen-target table for one entity kind.
///
/// Entries are BTree-ordered so repeated serialization of the same table is
/// byte-identical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingTable {
    /// The entity kind this table resolves.
    pub kind: EntityKind,

    /// Entries keyed by source old id.
    pub entries: BTreeMap<i64, MappingEntry>,
}

impl MappingTable {
    /// Create an empty table for a kind.
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            entries: BTreeMap::new(),
        }
    }

    /// Build a table from a fixed translation rule instead of label matching.
    ///
    /// Used for the non-operator-resolved kinds: each candidate's chosen
    /// target is the option whose label the rule names. A rule must only
    /// return labels present in `options`.
    pub fn from_rule<F>(
        kind: EntityKind,
        candidates: &[Candidate],
        options: &[TargetOption],
        rule: F,
    ) -> Result<Self>
    where
        F: Fn(&Candidate) -> &'static str,
    {
        let mut table = MappingTable::new(kind);
        for candidate in candidates {
            let label = rule(candidate);
            let chosen = options
                .iter()
                .find(|o| o.label == label)
                .cloned()
                .ok_or_else(|| {
                    MigrateError::MappingStore(format!(
                        "fixed translation for {} produced unknown target '{}'",
                        kind, label
                    ))
                })?;
            table.entries.insert(
                candidate.old_id,
                MappingEntry {
                    candidate: candidate.clone(),
                    chosen,
                },
            );
        }
        Ok(table)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entry for a source old id.
    pub fn get(&self, old_id: i64) -> Option<&MappingEntry> {
        self.entries.get(&old_id)
    }

    /// The chosen target label for a source old id.
    pub fn chosen_label(&self, old_id: i64) -> Option<&str> {
        self.entries.get(&old_id).map(|e| e.chosen.label.as_str())
    }

    /// Count of entries pointing at the create-new sentinel.
    pub fn create_count(&self) -> usize {
        self.entries
            .values()
            .filter(|e| e.chosen.is_create_new())
            .count()
    }

    /// Verify the table covers every current source candidate.
    ///
    /// A persisted table loaded on resume may predate new source rows; a
    /// missing old id means the unit is stale and must be re-resolved.
    pub fn verify_covers(&self, candidates: &[Candidate]) -> Result<()> {
        for candidate in candidates {
            if !self.entries.contains_key(&candidate.old_id) {
                return Err(MigrateError::MappingStore(format!(
                    "stored {} mapping has no entry for source id {} ({}); \
                     delete the unit file to re-resolve",
                    self.kind, candidate.old_id, candidate.label
                )));
            }
        }
        Ok(())
    }
}
