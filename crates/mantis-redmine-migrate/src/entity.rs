//! The closed set of migrated entity kinds and their per-kind policies.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One category of migrated data.
///
/// The orchestrator processes kinds in a fixed dependency order; the kind
/// decides which source/target queries run, whether the operator reviews the
/// mapping, and whether "create new" is a legal resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Status,
    Priority,
    Role,
    CustomFieldType,
    RelationType,
    Project,
    Version,
    Category,
    User,
    CustomField,
    Issue,
    Relation,
}

impl EntityKind {
    /// Every kind, in processing order.
    pub const ALL: [EntityKind; 12] = [
        EntityKind::Status,
        EntityKind::Priority,
        EntityKind::Role,
        EntityKind::CustomFieldType,
        EntityKind::RelationType,
        EntityKind::Project,
        EntityKind::Version,
        EntityKind::Category,
        EntityKind::User,
        EntityKind::Issue,
        EntityKind::Relation,
        EntityKind::CustomField,
    ];

    /// Stable snake-case name, used for mapping unit files and report rows.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Status => "status",
            EntityKind::Priority => "priority",
            EntityKind::Role => "role",
            EntityKind::CustomFieldType => "custom_field_type",
            EntityKind::RelationType => "relation_type",
            EntityKind::Project => "project",
            EntityKind::Version => "version",
            EntityKind::Category => "category",
            EntityKind::User => "user",
            EntityKind::CustomField => "custom_field",
            EntityKind::Issue => "issue",
            EntityKind::Relation => "relation",
        }
    }

    /// Whether the operator may reassign a candidate to the create-new sentinel.
    pub fn allows_create(&self) -> bool {
        matches!(
            self,
            EntityKind::Project | EntityKind::Version | EntityKind::Category | EntityKind::User
        )
    }

    /// Whether the mapping goes through the interactive confirmation loop.
    ///
    /// CustomFieldType and RelationType use fixed translation tables and are
    /// never shown to the operator.
    pub fn operator_resolved(&self) -> bool {
        matches!(
            self,
            EntityKind::Status
                | EntityKind::Priority
                | EntityKind::Role
                | EntityKind::Project
                | EntityKind::Version
                | EntityKind::Category
                | EntityKind::User
        )
    }

    /// Whether apply progress for this kind is persisted per record.
    ///
    /// Only kinds that create target rows need progress units; reuse-only
    /// kinds are free to re-run.
    pub fn tracks_progress(&self) -> bool {
        matches!(
            self,
            EntityKind::Project
                | EntityKind::Version
                | EntityKind::Category
                | EntityKind::User
                | EntityKind::CustomField
                | EntityKind::Issue
                | EntityKind::Relation
        )
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_snake_case() {
        assert_eq!(EntityKind::CustomFieldType.as_str(), "custom_field_type");
        assert_eq!(EntityKind::RelationType.as_str(), "relation_type");
        assert_eq!(EntityKind::Status.as_str(), "status");
    }

    #[test]
    fn test_create_policy() {
        assert!(EntityKind::Project.allows_create());
        assert!(EntityKind::User.allows_create());
        assert!(!EntityKind::Status.allows_create());
        assert!(!EntityKind::RelationType.allows_create());
    }

    #[test]
    fn test_operator_resolution_policy() {
        assert!(EntityKind::Status.operator_resolved());
        assert!(EntityKind::Project.operator_resolved());
        assert!(!EntityKind::CustomFieldType.operator_resolved());
        assert!(!EntityKind::RelationType.operator_resolved());
        assert!(!EntityKind::Issue.operator_resolved());
    }

    #[test]
    fn test_kinds_sort_in_declaration_order() {
        // Kinds key BTree maps in the remap tables; ordering follows the
        // enum declaration.
        let mut kinds = vec![EntityKind::Issue, EntityKind::Status, EntityKind::Project];
        kinds.sort();
        assert_eq!(
            kinds,
            vec![EntityKind::Status, EntityKind::Project, EntityKind::Issue]
        );
    }

    #[test]
    fn test_progress_policy() {
        assert!(EntityKind::Issue.tracks_progress());
        assert!(EntityKind::Relation.tracks_progress());
        assert!(!EntityKind::Status.tracks_progress());
    }
}
