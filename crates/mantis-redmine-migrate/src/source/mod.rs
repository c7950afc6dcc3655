//! Mantis source database operations.

mod mysql;
mod types;

pub use mysql::MysqlSource;
pub use types::*;

use crate::error::Result;
use async_trait::async_trait;

/// Read side of the migration: everything the engine pulls out of Mantis.
///
/// Enum-backed fields (status, priority, ...) are surfaced as the distinct
/// codes actually present in the data, so the operator only resolves values
/// that occur.
#[async_trait]
pub trait SourceRepository: Send + Sync {
    /// Distinct status codes present on bugs.
    async fn status_codes(&self) -> Result<Vec<i64>>;

    /// Distinct priority codes present on bugs.
    async fn priority_codes(&self) -> Result<Vec<i64>>;

    /// Distinct access levels present on user accounts.
    async fn access_levels(&self) -> Result<Vec<i64>>;

    /// Distinct custom field type codes in use.
    async fn custom_field_types(&self) -> Result<Vec<i64>>;

    /// Distinct relationship type codes in use.
    async fn relation_types(&self) -> Result<Vec<i64>>;

    async fn projects(&self) -> Result<Vec<SourceProject>>;

    /// `(child_id, parent_id)` project hierarchy edges.
    async fn project_hierarchy(&self) -> Result<Vec<(i64, i64)>>;

    async fn versions(&self) -> Result<Vec<SourceVersion>>;

    async fn categories(&self) -> Result<Vec<SourceCategory>>;

    async fn users(&self) -> Result<Vec<SourceUser>>;

    async fn issues(&self) -> Result<Vec<SourceIssue>>;

    /// Notes of one bug, oldest first.
    async fn notes_for_issue(&self, bug_id: i64) -> Result<Vec<SourceNote>>;

    /// History rows of one bug, oldest first.
    async fn history_for_issue(&self, bug_id: i64) -> Result<Vec<SourceHistory>>;

    /// Attachments of one bug, content included.
    async fn attachments_for_issue(&self, bug_id: i64) -> Result<Vec<SourceAttachment>>;

    async fn relations(&self) -> Result<Vec<SourceRelation>>;

    async fn custom_fields(&self) -> Result<Vec<SourceCustomField>>;

    /// Project ids a custom field is linked to.
    async fn custom_field_projects(&self, field_id: i64) -> Result<Vec<i64>>;

    /// Stored values of one custom field across all bugs.
    async fn custom_field_values(&self, field_id: i64) -> Result<Vec<SourceCustomFieldValue>>;

    /// Cheap connectivity probe.
    async fn ping(&self) -> Result<()>;
}
