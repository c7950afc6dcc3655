//! Redmine target database operations.

mod postgres;

pub use postgres::PgTarget;

use crate::error::Result;
use crate::mapping::TargetOption;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};

/// Write side of the migration: option reads for the resolver and one insert
/// shape per created kind.
///
/// Every insert returns the id the store assigned, so dependent records can
/// reference the new row without a separate read-back.
#[async_trait]
pub trait TargetRepository: Send + Sync {
    /// Issue statuses, id and name.
    async fn statuses(&self) -> Result<Vec<TargetOption>>;

    /// Issue priorities (the `IssuePriority` enumeration).
    async fn priorities(&self) -> Result<Vec<TargetOption>>;

    /// Assignable roles, builtins excluded.
    async fn roles(&self) -> Result<Vec<TargetOption>>;

    async fn trackers(&self) -> Result<Vec<TargetOption>>;

    async fn projects(&self) -> Result<Vec<TargetOption>>;

    async fn versions(&self) -> Result<Vec<TargetOption>>;

    async fn issue_categories(&self) -> Result<Vec<TargetOption>>;

    /// User accounts, labelled by login.
    async fn users(&self) -> Result<Vec<TargetOption>>;

    /// Every project identifier already taken, for slug deduplication.
    async fn project_identifiers(&self) -> Result<Vec<String>>;

    /// Right edge of the project tree, 0 when there are no projects.
    async fn max_project_rgt(&self) -> Result<i64>;

    async fn insert_project(&self, project: &NewProject) -> Result<i64>;

    /// Point a project at its parent. Used by the hierarchy second pass.
    async fn set_project_parent(&self, project_id: i64, parent_id: i64) -> Result<()>;

    async fn enable_module(&self, project_id: i64, module: &str) -> Result<()>;

    async fn attach_tracker(&self, project_id: i64, tracker_id: i64) -> Result<()>;

    /// Membership plus its role row.
    async fn insert_membership(&self, membership: &NewMembership) -> Result<i64>;

    async fn insert_version(&self, version: &NewVersion) -> Result<i64>;

    async fn insert_issue_category(&self, category: &NewCategory) -> Result<i64>;

    /// A tracker created from a source category (trackers mode only).
    async fn insert_tracker(&self, name: &str) -> Result<i64>;

    async fn insert_user(&self, user: &NewUser) -> Result<i64>;

    async fn insert_issue(&self, issue: &NewIssue) -> Result<i64>;

    async fn insert_journal(&self, journal: &NewJournal) -> Result<i64>;

    /// One changed-attribute row under a journal.
    async fn insert_journal_detail(
        &self,
        journal_id: i64,
        prop_key: &str,
        old_value: &str,
        value: &str,
    ) -> Result<()>;

    async fn insert_time_entry(&self, entry: &NewTimeEntry) -> Result<i64>;

    async fn insert_attachment(&self, attachment: &NewAttachment) -> Result<i64>;

    /// Stamp the moment an issue reached the closed status.
    async fn set_issue_closed_on(&self, issue_id: i64, closed_on: NaiveDateTime) -> Result<()>;

    async fn insert_relation(&self, relation: &NewRelation) -> Result<i64>;

    async fn insert_custom_field(&self, field: &NewCustomField) -> Result<i64>;

    async fn attach_custom_field_tracker(&self, field_id: i64, tracker_id: i64) -> Result<()>;

    async fn attach_custom_field_project(&self, field_id: i64, project_id: i64) -> Result<()>;

    async fn insert_custom_value(&self, field_id: i64, issue_id: i64, value: &str) -> Result<()>;

    /// Cheap connectivity probe.
    async fn ping(&self) -> Result<()>;
}

/// A `projects` row to create. Tree positions are placeholders appended past
/// the existing forest; the hierarchy pass fills `parent_id` later.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProject {
    pub name: String,
    pub identifier: String,
    pub description: String,
    pub is_public: bool,
    /// 1 active, 5 archived.
    pub status: i64,
    pub lft: i64,
    pub rgt: i64,
}

/// A `members` + `member_roles` pair to create.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMembership {
    pub project_id: i64,
    pub user_id: i64,
    pub role_id: i64,
}

/// A `versions` row to create.
#[derive(Debug, Clone, PartialEq)]
pub struct NewVersion {
    pub project_id: i64,
    pub name: String,
    pub description: String,
    /// "open" or "closed".
    pub status: String,
    pub effective_date: Option<NaiveDate>,
}

/// An `issue_categories` row to create.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCategory {
    pub project_id: i64,
    pub name: String,
}

/// A `users` row to create.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub login: String,
    pub firstname: String,
    pub lastname: String,
    pub mail: String,
    /// Placeholder digest; imported accounts reset their password first.
    pub hashed_password: String,
    /// 1 active, 3 locked.
    pub status: i64,
}

/// An `issues` row to create.
#[derive(Debug, Clone, PartialEq)]
pub struct NewIssue {
    pub project_id: i64,
    pub tracker_id: i64,
    pub status_id: i64,
    pub priority_id: i64,
    pub author_id: i64,
    pub assigned_to_id: Option<i64>,
    pub category_id: Option<i64>,
    pub fixed_version_id: Option<i64>,
    pub subject: String,
    pub description: String,
    pub is_private: bool,
    pub done_ratio: i64,
    pub created_on: NaiveDateTime,
    pub updated_on: NaiveDateTime,
}

/// A `journals` row to create, either a note or a status-change entry.
#[derive(Debug, Clone, PartialEq)]
pub struct NewJournal {
    pub issue_id: i64,
    pub user_id: i64,
    pub notes: String,
    pub is_private: bool,
    pub created_on: NaiveDateTime,
}

/// A `time_entries` row to create.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTimeEntry {
    pub project_id: i64,
    pub issue_id: i64,
    pub user_id: i64,
    pub hours: f64,
    pub comments: String,
    pub activity_id: i64,
    pub spent_on: NaiveDate,
    pub tyear: i64,
    pub tmonth: i64,
    pub tweek: i64,
}

/// An `attachments` row to create; the content itself goes to the blob sink.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAttachment {
    pub issue_id: i64,
    pub author_id: i64,
    pub filename: String,
    pub disk_filename: String,
    pub filesize: i64,
    pub content_type: String,
    pub digest: String,
    pub created_on: NaiveDateTime,
}

/// An `issue_relations` row to create, both endpoints already remapped.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRelation {
    pub issue_from_id: i64,
    pub issue_to_id: i64,
    pub relation_type: String,
}

/// A `custom_fields` row to create.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCustomField {
    pub name: String,
    pub field_format: String,
    /// YAML list document, empty for non-list formats.
    pub possible_values: String,
    pub default_value: String,
    pub multiple: bool,
}
