//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source database configuration (MantisBT on MySQL).
    pub source: SourceConfig,

    /// Target database configuration (Redmine on PostgreSQL).
    pub target: TargetConfig,

    /// Migration behavior configuration.
    #[serde(default)]
    pub migration: MigrationConfig,
}

/// Source database (MySQL) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 3306).
    #[serde(default = "default_mysql_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    pub password: String,

    /// Whether attachment content is stored inline in the database
    /// (Mantis `file_upload_method = DATABASE`). When false the attachment
    /// stage is skipped entirely.
    #[serde(default)]
    pub attachments_inline: bool,
}

impl std::fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("attachments_inline", &self.attachments_inline)
            .finish()
    }
}

/// Target database (PostgreSQL) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    pub password: String,
}

impl std::fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// What Mantis categories become on the Redmine side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryMode {
    /// Per-project issue categories (Redmine's native equivalent).
    Categories,

    /// Global trackers; a category's tracker then drives the issue tracker.
    Trackers,
}

impl Default for CategoryMode {
    fn default() -> Self {
        CategoryMode::Categories
    }
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Directory holding persisted mapping units (default: "mappings").
    #[serde(default = "default_mapping_dir")]
    pub mapping_dir: PathBuf,

    /// How to carry Mantis categories over (default: categories).
    #[serde(default)]
    pub categories_as: CategoryMode,

    /// Tracker name for ordinary bugs (default: "Bug").
    #[serde(default = "default_tracker_bug")]
    pub tracker_bug: String,

    /// Tracker name for feature requests (default: "Feature").
    #[serde(default = "default_tracker_feature")]
    pub tracker_feature: String,

    /// Mantis severity code that marks a bug as a feature request
    /// (default: 10, "feature").
    #[serde(default = "default_feature_severity")]
    pub feature_severity: i64,

    /// Mantis status codes counted as resolved; such issues land with
    /// done_ratio 100 (default: [80, 90]).
    #[serde(default = "default_resolved_status_codes")]
    pub resolved_status_codes: Vec<i64>,

    /// Mantis status code meaning closed; reaching it stamps closed_on
    /// (default: 90).
    #[serde(default = "default_closed_status_code")]
    pub closed_status_code: i64,

    /// Target status to fall back to for unmatched statuses (default: "New").
    #[serde(default = "default_status")]
    pub default_status: String,

    /// Target priority to fall back to for unmatched priorities
    /// (default: "Normal").
    #[serde(default = "default_priority")]
    pub default_priority: String,

    /// Target role to fall back to for unmatched access levels
    /// (default: "Reporter").
    #[serde(default = "default_role")]
    pub default_role: String,

    /// Target user id credited when a source author cannot be mapped
    /// (default: 1, the Redmine admin).
    #[serde(default = "default_author_id")]
    pub default_author_id: i64,

    /// Modules enabled on every created project
    /// (default: issue_tracking, time_tracking).
    #[serde(default = "default_enabled_modules")]
    pub enabled_modules: Vec<String>,

    /// Directory attachment blobs are written into (default: "files").
    #[serde(default = "default_attachments_dir")]
    pub attachments_dir: PathBuf,

    /// Time entry activity id for imported time records (default: 9).
    #[serde(default = "default_activity_id")]
    pub activity_id: i64,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            mapping_dir: default_mapping_dir(),
            categories_as: CategoryMode::default(),
            tracker_bug: default_tracker_bug(),
            tracker_feature: default_tracker_feature(),
            feature_severity: default_feature_severity(),
            resolved_status_codes: default_resolved_status_codes(),
            closed_status_code: default_closed_status_code(),
            default_status: default_status(),
            default_priority: default_priority(),
            default_role: default_role(),
            default_author_id: default_author_id(),
            enabled_modules: default_enabled_modules(),
            attachments_dir: default_attachments_dir(),
            activity_id: default_activity_id(),
        }
    }
}

fn default_mysql_port() -> u16 {
    3306
}

fn default_pg_port() -> u16 {
    5432
}

fn default_mapping_dir() -> PathBuf {
    PathBuf::from("mappings")
}

fn default_tracker_bug() -> String {
    "Bug".to_string()
}

fn default_tracker_feature() -> String {
    "Feature".to_string()
}

fn default_feature_severity() -> i64 {
    10
}

fn default_resolved_status_codes() -> Vec<i64> {
    vec![80, 90]
}

fn default_closed_status_code() -> i64 {
    90
}

fn default_status() -> String {
    "New".to_string()
}

fn default_priority() -> String {
    "Normal".to_string()
}

fn default_role() -> String {
    "Reporter".to_string()
}

fn default_author_id() -> i64 {
    1
}

fn default_enabled_modules() -> Vec<String> {
    vec!["issue_tracking".to_string(), "time_tracking".to_string()]
}

fn default_attachments_dir() -> PathBuf {
    PathBuf::from("files")
}

fn default_activity_id() -> i64 {
    9
}
