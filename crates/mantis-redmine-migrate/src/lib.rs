//! # mantis-redmine-migrate
//!
//! Migrates a MantisBT bug tracker (MySQL) into an existing Redmine
//! installation (PostgreSQL) without destroying pre-existing Redmine data:
//!
//! - **Operator-reviewed mappings** from Mantis ids and enumeration codes to
//!   Redmine records, with a label pre-match heuristic and a "create new"
//!   option
//! - **Dependency-ordered apply**: enumerations, projects, versions,
//!   categories, users, then issues with their journals, time entries,
//!   attachments, relations, and custom fields
//! - **Preview mode** that resolves and reports without writing
//! - **Resume capability** via persisted per-kind mapping and progress units
//!
//! ## Example
//!
//! ```rust,no_run
//! use mantis_redmine_migrate::{Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> mantis_redmine_migrate::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let report = Orchestrator::connect(config).await?.run().await?;
//!     println!("{}", report.render_text());
//!     Ok(())
//! }
//! ```

pub mod blob;
pub mod config;
pub mod entity;
pub mod error;
pub mod mapping;
pub mod orchestrator;
pub mod remap;
pub mod report;
pub mod source;
pub mod target;
pub mod typemap;

// Re-exports for convenient access
pub use blob::{BlobSink, DiscardBlobSink, FsBlobSink};
pub use config::{CategoryMode, Config, MigrationConfig, SourceConfig, TargetConfig};
pub use entity::EntityKind;
pub use error::{MigrateError, Result};
pub use mapping::{
    AutoConfirmConsole, Candidate, MappingConsole, MappingStore, MappingTable, ResolutionSession,
    ScriptedConsole, TargetOption,
};
pub use orchestrator::Orchestrator;
pub use remap::ForeignKeyMap;
pub use report::{MigrationReport, StageTally};
pub use source::{MysqlSource, SourceRepository};
pub use target::{PgTarget, TargetRepository};
