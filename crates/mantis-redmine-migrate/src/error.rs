//! Error types for the migration library.

use thiserror::Error;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source database connection or query error
    #[error("Source database error: {0}")]
    Source(#[from] sqlx::Error),

    /// Target database connection or query error
    #[error("Target database error: {0}")]
    Target(#[from] tokio_postgres::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// A required entity kind has no source records at all
    #[error("Missing prerequisite: {0}")]
    Prerequisite(String),

    /// Malformed or out-of-range override command during mapping confirmation
    #[error("Invalid mapping command: {0}")]
    Resolution(String),

    /// Persisted mapping unit is corrupt or stale
    #[error("Mapping store error: {0}")]
    MappingStore(String),

    /// A foreign key referenced an old id with no recorded mapping
    #[error("Unmapped foreign key: {0}")]
    Unmapped(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        MigrateError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Process exit code for this error class.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) => 2,
            MigrateError::Prerequisite(_) => 3,
            MigrateError::Source(_) | MigrateError::Target(_) | MigrateError::Pool { .. } => 4,
            _ => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(MigrateError::Config("x".into()).exit_code(), 2);
        assert_eq!(MigrateError::Prerequisite("x".into()).exit_code(), 3);
        assert_eq!(
            MigrateError::pool("down", "connecting to source").exit_code(),
            4
        );
        assert_eq!(MigrateError::Resolution("x".into()).exit_code(), 1);
    }

    #[test]
    fn test_pool_error_includes_context() {
        let err = MigrateError::pool("connection refused", "creating target pool");
        let msg = err.to_string();
        assert!(msg.contains("connection refused"));
        assert!(msg.contains("creating target pool"));
    }

    #[test]
    fn test_format_detailed_contains_message() {
        let err = MigrateError::Unmapped("no project mapping for source id 7".into());
        assert!(err.format_detailed().contains("source id 7"));
    }
}
