//! Configuration validation.

use super::Config;
use crate::error::{MigrateError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Source validation
    if config.source.host.is_empty() {
        return Err(MigrateError::Config("source.host is required".into()));
    }
    if config.source.database.is_empty() {
        return Err(MigrateError::Config("source.database is required".into()));
    }
    if config.source.user.is_empty() {
        return Err(MigrateError::Config("source.user is required".into()));
    }

    // Target validation
    if config.target.host.is_empty() {
        return Err(MigrateError::Config("target.host is required".into()));
    }
    if config.target.database.is_empty() {
        return Err(MigrateError::Config("target.database is required".into()));
    }
    if config.target.user.is_empty() {
        return Err(MigrateError::Config("target.user is required".into()));
    }

    // Cannot migrate into the source database
    if config.source.host == config.target.host
        && config.source.port == config.target.port
        && config.source.database == config.target.database
    {
        return Err(MigrateError::Config(
            "source and target cannot be the same database".into(),
        ));
    }

    // Migration behavior validation
    if config.migration.tracker_bug.is_empty() {
        return Err(MigrateError::Config(
            "migration.tracker_bug is required".into(),
        ));
    }
    if config.migration.tracker_feature.is_empty() {
        return Err(MigrateError::Config(
            "migration.tracker_feature is required".into(),
        ));
    }
    if config.migration.resolved_status_codes.is_empty() {
        return Err(MigrateError::Config(
            "migration.resolved_status_codes must name at least one status code".into(),
        ));
    }
    if config.migration.default_author_id < 1 {
        return Err(MigrateError::Config(
            "migration.default_author_id must be a valid user id".into(),
        ));
    }
    if config.migration.activity_id < 1 {
        return Err(MigrateError::Config(
            "migration.activity_id must be a valid enumeration id".into(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MigrationConfig, SourceConfig, TargetConfig};

    fn valid_config() -> Config {
        Config {
            source: SourceConfig {
                host: "localhost".to_string(),
                port: 3306,
                database: "bugtracker".to_string(),
                user: "mantis".to_string(),
                password: "password".to_string(),
                attachments_inline: false,
            },
            target: TargetConfig {
                host: "localhost".to_string(),
                port: 5432,
                database: "redmine".to_string(),
                user: "redmine".to_string(),
                password: "password".to_string(),
            },
            migration: MigrationConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        let config = valid_config();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_missing_source_host() {
        let mut config = valid_config();
        config.source.host = "".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_missing_target_database() {
        let mut config = valid_config();
        config.target.database = "".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_same_database_rejected() {
        let mut config = valid_config();
        config.target.host = config.source.host.clone();
        config.target.port = config.source.port;
        config.target.database = config.source.database.clone();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_empty_tracker_name_rejected() {
        let mut config = valid_config();
        config.migration.tracker_feature = "".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_empty_resolved_codes_rejected() {
        let mut config = valid_config();
        config.migration.resolved_status_codes.clear();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_bad_default_author_rejected() {
        let mut config = valid_config();
        config.migration.default_author_id = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_source_config_debug_redacts_password() {
        let mut config = valid_config();
        config.source.password = "super_secret_password_123".to_string();
        let debug_output = format!("{:?}", config.source);
        assert!(
            debug_output.contains("[REDACTED]"),
            "Debug output should contain [REDACTED]"
        );
        assert!(
            !debug_output.contains("super_secret_password_123"),
            "Debug output should not contain actual password value"
        );
    }

    #[test]
    fn test_target_config_debug_redacts_password() {
        let mut config = valid_config();
        config.target.password = "super_secret_password_456".to_string();
        let debug_output = format!("{:?}", config.target);
        assert!(
            debug_output.contains("[REDACTED]"),
            "Debug output should contain [REDACTED]"
        );
        assert!(
            !debug_output.contains("super_secret_password_456"),
            "Debug output should not contain actual password value"
        );
    }
}
