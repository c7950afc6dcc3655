//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Compute a SHA256 hash of the configuration for resume validation.
    pub fn hash(&self) -> String {
        let yaml = serde_yaml::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(yaml.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_YAML: &str = r#"
source:
  host: mantis-db.example.com
  database: bugtracker
  user: mantis
  password: secret
target:
  host: redmine-db.example.com
  database: redmine
  user: redmine
  password: secret
"#;

    #[test]
    fn test_minimal_yaml_fills_defaults() {
        let config = Config::from_yaml(MINIMAL_YAML).unwrap();
        assert_eq!(config.source.port, 3306);
        assert_eq!(config.target.port, 5432);
        assert!(!config.source.attachments_inline);
        assert_eq!(config.migration.mapping_dir.to_str(), Some("mappings"));
        assert_eq!(config.migration.categories_as, CategoryMode::Categories);
        assert_eq!(config.migration.tracker_bug, "Bug");
        assert_eq!(config.migration.feature_severity, 10);
        assert_eq!(config.migration.resolved_status_codes, vec![80, 90]);
        assert_eq!(config.migration.closed_status_code, 90);
        assert_eq!(config.migration.default_author_id, 1);
        assert_eq!(
            config.migration.enabled_modules,
            vec!["issue_tracking", "time_tracking"]
        );
    }

    #[test]
    fn test_explicit_migration_section() {
        let yaml = format!(
            "{MINIMAL_YAML}migration:\n  categories_as: trackers\n  default_priority: High\n  resolved_status_codes: [90]\n"
        );
        let config = Config::from_yaml(&yaml).unwrap();
        assert_eq!(config.migration.categories_as, CategoryMode::Trackers);
        assert_eq!(config.migration.default_priority, "High");
        assert_eq!(config.migration.resolved_status_codes, vec![90]);
        // Untouched keys keep their defaults.
        assert_eq!(config.migration.default_status, "New");
    }

    #[test]
    fn test_malformed_yaml_is_rejected() {
        assert!(Config::from_yaml("source: [not a mapping").is_err());
    }

    #[test]
    fn test_missing_required_field_is_rejected() {
        let yaml = MINIMAL_YAML.replace("  database: bugtracker\n", "");
        assert!(Config::from_yaml(&yaml).is_err());
    }

    #[test]
    fn test_hash_is_stable_and_sensitive() {
        let a = Config::from_yaml(MINIMAL_YAML).unwrap();
        let b = Config::from_yaml(MINIMAL_YAML).unwrap();
        assert_eq!(a.hash(), b.hash());

        let changed = Config::from_yaml(&MINIMAL_YAML.replace("bugtracker", "mantis2")).unwrap();
        assert_ne!(a.hash(), changed.hash());
    }
}
