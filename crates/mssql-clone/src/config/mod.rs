//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CloneError;

    #[test]
    fn test_from_yaml_minimal() {
        let config = Config::from_yaml(
            "connection_string: \"Server=tcp:db,1433;Database=master;User Id=sa;Password=pw\"\n",
        )
        .unwrap();
        assert_eq!(config.clone.default_database, "master");
        assert_eq!(config.clone.parallel_tables, 1);
        assert!(config.clone.suffix.is_none());
        assert!(!config.clone.drop_on_failure);
        assert_eq!(config.logging.file_level, "debug");
    }

    #[test]
    fn test_from_yaml_full() {
        let yaml = r#"
connection_string: "Server=tcp:db,1433;Initial Catalog=master;User Id=sa;Password=pw"
clone:
  suffix: "_snapshot"
  parallel_tables: 4
  drop_on_failure: true
  exclude_databases: [ReportServer]
logging:
  directory: /var/log/mssql-clone
  file_level: info
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.clone.suffix.as_deref(), Some("_snapshot"));
        assert_eq!(config.clone.parallel_tables, 4);
        assert!(config.clone.drop_on_failure);
        assert_eq!(config.clone.exclude_databases, vec!["ReportServer"]);
        assert_eq!(
            config.logging.directory,
            std::path::PathBuf::from("/var/log/mssql-clone")
        );
    }

    #[test]
    fn test_from_yaml_missing_template_is_config_error() {
        let err = Config::from_yaml("clone:\n  suffix: _x\n").unwrap_err();
        assert!(matches!(err, CloneError::Config(_)));
    }

    #[test]
    fn test_from_yaml_invalid_yaml() {
        let err = Config::from_yaml("connection_string: [").unwrap_err();
        assert!(matches!(err, CloneError::Yaml(_)));
    }
}
