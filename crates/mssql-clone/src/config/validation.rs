//! Configuration validation.

use super::{is_suffix_char, Config};
use crate::connection::{ensure_placeholder, parse_config};
use crate::error::{CloneError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.connection_string.trim().is_empty() {
        return Err(CloneError::Config(
            "connection_string is required".into(),
        ));
    }

    if config.clone.default_database.trim().is_empty() {
        return Err(CloneError::Config(
            "clone.default_database must not be empty".into(),
        ));
    }

    parse_config(&config.connection_string)?;
    ensure_placeholder(&config.connection_string, &config.clone.default_database)?;

    if let Some(suffix) = &config.clone.suffix {
        if !suffix.is_empty() {
            if !suffix.starts_with('_') {
                return Err(CloneError::Config(format!(
                    "clone.suffix must start with '_', got '{}'",
                    suffix
                )));
            }
            if let Some(bad) = suffix.chars().find(|c| !is_suffix_char(*c)) {
                return Err(CloneError::Config(format!(
                    "clone.suffix may only contain letters, digits, '_', '.', '@' and '-', found '{}'",
                    bad
                )));
            }
        }
    }

    if config.clone.parallel_tables == 0 {
        return Err(CloneError::Config(
            "clone.parallel_tables must be at least 1".into(),
        ));
    }

    match config.logging.file_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        other => {
            return Err(CloneError::Config(format!(
                "logging.file_level must be one of trace, debug, info, warn, error, got '{}'",
                other
            )))
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CloneConfig, LoggingConfig};

    fn valid_config() -> Config {
        Config {
            connection_string: "Server=tcp:localhost,1433;Database=master;User Id=sa;Password=pw"
                .to_string(),
            clone: CloneConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_missing_connection_string() {
        let mut config = valid_config();
        config.connection_string = "  ".to_string();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("connection_string is required"));
    }

    #[test]
    fn test_template_must_name_placeholder() {
        let mut config = valid_config();
        config.connection_string = "Server=tcp:localhost,1433;Database=Sales;User Id=sa".to_string();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("'master'"));

        config.clone.default_database = "Sales".to_string();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_template_the_driver_rejects_is_a_config_error() {
        let mut config = valid_config();
        config.connection_string = "Server=db;Database=master;Password=a=b".to_string();
        let err = validate(&config).unwrap_err();
        assert!(matches!(err, CloneError::Config(_)));
        assert_eq!(err.exit_code(), crate::error::EXIT_CONFIG_ERROR);
    }

    #[test]
    fn test_suffix_must_start_with_underscore() {
        let mut config = valid_config();
        config.clone.suffix = Some("copy".to_string());
        assert!(validate(&config).is_err());

        config.clone.suffix = Some("_copy".to_string());
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_suffix_rejects_bracket() {
        let mut config = valid_config();
        config.clone.suffix = Some("_a]b".to_string());
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("']'"));
    }

    #[test]
    fn test_zero_parallel_tables() {
        let mut config = valid_config();
        config.clone.parallel_tables = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_bad_file_level() {
        let mut config = valid_config();
        config.logging.file_level = "verbose".to_string();
        assert!(validate(&config).is_err());
    }
}
