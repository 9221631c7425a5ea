//! Configuration type definitions.

use crate::connection::redact_connection_string;
use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Root configuration structure.
///
/// Built once at process start and handed to each component that needs it.
#[derive(Clone, Deserialize)]
pub struct Config {
    /// ADO-style connection string template pointing at the default database,
    /// e.g. `Server=tcp:localhost,1433;Database=master;User Id=sa;Password=...`.
    #[serde(default)]
    pub connection_string: String,

    /// Clone behavior.
    #[serde(default)]
    pub clone: CloneConfig,

    /// Log file settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field(
                "connection_string",
                &redact_connection_string(&self.connection_string),
            )
            .field("clone", &self.clone)
            .field("logging", &self.logging)
            .finish()
    }
}

/// Clone behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloneConfig {
    /// Suffix appended to each source database name. Generated from the
    /// current time when not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,

    /// Value of the template's `Database` entry that is substituted with the
    /// target database name (default: "master").
    #[serde(default = "default_database")]
    pub default_database: String,

    /// Only clone these databases (exact names, case-insensitive). Empty means all.
    #[serde(default)]
    pub include_databases: Vec<String>,

    /// Never clone these databases (exact names, case-insensitive).
    #[serde(default)]
    pub exclude_databases: Vec<String>,

    /// Maximum concurrent table copies within one database (default: 1).
    #[serde(default = "default_parallel_tables")]
    pub parallel_tables: usize,

    /// Drop a clone database created by this run when its schema fails to apply.
    #[serde(default)]
    pub drop_on_failure: bool,
}

impl Default for CloneConfig {
    fn default() -> Self {
        Self {
            suffix: None,
            default_database: default_database(),
            include_databases: Vec::new(),
            exclude_databases: Vec::new(),
            parallel_tables: default_parallel_tables(),
            drop_on_failure: false,
        }
    }
}

impl CloneConfig {
    /// Check whether a user database passes the include/exclude filters.
    pub fn selects(&self, database: &str) -> bool {
        let listed = |names: &[String]| names.iter().any(|n| n.eq_ignore_ascii_case(database));

        if !self.include_databases.is_empty() && !listed(&self.include_databases) {
            return false;
        }
        !listed(&self.exclude_databases)
    }
}

/// Log file configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory for run log files (default: "logs").
    #[serde(default = "default_log_directory")]
    pub directory: PathBuf,

    /// Log file verbosity: debug, info, warn, error (default: debug).
    #[serde(default = "default_file_level")]
    pub file_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_log_directory(),
            file_level: default_file_level(),
        }
    }
}

/// Resolved clone-name suffix for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloneSuffix(String);

impl CloneSuffix {
    /// Use the configured suffix, or generate one from `now`.
    pub fn resolve<Tz: TimeZone>(configured: Option<&str>, now: DateTime<Tz>) -> Self
    where
        Tz::Offset: fmt::Display,
    {
        match configured {
            Some(s) if !s.is_empty() => CloneSuffix(s.to_string()),
            _ => Self::generate(now),
        }
    }

    /// `_` followed by the timestamp, keeping only word characters, `.`, `@` and `-`.
    pub fn generate<Tz: TimeZone>(now: DateTime<Tz>) -> Self
    where
        Tz::Offset: fmt::Display,
    {
        let stamp = now.format("%Y%m%d_%H%M%S").to_string();
        CloneSuffix(format!("_{}", sanitize_suffix(&stamp)))
    }

    /// Clone database name for a source database.
    pub fn clone_name(&self, source: &str) -> String {
        format!("{}{}", source, self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CloneSuffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Characters allowed in a clone-name suffix.
pub fn is_suffix_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '@' | '-')
}

/// Drop every character outside `[A-Za-z0-9_.@-]`.
pub fn sanitize_suffix(raw: &str) -> String {
    raw.chars().filter(|c| is_suffix_char(*c)).collect()
}

// Default value functions for serde
fn default_database() -> String {
    "master".to_string()
}

fn default_parallel_tables() -> usize {
    1
}

fn default_log_directory() -> PathBuf {
    PathBuf::from("logs")
}

fn default_file_level() -> String {
    "debug".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_configured_suffix_wins() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 14, 47, 5).unwrap();
        let suffix = CloneSuffix::resolve(Some("_copy"), now);
        assert_eq!(suffix.as_str(), "_copy");
        assert_eq!(suffix.clone_name("Sales"), "Sales_copy");
    }

    #[test]
    fn test_generated_suffix_from_timestamp() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 14, 47, 5).unwrap();
        let suffix = CloneSuffix::resolve(None, now);
        assert_eq!(suffix.as_str(), "_20261019_144705");
        assert!(suffix.as_str().starts_with('_'));
        assert!(suffix.as_str().chars().all(is_suffix_char));
    }

    #[test]
    fn test_empty_configured_suffix_is_generated() {
        let now = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(CloneSuffix::resolve(Some(""), now).as_str(), "_20260102_030405");
    }

    #[test]
    fn test_sanitize_suffix() {
        assert_eq!(sanitize_suffix("10/19/2026 1:47:05 PM"), "1019202614705PM");
        assert_eq!(sanitize_suffix("a.b@c-d_e"), "a.b@c-d_e");
        assert_eq!(sanitize_suffix("x;y]z"), "xyz");
    }

    #[test]
    fn test_database_filters() {
        let mut clone = CloneConfig::default();
        assert!(clone.selects("Sales"));

        clone.exclude_databases = vec!["sales".into()];
        assert!(!clone.selects("Sales"));

        clone.exclude_databases.clear();
        clone.include_databases = vec!["HR".into()];
        assert!(!clone.selects("Sales"));
        assert!(clone.selects("hr"));
    }

    #[test]
    fn test_config_debug_redacts_password() {
        let config = Config {
            connection_string: "Server=tcp:db,1433;Database=master;User Id=sa;Password=super_secret_123"
                .into(),
            clone: CloneConfig::default(),
            logging: LoggingConfig::default(),
        };
        let debug_output = format!("{:?}", config);
        assert!(debug_output.contains("password=*****"));
        assert!(!debug_output.contains("super_secret_123"));
    }
}
