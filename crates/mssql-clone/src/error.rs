//! Error types for the clone library.

use thiserror::Error;

/// Process exit code: configuration error.
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Process exit code: the initial connection validation failed.
pub const EXIT_CONNECTION_ERROR: u8 = 2;
/// Process exit code: the run completed but some databases or tables failed.
pub const EXIT_PARTIAL_FAILURE: u8 = 3;
/// Process exit code: unexpected error.
pub const EXIT_RUNTIME_ERROR: u8 = 4;
/// Process exit code: file I/O error.
pub const EXIT_IO_ERROR: u8 = 7;

/// How far a failure reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Aborts the whole run.
    Fatal,
    /// Aborts the current database's cycle; the run continues.
    DatabaseFatal,
    /// Skips the current table; the database cycle continues.
    TableRecoverable,
}

/// Main error type for clone operations.
#[derive(Error, Debug)]
pub enum CloneError {
    /// Configuration error (invalid YAML, missing template, bad suffix).
    #[error("Configuration error: {0}")]
    Config(String),

    /// SQL Server connection or query error.
    #[error("SQL Server error: {0}")]
    Source(#[from] tiberius::error::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// The configured connection string could not reach the server.
    #[error("Cannot initialize a SQL Server connection using the given connection string {0}")]
    ConnectionUnavailable(String),

    /// The clone database already exists on the server.
    #[error("Database {0} already exists; clones are never merged or overwritten")]
    CloneExists(String),

    /// The schema scripting engine failed for a database.
    #[error("Schema scripting failed for database {database}: {message}")]
    SchemaScripting { database: String, message: String },

    /// A DDL statement failed while applying a schema script.
    #[error("Statement {statement_index} failed on database {database}: {message}")]
    SchemaApply {
        database: String,
        statement_index: usize,
        message: String,
    },

    /// Data transfer failed for a specific table
    #[error("Bulk copy failed for table {table}: {message}")]
    Transfer { table: String, message: String },

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

impl CloneError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        CloneError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Transfer error
    pub fn transfer(table: impl Into<String>, message: impl Into<String>) -> Self {
        CloneError::Transfer {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Classify the error according to how much work it aborts.
    pub fn severity(&self) -> Severity {
        match self {
            CloneError::Config(_) | CloneError::ConnectionUnavailable(_) => Severity::Fatal,
            CloneError::Transfer { .. } => Severity::TableRecoverable,
            _ => Severity::DatabaseFatal,
        }
    }

    /// Process exit code for this error when it ends the run.
    pub fn exit_code(&self) -> u8 {
        match self {
            CloneError::Config(_) | CloneError::Yaml(_) => EXIT_CONFIG_ERROR,
            CloneError::ConnectionUnavailable(_) => EXIT_CONNECTION_ERROR,
            CloneError::Io(_) => EXIT_IO_ERROR,
            _ => EXIT_RUNTIME_ERROR,
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

/// Result type alias for clone operations.
pub type Result<T> = std::result::Result<T, CloneError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_taxonomy() {
        assert_eq!(CloneError::Config("x".into()).severity(), Severity::Fatal);
        assert_eq!(
            CloneError::ConnectionUnavailable("Server=x".into()).severity(),
            Severity::Fatal
        );
        assert_eq!(
            CloneError::CloneExists("Sales_x".into()).severity(),
            Severity::DatabaseFatal
        );
        assert_eq!(
            CloneError::SchemaApply {
                database: "Sales_x".into(),
                statement_index: 3,
                message: "boom".into(),
            }
            .severity(),
            Severity::DatabaseFatal
        );
        assert_eq!(
            CloneError::transfer("[dbo].[Orders]", "boom").severity(),
            Severity::TableRecoverable
        );
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(CloneError::Config("x".into()).exit_code(), EXIT_CONFIG_ERROR);
        assert_eq!(
            CloneError::ConnectionUnavailable("x".into()).exit_code(),
            EXIT_CONNECTION_ERROR
        );
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert_eq!(CloneError::from(io).exit_code(), EXIT_IO_ERROR);
        assert_eq!(
            CloneError::CloneExists("x".into()).exit_code(),
            EXIT_RUNTIME_ERROR
        );
    }

    #[test]
    fn test_format_detailed_includes_message() {
        let err = CloneError::CloneExists("Sales_1".into());
        let text = err.format_detailed();
        assert!(text.starts_with("Error: Database Sales_1 already exists"));
    }
}
