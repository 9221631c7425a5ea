//! Identifier validation and quoting for dynamically built T-SQL.
//!
//! Database, schema, table and column names cannot be passed as parameters,
//! so every name that ends up inside generated SQL goes through this module:
//!
//! 1. Validate the identifier (null bytes, excessive length)
//! 2. Wrap it in brackets
//! 3. Escape closing brackets inside the name

use crate::error::{CloneError, Result};

/// SQL Server `sysname` limit, in characters.
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Validate an identifier for security issues.
///
/// Rejects empty identifiers, identifiers containing null bytes, and
/// identifiers longer than `sysname`.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(CloneError::Config(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(CloneError::Config(format!(
            "SECURITY: Identifier contains null byte (possible injection attempt): {:?}",
            name
        )));
    }

    let chars = name.chars().count();
    if chars > MAX_IDENTIFIER_LENGTH {
        return Err(CloneError::Config(format!(
            "SECURITY: Identifier exceeds maximum length of {} characters (got {}): {:?}",
            MAX_IDENTIFIER_LENGTH, chars, name
        )));
    }

    Ok(())
}

/// Quote a SQL Server identifier using brackets.
///
/// ```ignore
/// assert_eq!(quote_mssql("users")?, "[users]");
/// assert_eq!(quote_mssql("table]name")?, "[table]]name]");
/// ```
pub fn quote_mssql(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(bracket(name))
}

/// Bracket-quote a name already known to be a valid identifier
/// (for names read back from the server catalog).
pub fn bracket(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// Qualify a SQL Server table name with schema: `[schema].[table]`.
pub fn qualify_mssql(schema: &str, table: &str) -> Result<String> {
    Ok(format!("{}.{}", quote_mssql(schema)?, quote_mssql(table)?))
}

/// Three-part name: `[database].[schema].[table]`.
pub fn qualify_three_part(database: &str, schema: &str, table: &str) -> Result<String> {
    Ok(format!(
        "{}.{}",
        quote_mssql(database)?,
        qualify_mssql(schema, table)?
    ))
}

/// Unicode string literal: `N'...'` with embedded quotes doubled.
pub fn quote_literal(value: &str) -> String {
    format!("N'{}'", value.replace('\'', "''"))
}

/// Validate a collation name before it is spliced into `COLLATE`.
///
/// Collation names are bare words (`SQL_Latin1_General_CP1_CI_AS`), never quoted.
pub fn validate_collation(collation: &str) -> Result<()> {
    if collation.is_empty()
        || collation.len() > MAX_IDENTIFIER_LENGTH
        || !collation.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(CloneError::Config(format!(
            "SECURITY: Invalid collation name: {:?}",
            collation
        )));
    }
    Ok(())
}
