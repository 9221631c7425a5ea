//! ADO.NET connection strings.
//!
//! Parsing goes through [`AdoNetString`], the parser Tiberius itself uses, so
//! a template accepted here is one the driver accepts too. Keys compare
//! case-insensitively.

use connection_string::AdoNetString;
use tiberius::Config;

use crate::error::{CloneError, Result};

const DATABASE_KEYS: &[&str] = &["database", "initial catalog"];
const SECRET_KEYS: &[&str] = &["password", "pwd"];
const REDACTED: &str = "*****";

fn parse(input: &str) -> Result<AdoNetString> {
    input
        .parse()
        .map_err(|e: connection_string::Error| {
            CloneError::Config(format!("invalid connection string: {}", e))
        })
}

/// Parse a connection string into a Tiberius config.
pub fn parse_config(connection_string: &str) -> Result<Config> {
    Config::from_ado_string(connection_string)
        .map_err(|e| CloneError::Config(format!("invalid connection string: {}", e)))
}

/// Replace every password value with `*****`.
///
/// An unparseable string is replaced as a whole.
pub fn redact_connection_string(connection_string: &str) -> String {
    match parse(connection_string) {
        Ok(mut ado) => {
            for key in SECRET_KEYS {
                if let Some(value) = ado.get_mut(*key) {
                    *value = REDACTED.to_string();
                }
            }
            ado.to_string()
        }
        Err(_) => "<unparseable connection string>".to_string(),
    }
}

/// The key (`database` or `initial catalog`) whose value is `placeholder`.
fn placeholder_key(ado: &AdoNetString, placeholder: &str) -> Option<&'static str> {
    DATABASE_KEYS.iter().copied().find(|key| {
        ado.get(*key)
            .is_some_and(|v| v.trim().eq_ignore_ascii_case(placeholder))
    })
}

/// Check that the template names `placeholder` as its database.
pub fn ensure_placeholder(template: &str, placeholder: &str) -> Result<()> {
    let ado = parse(template)?;
    match placeholder_key(&ado, placeholder) {
        Some(_) => Ok(()),
        None => Err(CloneError::Config(format!(
            "connection string template has no Database or Initial Catalog entry equal to '{}'",
            placeholder
        ))),
    }
}

/// Build a connection string scoped to `database` by substituting the
/// placeholder value of the template's `Database`/`Initial Catalog` entry.
pub fn derive_clone_connection_string(
    template: &str,
    placeholder: &str,
    database: &str,
) -> Result<String> {
    let mut ado = parse(template)?;
    let key = placeholder_key(&ado, placeholder).ok_or_else(|| {
        CloneError::Config(format!(
            "connection string template has no Database or Initial Catalog entry equal to '{}'",
            placeholder
        ))
    })?;
    ado.insert(key.to_string(), database.to_string());
    Ok(ado.to_string())
}
