//! Database, table and column descriptors shared by every phase.

use serde::{Deserialize, Serialize};

use crate::core::identifier::{qualify_mssql, qualify_three_part, quote_mssql};
use crate::error::Result;

/// A database on the connected instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseDescriptor {
    /// Database name.
    pub name: String,

    /// Default collation. `None` when the server cannot report it (offline databases).
    pub collation: Option<String>,

    /// Engine-reserved database (master, tempdb, model, msdb, distribution).
    pub is_system: bool,
}

impl DatabaseDescriptor {
    pub fn user(name: impl Into<String>, collation: Option<&str>) -> Self {
        Self {
            name: name.into(),
            collation: collation.map(str::to_string),
            is_system: false,
        }
    }
}

/// Column metadata relevant to data transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name.
    pub name: String,

    /// Server-derived column that cannot be the target of an insert
    /// (computed, rowversion, or system-versioned period column).
    pub is_computed: bool,

    /// Identity column.
    pub is_identity: bool,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_computed: false,
            is_identity: false,
        }
    }

    pub fn computed(name: impl Into<String>) -> Self {
        Self {
            is_computed: true,
            ..Self::new(name)
        }
    }

    pub fn identity(name: impl Into<String>) -> Self {
        Self {
            is_identity: true,
            ..Self::new(name)
        }
    }
}

/// A user table and its ordered column list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    /// Schema name.
    pub schema: String,

    /// Table name.
    pub name: String,

    /// Columns in `column_id` order.
    pub columns: Vec<ColumnDescriptor>,
}

impl TableDescriptor {
    pub fn new(
        schema: impl Into<String>,
        name: impl Into<String>,
        columns: Vec<ColumnDescriptor>,
    ) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            columns,
        }
    }

    /// Get the fully qualified table name.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    /// `[schema].[table]`, the identifier used inside the clone.
    pub fn destination(&self) -> Result<String> {
        qualify_mssql(&self.schema, &self.name)
    }

    /// Columns that can be selected and written, in source order.
    pub fn insertable_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.iter().filter(|c| !c.is_computed)
    }

    /// Bracket-quoted projection, e.g. `[id],[total]`.
    pub fn select_list(&self) -> Result<String> {
        let quoted = self
            .insertable_columns()
            .map(|c| quote_mssql(&c.name))
            .collect::<Result<Vec<_>>>()?;
        Ok(quoted.join(","))
    }

    /// `SELECT <insertable columns> FROM [db].[schema].[table]`.
    pub fn select_statement(&self, database: &str) -> Result<String> {
        Ok(format!(
            "SELECT {} FROM {}",
            self.select_list()?,
            qualify_three_part(database, &self.schema, &self.name)?
        ))
    }

    /// One-to-one name mapping over the insertable columns.
    pub fn column_mapping(&self) -> ColumnMapping {
        ColumnMapping::by_name(self.insertable_columns().map(|c| c.name.as_str()))
    }
}

/// One source column mapped to one destination column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedColumn {
    pub source: String,
    pub destination: String,
}

/// Explicit source → destination column mapping, matched by name.
///
/// The entry order follows the source projection, so entry `i` describes
/// value `i` of every source row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    entries: Vec<MappedColumn>,
}

impl ColumnMapping {
    /// Map every column to the destination column of the same name.
    pub fn by_name<'a>(columns: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            entries: columns
                .into_iter()
                .map(|c| MappedColumn {
                    source: c.to_string(),
                    destination: c.to_string(),
                })
                .collect(),
        }
    }

    pub fn entries(&self) -> &[MappedColumn] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Position in the source row of the value for `destination`.
    pub fn source_index(&self, destination: &str) -> Option<usize> {
        position_by_name(self.entries.iter().map(|m| m.destination.as_str()), destination)
    }
}

/// Find `name` among `names`: an exact match wins, otherwise a
/// case-insensitive match counts only when it is the only one.
pub fn position_by_name<'a>(names: impl IntoIterator<Item = &'a str>, name: &str) -> Option<usize> {
    let names: Vec<&str> = names.into_iter().collect();
    if let Some(exact) = names.iter().position(|n| *n == name) {
        return Some(exact);
    }
    let mut folded = names
        .iter()
        .enumerate()
        .filter(|(_, n)| n.eq_ignore_ascii_case(name))
        .map(|(i, _)| i);
    match (folded.next(), folded.next()) {
        (Some(i), None) => Some(i),
        _ => None,
    }
}

/// A clone database whose schema has been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClonedDatabase {
    /// Clone database name (`source + suffix`).
    pub name: String,

    /// Number of DDL statements executed.
    pub statements_applied: usize,

    /// User tables found in the clone after its schema was applied.
    pub tables: Vec<TableDescriptor>,
}

impl ClonedDatabase {
    pub fn has_tables(&self) -> bool {
        !self.tables.is_empty()
    }
}
