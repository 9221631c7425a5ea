//! Core types used throughout the clone:
//!
//! - [`identifier`]: validation and bracket quoting of T-SQL identifiers
//! - [`schema`]: database, table and column descriptors, column mappings

pub mod identifier;
pub mod schema;

pub use schema::{
    position_by_name, ClonedDatabase, ColumnDescriptor, ColumnMapping, DatabaseDescriptor,
    MappedColumn, TableDescriptor,
};
