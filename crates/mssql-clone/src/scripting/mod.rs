//! Schema Scripting Engine.
//!
//! [`SchemaScripter`] is the seam between the Schema Cloner and whatever
//! produces DDL. [`CatalogScripter`] reads the source database's `sys.*`
//! catalog into a [`CatalogSnapshot`] and renders it with [`render_script`].

mod catalog;
mod ddl;
pub mod model;

pub use ddl::{column_definition, create_table, format_type, render_script};
pub use model::CatalogSnapshot;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::connection::MssqlClient;
use crate::core::DatabaseDescriptor;
use crate::error::{CloneError, Result};

/// Object classes and behaviors requested from the scripting engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptOptions {
    pub schemas: bool,
    pub xml_schema_collections: bool,
    pub user_defined_types: bool,
    pub sequences: bool,
    /// Legacy `CREATE DEFAULT` objects and their bindings.
    pub defaults: bool,
    pub tables: bool,
    pub views: bool,
    pub stored_procedures: bool,
    pub user_defined_functions: bool,
    /// DML triggers on tables and views.
    pub triggers: bool,
    pub database_triggers: bool,
    pub search_property_lists: bool,
    /// Primary keys and unique constraints.
    pub dri_all_keys: bool,
    pub dri_checks: bool,
    pub foreign_keys: bool,
    pub clustered_indexes: bool,
    pub nonclustered_indexes: bool,
    /// Order objects so that dependencies are created first.
    pub with_dependencies: bool,
    /// Must stay false: rows are moved by the data copy phase.
    pub copy_data: bool,
}

impl ScriptOptions {
    /// Every object class, dependency ordered, no row data.
    pub fn full_schema() -> Self {
        Self {
            schemas: true,
            xml_schema_collections: true,
            user_defined_types: true,
            sequences: true,
            defaults: true,
            tables: true,
            views: true,
            stored_procedures: true,
            user_defined_functions: true,
            triggers: true,
            database_triggers: true,
            search_property_lists: true,
            dri_all_keys: true,
            dri_checks: true,
            foreign_keys: true,
            clustered_indexes: true,
            nonclustered_indexes: true,
            with_dependencies: true,
            copy_data: false,
        }
    }
}

impl Default for ScriptOptions {
    fn default() -> Self {
        Self::full_schema()
    }
}

/// Ordered DDL statements, plus the objects that could not be scripted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaScript {
    statements: Vec<String>,
    skipped: Vec<String>,
}

impl SchemaScript {
    pub fn new(statements: Vec<String>) -> Self {
        Self {
            statements,
            skipped: Vec::new(),
        }
    }

    pub fn push(&mut self, statement: impl Into<String>) {
        self.statements.push(statement.into());
    }

    pub fn skip(&mut self, reason: impl Into<String>) {
        self.skipped.push(reason.into());
    }

    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

/// Produces the DDL that recreates a database's schema objects.
#[async_trait]
pub trait SchemaScripter: Send + Sync {
    /// Script `database` (read through `source`, a connection scoped to it)
    /// for creation inside `target`.
    async fn script_schema(
        &self,
        source: &mut MssqlClient,
        database: &DatabaseDescriptor,
        target: &str,
        options: &ScriptOptions,
    ) -> Result<SchemaScript>;
}

/// Scripter built on catalog view queries.
#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogScripter;

#[async_trait]
impl SchemaScripter for CatalogScripter {
    async fn script_schema(
        &self,
        source: &mut MssqlClient,
        database: &DatabaseDescriptor,
        target: &str,
        options: &ScriptOptions,
    ) -> Result<SchemaScript> {
        if options.copy_data {
            return Err(CloneError::SchemaScripting {
                database: database.name.clone(),
                message: "row data is never scripted; copy_data must be false".into(),
            });
        }

        let snapshot = catalog::read_snapshot(source).await.map_err(|e| {
            CloneError::SchemaScripting {
                database: database.name.clone(),
                message: e.to_string(),
            }
        })?;

        let script = render_script(&snapshot, options, target);
        for reason in script.skipped() {
            warn!("{}", reason);
        }
        info!(
            "Scripted {} statements for {} ({} tables, {} modules)",
            script.len(),
            database.name,
            snapshot.tables.len(),
            snapshot.modules.len()
        );
        Ok(script)
    }
}
