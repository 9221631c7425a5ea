//! # mssql-clone
//!
//! Clone every user database on a SQL Server instance.
//!
//! For each user database the library creates `<name><suffix>` with the
//! source collation, recreates its schema from a dependency-ordered DDL
//! script and copies every table's rows:
//!
//! - **Schema scripting** from the `sys.*` catalog views
//! - **Bulk transfers** using TDS `INSERT BULK`, with a batched INSERT path
//!   for identity columns and bulk-incompatible types
//! - **Failure isolation** per table and per database
//! - **Parallel table copies** with a configurable pool size
//!
//! ## Example
//!
//! ```rust,no_run
//! use mssql_clone::{Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> mssql_clone::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let mut orchestrator = Orchestrator::new(config);
//!     let report = orchestrator.run().await?;
//!     println!("Cloned {} databases", report.databases_succeeded());
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod cloner;
pub mod config;
pub mod connection;
pub mod copy;
pub mod core;
pub mod error;
pub mod orchestrator;
pub mod scripting;

// Re-exports for convenient access
pub use config::{CloneConfig, CloneSuffix, Config, LoggingConfig};
pub use connection::{ConnectionResolver, ServerConnection};
pub use copy::{BulkLoader, CopyResult, TdsBulkLoader};
pub use error::{CloneError, Result, Severity};
pub use orchestrator::{
    CloneState, DatabaseOutcome, DatabaseReport, Orchestrator, PlannedClone, RunReport, RunStatus,
};
pub use scripting::{CatalogScripter, SchemaScript, SchemaScripter, ScriptOptions};
