//! The clone phases as the orchestrator drives them.

use async_trait::async_trait;
use tracing::info;

use crate::catalog;
use crate::cloner::{self, SchemaCloner};
use crate::config::Config;
use crate::connection::{redact_connection_string, ConnectionResolver, MssqlClient, ServerConnection};
use crate::copy::{BulkLoader, CopyResult, TableDataCopier, TdsBulkLoader};
use crate::core::{DatabaseDescriptor, TableDescriptor};
use crate::error::{CloneError, Result};
use crate::scripting::{CatalogScripter, SchemaScript, SchemaScripter};

/// Every side-effecting step of a clone run.
///
/// The orchestrator owns sequencing, state and failure containment; an
/// implementation only performs the individual steps.
#[async_trait]
pub trait ClonePhases: Send {
    /// Redacted description of the server, for diagnostics.
    fn server_label(&self) -> String;

    /// Check that the configured connection string reaches the server.
    async fn validate_connection(&mut self) -> bool;

    /// Open the run-long server connection.
    async fn connect(&mut self) -> Result<()>;

    /// User databases selected for cloning, in server order.
    async fn list_databases(&mut self) -> Result<Vec<DatabaseDescriptor>>;

    async fn script_schema(
        &mut self,
        source: &DatabaseDescriptor,
        clone_name: &str,
    ) -> Result<SchemaScript>;

    async fn create_database(&mut self, source: &DatabaseDescriptor, clone_name: &str) -> Result<()>;

    /// Returns the number of statements executed.
    async fn apply_schema(&mut self, clone_name: &str, script: &SchemaScript) -> Result<usize>;

    /// User tables of the realized clone.
    async fn list_tables(&mut self, clone_name: &str) -> Result<Vec<TableDescriptor>>;

    async fn copy_data(
        &mut self,
        source: &DatabaseDescriptor,
        clone_name: &str,
        tables: &[TableDescriptor],
    ) -> Result<Vec<CopyResult>>;

    async fn drop_database(&mut self, clone_name: &str) -> Result<()>;

    /// Release the server connection.
    async fn close(&mut self) -> Result<()>;
}

/// [`ClonePhases`] against a live SQL Server instance.
pub struct SqlServerPhases {
    config: Config,
    resolver: ConnectionResolver,
    server: Option<ServerConnection>,
    scripter: Box<dyn SchemaScripter>,
    loader: Box<dyn BulkLoader>,
}

impl SqlServerPhases {
    /// Phases using the catalog scripter and the TDS bulk loader.
    pub fn new(config: Config) -> Self {
        Self::with_engines(config, Box::new(CatalogScripter), Box::new(TdsBulkLoader))
    }

    /// Phases using the given scripting engine and bulk loader.
    pub fn with_engines(
        config: Config,
        scripter: Box<dyn SchemaScripter>,
        loader: Box<dyn BulkLoader>,
    ) -> Self {
        let resolver = ConnectionResolver::from_config(&config);
        Self {
            config,
            resolver,
            server: None,
            scripter,
            loader,
        }
    }

    fn server(&mut self) -> Result<&mut MssqlClient> {
        self.server
            .as_mut()
            .map(ServerConnection::client)
            .ok_or_else(|| CloneError::pool("server connection is not open", "clone phases"))
    }
}

#[async_trait]
impl ClonePhases for SqlServerPhases {
    fn server_label(&self) -> String {
        redact_connection_string(self.resolver.template())
    }

    async fn validate_connection(&mut self) -> bool {
        self.resolver.validate(self.resolver.template()).await
    }

    async fn connect(&mut self) -> Result<()> {
        self.server = Some(self.resolver.open_server().await?);
        Ok(())
    }

    async fn list_databases(&mut self) -> Result<Vec<DatabaseDescriptor>> {
        let databases = catalog::list_user_databases(self.server()?).await?;
        let (selected, filtered): (Vec<_>, Vec<_>) = databases
            .into_iter()
            .partition(|d| self.config.clone.selects(&d.name));
        for database in &filtered {
            info!("Skipping database {} (excluded by configuration)", database.name);
        }
        Ok(selected)
    }

    async fn script_schema(
        &mut self,
        source: &DatabaseDescriptor,
        clone_name: &str,
    ) -> Result<SchemaScript> {
        SchemaCloner::new(&self.resolver, self.scripter.as_ref())
            .clone_schema(source, clone_name)
            .await
    }

    async fn create_database(&mut self, source: &DatabaseDescriptor, clone_name: &str) -> Result<()> {
        cloner::create_database(self.server()?, clone_name, source.collation.as_deref()).await
    }

    async fn apply_schema(&mut self, clone_name: &str, script: &SchemaScript) -> Result<usize> {
        SchemaCloner::new(&self.resolver, self.scripter.as_ref())
            .apply(clone_name, script)
            .await
    }

    async fn list_tables(&mut self, clone_name: &str) -> Result<Vec<TableDescriptor>> {
        catalog::list_tables(self.server()?, clone_name).await
    }

    async fn copy_data(
        &mut self,
        source: &DatabaseDescriptor,
        clone_name: &str,
        tables: &[TableDescriptor],
    ) -> Result<Vec<CopyResult>> {
        let parallel_tables = self.config.clone.parallel_tables;
        let copier = TableDataCopier::new(
            &self.resolver,
            self.loader.as_ref(),
            &source.name,
            clone_name,
            parallel_tables,
        )
        .await?;
        copier.copy_all(tables, parallel_tables).await
    }

    async fn drop_database(&mut self, clone_name: &str) -> Result<()> {
        cloner::drop_database(self.server()?, clone_name).await
    }

    async fn close(&mut self) -> Result<()> {
        match self.server.take() {
            Some(server) => server.close().await,
            None => Ok(()),
        }
    }
}
