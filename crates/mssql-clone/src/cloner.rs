//! Schema Cloner.
//!
//! Creates the clone database with the source collation and applies the
//! scripted DDL on one connection scoped to the clone, stopping at the first
//! failing statement.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::connection::{ConnectionResolver, MssqlClient};
use crate::core::identifier::{quote_mssql, validate_collation};
use crate::core::DatabaseDescriptor;
use crate::error::{CloneError, Result};
use crate::scripting::{SchemaScript, SchemaScripter, ScriptOptions};

/// SQL Server error raised when `CREATE DATABASE` hits an existing name.
const DATABASE_EXISTS_ERROR: u32 = 1801;

/// Executes one T-SQL batch.
#[async_trait]
pub trait StatementExecutor: Send {
    async fn execute_batch(&mut self, sql: &str) -> Result<()>;
}

#[async_trait]
impl StatementExecutor for MssqlClient {
    async fn execute_batch(&mut self, sql: &str) -> Result<()> {
        // simple_query keeps SET options on the session, unlike sp_executesql.
        self.simple_query(sql).await?.into_results().await?;
        Ok(())
    }
}

/// Execute every statement in order; the first failure aborts the rest.
///
/// Returns the number of statements executed.
pub async fn apply_script<E>(executor: &mut E, database: &str, script: &SchemaScript) -> Result<usize>
where
    E: StatementExecutor + ?Sized,
{
    for (index, statement) in script.statements().iter().enumerate() {
        debug!("[{}] {}", database, statement);
        executor
            .execute_batch(statement)
            .await
            .map_err(|e| CloneError::SchemaApply {
                database: database.to_string(),
                statement_index: index + 1,
                message: e.to_string(),
            })?;
    }
    Ok(script.len())
}

/// `CREATE DATABASE [name] COLLATE <collation>`.
pub fn create_database_sql(name: &str, collation: Option<&str>) -> Result<String> {
    let mut sql = format!("CREATE DATABASE {}", quote_mssql(name)?);
    if let Some(collation) = collation {
        validate_collation(collation)?;
        sql.push_str(&format!(" COLLATE {}", collation));
    }
    Ok(sql)
}

/// Create the clone database. Never reuses an existing database.
pub async fn create_database(
    server: &mut MssqlClient,
    name: &str,
    collation: Option<&str>,
) -> Result<()> {
    let exists = server
        .query("SELECT DB_ID(@P1) AS id", &[&name])
        .await?
        .into_row()
        .await?
        .and_then(|row| row.get::<i32, _>("id"))
        .is_some();
    if exists {
        return Err(CloneError::CloneExists(name.to_string()));
    }

    let sql = create_database_sql(name, collation)?;
    debug!("{}", sql);
    match server.execute(sql.as_str(), &[]).await {
        Ok(_) => {
            info!("Created database {}", name);
            Ok(())
        }
        Err(tiberius::error::Error::Server(e)) if e.code() == DATABASE_EXISTS_ERROR => {
            Err(CloneError::CloneExists(name.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Drop a clone database, disconnecting any remaining sessions first.
pub async fn drop_database(server: &mut MssqlClient, name: &str) -> Result<()> {
    let quoted = quote_mssql(name)?;
    let sql = format!(
        "ALTER DATABASE {0} SET SINGLE_USER WITH ROLLBACK IMMEDIATE; DROP DATABASE {0}",
        quoted
    );
    debug!("{}", sql);
    server.execute_batch(&sql).await?;
    info!("Dropped database {}", name);
    Ok(())
}

/// Scripts a source database and applies the script to its clone.
pub struct SchemaCloner<'a> {
    resolver: &'a ConnectionResolver,
    scripter: &'a dyn SchemaScripter,
    options: ScriptOptions,
}

impl<'a> SchemaCloner<'a> {
    pub fn new(resolver: &'a ConnectionResolver, scripter: &'a dyn SchemaScripter) -> Self {
        Self {
            resolver,
            scripter,
            options: ScriptOptions::full_schema(),
        }
    }

    /// Ask the scripting engine for the source's full schema, targeting `clone_name`.
    pub async fn clone_schema(
        &self,
        source: &DatabaseDescriptor,
        clone_name: &str,
    ) -> Result<SchemaScript> {
        info!("Scripting schema of {} for {}", source.name, clone_name);
        let mut client = self.resolver.connect_to(&source.name).await?;
        let script = self
            .scripter
            .script_schema(&mut client, source, clone_name, &self.options)
            .await;
        if let Err(e) = client.close().await {
            debug!("Closing connection to {} failed: {}", source.name, e);
        }
        script
    }

    /// Apply `script` on a single connection scoped to the clone.
    pub async fn apply(&self, clone_name: &str, script: &SchemaScript) -> Result<usize> {
        let mut client = self.resolver.connect_to(clone_name).await?;
        debug!("Applying {} statements to {}", script.len(), clone_name);
        let applied = apply_script(&mut client, clone_name, script).await;
        if let Err(e) = client.close().await {
            debug!("Closing connection to {} failed: {}", clone_name, e);
        }
        let applied = applied?;
        info!("Applied {} statements to {}", applied, clone_name);
        Ok(applied)
    }
}
