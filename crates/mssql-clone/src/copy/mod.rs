//! Table Data Copier.
//!
//! Streams every user table of a source database into its clone. Each table
//! is read on a pooled connection scoped to the source and written through a
//! [`BulkLoader`] on its own connection scoped to the clone. A failing table
//! is recorded and the remaining tables still run.

mod bulk;

pub use bulk::{
    plan_load, BulkLoader, DatabaseTriggers, DestinationColumn, LoadMethod, RowStream, TdsBulkLoader,
};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::connection::{ConnectionResolver, DatabasePool};
use crate::core::TableDescriptor;
use crate::error::{CloneError, Result};

/// Outcome of copying one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyResult {
    /// `[schema].[table]`.
    pub table: String,

    /// Rows written to the clone.
    pub rows: u64,

    /// Failure message, absent on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CopyResult {
    pub fn success(table: impl Into<String>, rows: u64) -> Self {
        Self {
            table: table.into(),
            rows,
            error: None,
        }
    }

    pub fn failure(table: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            rows: 0,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Copies a single table into the clone.
#[async_trait]
pub trait TableCopy: Send + Sync {
    /// Returns the number of rows written.
    async fn copy_table(&self, table: &TableDescriptor) -> Result<u64>;
}

/// Copy every table, at most `concurrency` at a time, in table order.
///
/// Never fails as a whole: each table's outcome lands in its [`CopyResult`].
pub async fn copy_tables<C>(copier: &C, tables: &[TableDescriptor], concurrency: usize) -> Vec<CopyResult>
where
    C: TableCopy + ?Sized,
{
    let jobs: Vec<_> = tables.iter().map(|table| copy_one(copier, table)).collect();
    stream::iter(jobs)
        .buffered(concurrency.max(1))
        .collect()
        .await
}

async fn copy_one<C>(copier: &C, table: &TableDescriptor) -> CopyResult
where
    C: TableCopy + ?Sized,
{
    let name = table
        .destination()
        .unwrap_or_else(|_| table.full_name());
    match copier.copy_table(table).await {
        Ok(rows) => {
            info!("Bulk copy successful for table {} ({} rows)", name, rows);
            CopyResult::success(name, rows)
        }
        Err(e) => {
            error!("{}", e);
            CopyResult::failure(name, e.to_string())
        }
    }
}

/// [`TableCopy`] between a source database and its clone on one server.
pub struct TableDataCopier<'a> {
    resolver: &'a ConnectionResolver,
    loader: &'a dyn BulkLoader,
    source: DatabasePool,
    clone_name: String,
}

impl<'a> TableDataCopier<'a> {
    /// Open a source pool sized for `parallel_tables` concurrent reads.
    pub async fn new(
        resolver: &'a ConnectionResolver,
        loader: &'a dyn BulkLoader,
        source_database: &str,
        clone_name: &str,
        parallel_tables: usize,
    ) -> Result<Self> {
        let max_size = u32::try_from(parallel_tables.max(1)).unwrap_or(u32::MAX);
        let source = resolver.database_pool(source_database, max_size).await?;
        Ok(Self {
            resolver,
            loader,
            source,
            clone_name: clone_name.to_string(),
        })
    }

    /// Copy every table of the source database into the clone.
    ///
    /// The clone's enabled database triggers stay disabled for the whole copy.
    pub async fn copy_all(
        &self,
        tables: &[TableDescriptor],
        parallel_tables: usize,
    ) -> Result<Vec<CopyResult>> {
        info!(
            "Copying {} tables from {} to {}",
            tables.len(),
            self.source.database(),
            self.clone_name
        );
        let mut clone = self.resolver.connect_to(&self.clone_name).await?;
        let triggers = DatabaseTriggers::suspend(&mut clone).await?;

        let results = copy_tables(self, tables, parallel_tables).await;

        let restored = triggers.restore(&mut clone).await;
        if let Err(e) = clone.close().await {
            debug!("Closing connection to {} failed: {}", self.clone_name, e);
        }
        restored?;
        Ok(results)
    }
}

#[async_trait]
impl TableCopy for TableDataCopier<'_> {
    async fn copy_table(&self, table: &TableDescriptor) -> Result<u64> {
        let destination = table.destination()?;
        let mapping = table.column_mapping();
        if mapping.is_empty() {
            return Err(CloneError::transfer(destination, "no insertable columns to copy"));
        }

        let select = table.select_statement(self.source.database())?;
        debug!("{}", select);

        let mut source = self.source.get().await?;
        let mut clone = self.resolver.connect_to(&self.clone_name).await?;

        let loaded = match source.simple_query(select).await {
            Ok(stream) => {
                let rows = stream.into_row_stream();
                self.loader.load(&mut clone, table, &mapping, rows).await
            }
            Err(e) => Err(e.into()),
        };

        if let Err(e) = clone.close().await {
            debug!("Closing connection to {} failed: {}", self.clone_name, e);
        }

        loaded.map_err(|e| match e {
            CloneError::Transfer { .. } => e,
            other => CloneError::transfer(destination, other.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ColumnDescriptor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails one named table and counts calls.
    struct FakeCopy {
        fail: &'static str,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TableCopy for FakeCopy {
        async fn copy_table(&self, table: &TableDescriptor) -> Result<u64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if table.name == self.fail {
                return Err(CloneError::transfer(
                    table.destination()?,
                    "Violation of PRIMARY KEY constraint",
                ));
            }
            Ok(table.name.len() as u64)
        }
    }

    fn tables(names: &[&str]) -> Vec<TableDescriptor> {
        names
            .iter()
            .map(|n| TableDescriptor::new("dbo", *n, vec![ColumnDescriptor::new("id")]))
            .collect()
    }

    #[tokio::test]
    async fn test_failed_table_does_not_stop_the_rest() {
        let copier = FakeCopy {
            fail: "Orders",
            calls: AtomicUsize::new(0),
        };
        let tables = tables(&["Customers", "Orders", "Invoices", "Lines"]);

        let results = copy_tables(&copier, &tables, 1).await;

        assert_eq!(copier.calls.load(Ordering::SeqCst), 4);
        assert_eq!(results.len(), 4);
        assert_eq!(results.iter().filter(|r| r.is_success()).count(), 3);

        let failed = &results[1];
        assert_eq!(failed.table, "[dbo].[Orders]");
        assert_eq!(failed.rows, 0);
        assert!(failed.error.as_deref().unwrap_or_default().contains("PRIMARY KEY"));
        assert_eq!(results[0], CopyResult::success("[dbo].[Customers]", 9));
    }

    #[tokio::test]
    async fn test_parallel_copy_keeps_table_order() {
        let copier = FakeCopy {
            fail: "none",
            calls: AtomicUsize::new(0),
        };
        let tables = tables(&["A", "Bb", "Ccc"]);

        let results = copy_tables(&copier, &tables, 8).await;
        let names: Vec<_> = results.iter().map(|r| r.table.as_str()).collect();
        assert_eq!(names, vec!["[dbo].[A]", "[dbo].[Bb]", "[dbo].[Ccc]"]);
        assert!(results.iter().all(CopyResult::is_success));
    }

    #[tokio::test]
    async fn test_no_tables_no_calls() {
        let copier = FakeCopy {
            fail: "none",
            calls: AtomicUsize::new(0),
        };
        let results = copy_tables(&copier, &[], 4).await;
        assert!(results.is_empty());
        assert_eq!(copier.calls.load(Ordering::SeqCst), 0);
    }

    /// Drives `copy_tables` from inside another `async_trait` future.
    #[async_trait]
    trait CopyPhase: Send + Sync {
        async fn copy(&self, tables: &[TableDescriptor]) -> Vec<CopyResult>;
    }

    #[async_trait]
    impl CopyPhase for FakeCopy {
        async fn copy(&self, tables: &[TableDescriptor]) -> Vec<CopyResult> {
            let copier: &dyn TableCopy = self;
            copy_tables(copier, tables, 2).await
        }
    }

    #[tokio::test]
    async fn test_copy_from_send_phase_future() {
        let copier = FakeCopy {
            fail: "Bb",
            calls: AtomicUsize::new(0),
        };
        let phase: &dyn CopyPhase = &copier;
        let results = phase.copy(&tables(&["A", "Bb"])).await;
        assert_eq!(results.len(), 2);
        assert!(results[0].is_success());
        assert!(!results[1].is_success());
    }

    #[test]
    fn test_copy_result_serialization_omits_empty_error() {
        let json = serde_json::to_string(&CopyResult::success("[dbo].[T]", 3)).unwrap();
        assert_eq!(json, r#"{"table":"[dbo].[T]","rows":3}"#);
    }
}
