//! Bulk Loader: writes a row stream into a destination table.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::TryStreamExt;
use tiberius::{ColumnData, Row, ToSql, TokenRow};
use tracing::{debug, warn};

use crate::cloner::StatementExecutor;
use crate::connection::MssqlClient;
use crate::core::identifier::bracket;
use crate::core::{position_by_name, ColumnMapping, TableDescriptor};
use crate::error::{CloneError, Result};

/// Maximum string length (in bytes) for TDS bulk insert.
/// Tiberius bulk insert has a hard limit of 65535 bytes for UTF-16 encoded strings.
const BULK_INSERT_STRING_LIMIT: usize = 65535;

/// SQL Server allows 2100 parameters per request; stay below it.
const MAX_INSERT_PARAMS: usize = 2000;

/// Row constructor limit of a single `INSERT ... VALUES`.
const MAX_INSERT_ROWS: usize = 1000;

/// Types the TDS bulk path cannot encode; tables holding them use INSERT.
const BULK_INCOMPATIBLE_TYPES: &[&str] = &[
    "xml",
    "sql_variant",
    "geography",
    "geometry",
    "hierarchyid",
    "image",
    "text",
    "ntext",
];

/// Forward-only stream of source rows.
pub type RowStream<'a> = BoxStream<'a, tiberius::Result<Row>>;

/// Writes every row of a stream into a destination table, or fails.
#[async_trait]
pub trait BulkLoader: Send + Sync {
    /// Load `rows` into `table` inside the database `destination` is scoped to.
    /// Value `i` of each row belongs to `mapping.entries()[i]`.
    async fn load<'a>(
        &self,
        destination: &mut MssqlClient,
        table: &TableDescriptor,
        mapping: &ColumnMapping,
        rows: RowStream<'a>,
    ) -> Result<u64>;
}

/// A column of the destination table as the server reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationColumn {
    pub name: String,
    pub type_name: String,
    pub is_computed: bool,
    pub is_identity: bool,
}

/// How rows reach the destination table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadMethod {
    /// TDS bulk load; `order[i]` is the source position of destination column `i`.
    Bulk { order: Vec<usize> },
    /// Batched parameterized INSERT in mapping order.
    Insert { identity_insert: bool },
}

/// Check the mapping against the destination layout and pick the load path.
pub fn plan_load(
    table: &str,
    layout: &[DestinationColumn],
    mapping: &ColumnMapping,
) -> Result<LoadMethod> {
    if mapping.is_empty() {
        return Err(CloneError::transfer(table, "no insertable columns to copy"));
    }

    let mut identity_insert = false;
    for entry in mapping.entries() {
        let names = layout.iter().map(|c| c.name.as_str());
        let column = position_by_name(names, &entry.destination)
            .map(|i| &layout[i])
            .ok_or_else(|| {
                CloneError::transfer(
                    table,
                    format!("mapped column {} does not exist at the destination", bracket(&entry.destination)),
                )
            })?;
        if column.is_computed {
            return Err(CloneError::transfer(
                table,
                format!("mapped column {} is not writable at the destination", bracket(&column.name)),
            ));
        }
        identity_insert |= column.is_identity;
    }

    let plain = layout.iter().all(|c| {
        !c.is_computed
            && !c.is_identity
            && !BULK_INCOMPATIBLE_TYPES.contains(&c.type_name.to_lowercase().as_str())
    });
    let order: Option<Vec<usize>> = layout.iter().map(|c| mapping.source_index(&c.name)).collect();

    match order {
        Some(order) if plain && order.len() == mapping.len() => Ok(LoadMethod::Bulk { order }),
        _ => Ok(LoadMethod::Insert { identity_insert }),
    }
}

/// Check if a row contains any values that exceed the bulk insert limit.
fn row_has_oversized_values(row: &[ColumnData<'static>]) -> bool {
    row.iter().any(|value| match value {
        // UTF-16 byte length: 2 bytes per code unit, surrogate pairs count twice.
        ColumnData::String(Some(s)) => {
            s.chars().map(|c| c.len_utf16() * 2).sum::<usize>() > BULK_INSERT_STRING_LIMIT
        }
        ColumnData::Binary(Some(b)) => b.len() > BULK_INSERT_STRING_LIMIT,
        _ => false,
    })
}

/// Rows per INSERT statement for a given column count.
fn rows_per_statement(columns: usize) -> usize {
    (MAX_INSERT_PARAMS / columns.max(1)).clamp(1, MAX_INSERT_ROWS)
}

/// `INSERT INTO t ([a], [b]) VALUES (@P1, @P2), (@P3, @P4)`.
fn insert_statement(qualified_table: &str, columns: &[String], rows: usize) -> String {
    let column_list = columns.iter().map(|c| bracket(c)).collect::<Vec<_>>().join(", ");
    let mut param = 0;
    let groups: Vec<String> = (0..rows)
        .map(|_| {
            let placeholders: Vec<String> = (0..columns.len())
                .map(|_| {
                    param += 1;
                    format!("@P{}", param)
                })
                .collect();
            format!("({})", placeholders.join(", "))
        })
        .collect();
    format!(
        "INSERT INTO {} ({}) VALUES {}",
        qualified_table,
        column_list,
        groups.join(", ")
    )
}

/// Owned column value passed as a query parameter.
struct SqlParam(ColumnData<'static>);

impl ToSql for SqlParam {
    fn to_sql(&self) -> ColumnData<'_> {
        self.0.clone()
    }
}

/// Constraints and triggers switched off for the duration of a load.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct Suspended {
    constraints: Vec<String>,
    triggers: Vec<String>,
}

impl Suspended {
    fn statements(&self, qualified_table: &str, schema: &str, enable: bool) -> Vec<String> {
        let mut statements = Vec::new();
        if !self.constraints.is_empty() {
            statements.push(format!(
                "ALTER TABLE {} {} CONSTRAINT {}",
                qualified_table,
                if enable { "CHECK" } else { "NOCHECK" },
                self.constraints.iter().map(|c| bracket(c)).collect::<Vec<_>>().join(", ")
            ));
        }
        if !self.triggers.is_empty() {
            statements.push(format!(
                "{} TRIGGER {} ON {}",
                if enable { "ENABLE" } else { "DISABLE" },
                self.triggers
                    .iter()
                    .map(|t| format!("{}.{}", bracket(schema), bracket(t)))
                    .collect::<Vec<_>>()
                    .join(", "),
                qualified_table
            ));
        }
        statements
    }
}

/// Enabled DDL triggers of a clone database, switched off while its tables load.
///
/// Loads disable constraints with `ALTER TABLE`, which fires `DDL_TABLE_EVENTS`
/// triggers scripted from the source.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DatabaseTriggers {
    names: Vec<String>,
}

impl DatabaseTriggers {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    /// Find the enabled database triggers and disable them.
    pub async fn suspend(client: &mut MssqlClient) -> Result<Self> {
        let rows = client
            .simple_query(ENABLED_DATABASE_TRIGGERS_SQL)
            .await?
            .into_first_result()
            .await?;

        let mut names = Vec::with_capacity(rows.len());
        for row in &rows {
            names.push(row.try_get::<&str, _>("name")?.unwrap_or_default().to_string());
        }
        let triggers = Self::new(names);
        triggers.apply(client, false).await?;
        Ok(triggers)
    }

    /// Re-enable the triggers `suspend` disabled.
    pub async fn restore<E>(&self, executor: &mut E) -> Result<()>
    where
        E: StatementExecutor + ?Sized,
    {
        self.apply(executor, true).await
    }

    async fn apply<E>(&self, executor: &mut E, enable: bool) -> Result<()>
    where
        E: StatementExecutor + ?Sized,
    {
        if let Some(statement) = self.statement(enable) {
            debug!("{}", statement);
            executor.execute_batch(&statement).await?;
        }
        Ok(())
    }

    fn statement(&self, enable: bool) -> Option<String> {
        if self.names.is_empty() {
            return None;
        }
        Some(format!(
            "{} TRIGGER {} ON DATABASE",
            if enable { "ENABLE" } else { "DISABLE" },
            self.names.iter().map(|t| bracket(t)).collect::<Vec<_>>().join(", ")
        ))
    }
}

const ENABLED_DATABASE_TRIGGERS_SQL: &str =
    "SELECT name FROM sys.triggers WHERE parent_class = 0 AND is_disabled = 0 ORDER BY name";

const LAYOUT_SQL: &str = r#"
SELECT c.name,
       TYPE_NAME(c.system_type_id) AS type_name,
       CAST(CASE WHEN c.is_computed = 1 OR c.system_type_id = 189 OR c.generated_always_type <> 0
                 THEN 1 ELSE 0 END AS bit) AS is_computed,
       c.is_identity
FROM sys.columns c
WHERE c.object_id = OBJECT_ID(@P1)
ORDER BY c.column_id"#;

const ENABLED_CHECKS_SQL: &str = r#"
SELECT name, CAST(0 AS bit) AS is_trigger FROM sys.foreign_keys
WHERE parent_object_id = OBJECT_ID(@P1) AND is_disabled = 0
UNION ALL
SELECT name, CAST(0 AS bit) FROM sys.check_constraints
WHERE parent_object_id = OBJECT_ID(@P1) AND is_disabled = 0
UNION ALL
SELECT name, CAST(1 AS bit) FROM sys.triggers
WHERE parent_id = OBJECT_ID(@P1) AND is_disabled = 0"#;

/// Bulk loader over a Tiberius connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct TdsBulkLoader;

impl TdsBulkLoader {
    async fn layout(client: &mut MssqlClient, qualified_table: &str) -> Result<Vec<DestinationColumn>> {
        let rows = client
            .query(LAYOUT_SQL, &[&qualified_table])
            .await?
            .into_first_result()
            .await?;

        let mut layout = Vec::with_capacity(rows.len());
        for row in &rows {
            layout.push(DestinationColumn {
                name: row.try_get::<&str, _>("name")?.unwrap_or_default().to_string(),
                type_name: row.try_get::<&str, _>("type_name")?.unwrap_or_default().to_string(),
                is_computed: row.try_get::<bool, _>("is_computed")?.unwrap_or(false),
                is_identity: row.try_get::<bool, _>("is_identity")?.unwrap_or(false),
            });
        }
        Ok(layout)
    }

    async fn suspend(
        client: &mut MssqlClient,
        qualified_table: &str,
        schema: &str,
    ) -> Result<Suspended> {
        let rows = client
            .query(ENABLED_CHECKS_SQL, &[&qualified_table])
            .await?
            .into_first_result()
            .await?;

        let mut suspended = Suspended::default();
        for row in rows {
            let name = row.try_get::<&str, _>("name")?.unwrap_or_default().to_string();
            if row.try_get::<bool, _>("is_trigger")?.unwrap_or(false) {
                suspended.triggers.push(name);
            } else {
                suspended.constraints.push(name);
            }
        }

        for statement in suspended.statements(qualified_table, schema, false) {
            debug!("{}", statement);
            client.execute_batch(&statement).await?;
        }
        Ok(suspended)
    }

    async fn restore(
        client: &mut MssqlClient,
        suspended: &Suspended,
        qualified_table: &str,
        schema: &str,
    ) -> Result<()> {
        for statement in suspended.statements(qualified_table, schema, true) {
            debug!("{}", statement);
            client.execute_batch(&statement).await?;
        }
        Ok(())
    }

    async fn bulk_copy<'a>(
        client: &mut MssqlClient,
        qualified_table: &str,
        columns: &[String],
        order: &[usize],
        mut rows: RowStream<'a>,
    ) -> Result<u64> {
        let mut oversized_rows = Vec::new();
        let mut bulk_count = 0u64;

        let mut bulk_load = client.bulk_insert(qualified_table).await.map_err(|e| {
            CloneError::transfer(qualified_table, format!("bulk insert init: {}", e))
        })?;

        while let Some(row) = rows.try_next().await? {
            let mut values: Vec<Option<ColumnData<'static>>> = row.into_iter().map(Some).collect();
            let ordered: Vec<ColumnData<'static>> = order
                .iter()
                .map(|&i| values.get_mut(i).and_then(Option::take))
                .collect::<Option<_>>()
                .ok_or_else(|| {
                    CloneError::transfer(qualified_table, "source row does not match the column mapping")
                })?;

            if row_has_oversized_values(&ordered) {
                oversized_rows.push(ordered);
                continue;
            }

            let mut token_row = TokenRow::new();
            for value in ordered {
                token_row.push(value);
            }
            bulk_load.send(token_row).await.map_err(|e| {
                CloneError::transfer(qualified_table, format!("bulk insert send: {}", e))
            })?;
            bulk_count += 1;
        }

        bulk_load.finalize().await.map_err(|e| {
            CloneError::transfer(qualified_table, format!("bulk insert finalize: {}", e))
        })?;

        let mut total = bulk_count;
        if !oversized_rows.is_empty() {
            debug!(
                "Falling back to INSERT for {} rows with oversized values in {}",
                oversized_rows.len(),
                qualified_table
            );
            for batch in oversized_rows.chunks(rows_per_statement(columns.len())) {
                total += Self::insert_batch(client, qualified_table, columns, batch).await?;
            }
        }

        Ok(total)
    }

    async fn insert_copy<'a>(
        client: &mut MssqlClient,
        qualified_table: &str,
        columns: &[String],
        mut rows: RowStream<'a>,
    ) -> Result<u64> {
        let batch_size = rows_per_statement(columns.len());
        let mut batch: Vec<Vec<ColumnData<'static>>> = Vec::with_capacity(batch_size);
        let mut total = 0u64;

        while let Some(row) = rows.try_next().await? {
            let values: Vec<ColumnData<'static>> = row.into_iter().collect();
            if values.len() != columns.len() {
                return Err(CloneError::transfer(
                    qualified_table,
                    "source row does not match the column mapping",
                ));
            }
            batch.push(values);
            if batch.len() == batch_size {
                total += Self::insert_batch(client, qualified_table, columns, &batch).await?;
                batch.clear();
            }
        }
        if !batch.is_empty() {
            total += Self::insert_batch(client, qualified_table, columns, &batch).await?;
        }

        Ok(total)
    }

    async fn insert_batch(
        client: &mut MssqlClient,
        qualified_table: &str,
        columns: &[String],
        batch: &[Vec<ColumnData<'static>>],
    ) -> Result<u64> {
        let sql = insert_statement(qualified_table, columns, batch.len());
        let params: Vec<SqlParam> = batch
            .iter()
            .flat_map(|row| row.iter().cloned().map(SqlParam))
            .collect();
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p as &dyn ToSql).collect();

        client.execute(sql.as_str(), &param_refs).await.map_err(|e| {
            CloneError::transfer(
                qualified_table,
                format!("batched INSERT ({} rows): {}", batch.len(), e),
            )
        })?;
        Ok(batch.len() as u64)
    }
}

#[async_trait]
impl BulkLoader for TdsBulkLoader {
    async fn load<'a>(
        &self,
        destination: &mut MssqlClient,
        table: &TableDescriptor,
        mapping: &ColumnMapping,
        rows: RowStream<'a>,
    ) -> Result<u64> {
        let qualified_table = table.destination()?;
        let layout = Self::layout(destination, &qualified_table).await?;
        if layout.is_empty() {
            return Err(CloneError::transfer(
                &qualified_table,
                "destination table does not exist",
            ));
        }
        let method = plan_load(&qualified_table, &layout, mapping)?;

        let suspended = Self::suspend(destination, &qualified_table, &table.schema).await?;

        let loaded = match &method {
            LoadMethod::Bulk { order } => {
                let columns: Vec<String> = layout.iter().map(|c| c.name.clone()).collect();
                debug!("Loading {} through INSERT BULK", qualified_table);
                Self::bulk_copy(destination, &qualified_table, &columns, order, rows).await
            }
            LoadMethod::Insert { identity_insert } => {
                let columns: Vec<String> = mapping
                    .entries()
                    .iter()
                    .map(|m| m.destination.clone())
                    .collect();
                debug!("Loading {} through batched INSERT", qualified_table);
                let identity_on = if *identity_insert {
                    destination
                        .execute_batch(&format!("SET IDENTITY_INSERT {} ON", qualified_table))
                        .await
                } else {
                    Ok(())
                };
                match identity_on {
                    Ok(()) => {
                        let loaded = Self::insert_copy(destination, &qualified_table, &columns, rows).await;
                        if *identity_insert {
                            if let Err(e) = destination
                                .execute_batch(&format!("SET IDENTITY_INSERT {} OFF", qualified_table))
                                .await
                            {
                                warn!("Could not reset IDENTITY_INSERT on {}: {}", qualified_table, e);
                            }
                        }
                        loaded
                    }
                    Err(e) => Err(e),
                }
            }
        };

        let restored = Self::restore(destination, &suspended, &qualified_table, &table.schema).await;
        match (loaded, restored) {
            (Ok(count), Ok(())) => Ok(count),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), restored) => {
                if let Err(restore_error) = restored {
                    warn!(
                        "Could not re-enable constraints and triggers on {}: {}",
                        qualified_table, restore_error
                    );
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    fn column(name: &str, type_name: &str) -> DestinationColumn {
        DestinationColumn {
            name: name.to_string(),
            type_name: type_name.to_string(),
            is_computed: false,
            is_identity: false,
        }
    }

    #[test]
    fn test_plain_table_uses_bulk_in_destination_order() {
        let layout = vec![column("name", "nvarchar"), column("id", "int")];
        let mapping = ColumnMapping::by_name(["id", "name"]);
        let method = plan_load("[dbo].[Customers]", &layout, &mapping).unwrap();
        assert_eq!(method, LoadMethod::Bulk { order: vec![1, 0] });
    }

    #[test]
    fn test_columns_differing_only_in_case_keep_their_positions() {
        let layout = vec![column("a", "int"), column("A", "int")];
        let mapping = ColumnMapping::by_name(["a", "A"]);
        let method = plan_load("[dbo].[Cased]", &layout, &mapping).unwrap();
        assert_eq!(method, LoadMethod::Bulk { order: vec![0, 1] });

        let layout = vec![column("A", "int"), column("a", "int")];
        let method = plan_load("[dbo].[Cased]", &layout, &mapping).unwrap();
        assert_eq!(method, LoadMethod::Bulk { order: vec![1, 0] });
    }

    #[test]
    fn test_identity_table_uses_identity_insert() {
        let mut id = column("id", "int");
        id.is_identity = true;
        let mut tax = column("computedTax", "decimal");
        tax.is_computed = true;
        let layout = vec![id, column("total", "decimal"), tax];

        let mapping = ColumnMapping::by_name(["id", "total"]);
        let method = plan_load("[dbo].[Orders]", &layout, &mapping).unwrap();
        assert_eq!(method, LoadMethod::Insert { identity_insert: true });
    }

    #[test]
    fn test_incompatible_type_uses_insert() {
        let layout = vec![column("id", "int"), column("doc", "xml")];
        let mapping = ColumnMapping::by_name(["id", "doc"]);
        assert_eq!(
            plan_load("[dbo].[Docs]", &layout, &mapping).unwrap(),
            LoadMethod::Insert { identity_insert: false }
        );
    }

    #[test]
    fn test_unmapped_destination_column_uses_insert() {
        let layout = vec![column("id", "int"), column("extra", "int")];
        let mapping = ColumnMapping::by_name(["id"]);
        assert_eq!(
            plan_load("[dbo].[T]", &layout, &mapping).unwrap(),
            LoadMethod::Insert { identity_insert: false }
        );
    }

    #[test]
    fn test_mapping_to_missing_or_computed_column_fails() {
        let mut computed = column("tax", "decimal");
        computed.is_computed = true;
        let layout = vec![column("id", "int"), computed];

        let err = plan_load("[dbo].[T]", &layout, &ColumnMapping::by_name(["id", "nope"])).unwrap_err();
        assert!(err.to_string().contains("[nope] does not exist"));

        let err = plan_load("[dbo].[T]", &layout, &ColumnMapping::by_name(["tax"])).unwrap_err();
        assert!(err.to_string().contains("[tax] is not writable"));

        let err = plan_load("[dbo].[T]", &layout, &ColumnMapping::default()).unwrap_err();
        assert!(err.to_string().contains("no insertable columns"));
    }

    #[test]
    fn test_rows_per_statement_respects_parameter_limit() {
        assert_eq!(rows_per_statement(2), 1000);
        assert_eq!(rows_per_statement(3), 666);
        assert_eq!(rows_per_statement(4000), 1);
        assert_eq!(rows_per_statement(0), 1000);
    }

    #[test]
    fn test_insert_statement_placeholders() {
        let sql = insert_statement("[dbo].[Orders]", &["id".to_string(), "total".to_string()], 2);
        assert_eq!(
            sql,
            "INSERT INTO [dbo].[Orders] ([id], [total]) VALUES (@P1, @P2), (@P3, @P4)"
        );
    }

    #[test]
    fn test_row_has_oversized_values() {
        let small = vec![ColumnData::String(Some(Cow::Owned("hello".to_string()))), ColumnData::I32(Some(1))];
        assert!(!row_has_oversized_values(&small));

        // 32768 BMP characters = 65536 UTF-16 bytes
        let big = vec![ColumnData::String(Some(Cow::Owned("x".repeat(32768))))];
        assert!(row_has_oversized_values(&big));

        let at_limit = vec![ColumnData::Binary(Some(Cow::Owned(vec![0u8; BULK_INSERT_STRING_LIMIT])))];
        assert!(!row_has_oversized_values(&at_limit));
    }

    #[test]
    fn test_suspend_and_restore_statements() {
        let suspended = Suspended {
            constraints: vec!["FK_Orders_Customers".into(), "CK_total".into()],
            triggers: vec!["trOrders".into()],
        };
        assert_eq!(
            suspended.statements("[dbo].[Orders]", "dbo", false),
            vec![
                "ALTER TABLE [dbo].[Orders] NOCHECK CONSTRAINT [FK_Orders_Customers], [CK_total]".to_string(),
                "DISABLE TRIGGER [dbo].[trOrders] ON [dbo].[Orders]".to_string(),
            ]
        );
        assert_eq!(
            suspended.statements("[dbo].[Orders]", "dbo", true),
            vec![
                "ALTER TABLE [dbo].[Orders] CHECK CONSTRAINT [FK_Orders_Customers], [CK_total]".to_string(),
                "ENABLE TRIGGER [dbo].[trOrders] ON [dbo].[Orders]".to_string(),
            ]
        );
        assert!(Suspended::default().statements("[dbo].[T]", "dbo", false).is_empty());
    }

    /// Records executed batches.
    #[derive(Default)]
    struct Recorder(Vec<String>);

    #[async_trait]
    impl StatementExecutor for Recorder {
        async fn execute_batch(&mut self, sql: &str) -> Result<()> {
            self.0.push(sql.to_string());
            Ok(())
        }
    }

    #[test]
    fn test_database_trigger_statements() {
        let triggers = DatabaseTriggers::new(vec!["trLockSchema".into(), "trAudit".into()]);
        assert_eq!(
            triggers.statement(false).as_deref(),
            Some("DISABLE TRIGGER [trLockSchema], [trAudit] ON DATABASE")
        );
        assert_eq!(
            triggers.statement(true).as_deref(),
            Some("ENABLE TRIGGER [trLockSchema], [trAudit] ON DATABASE")
        );
        assert_eq!(DatabaseTriggers::default().statement(false), None);
    }

    #[tokio::test]
    async fn test_database_triggers_wrap_table_loads() {
        let mut client = Recorder::default();
        let triggers = DatabaseTriggers::new(vec!["trLockSchema".into()]);

        let constraints = Suspended {
            constraints: vec!["FK_Orders_Customers".into()],
            triggers: Vec::new(),
        };

        triggers.apply(&mut client, false).await.unwrap();
        for statement in constraints.statements("[dbo].[Orders]", "dbo", false) {
            client.execute_batch(&statement).await.unwrap();
        }
        triggers.restore(&mut client).await.unwrap();

        assert_eq!(
            client.0,
            vec![
                "DISABLE TRIGGER [trLockSchema] ON DATABASE",
                "ALTER TABLE [dbo].[Orders] NOCHECK CONSTRAINT [FK_Orders_Customers]",
                "ENABLE TRIGGER [trLockSchema] ON DATABASE",
            ]
        );

        let mut client = Recorder::default();
        DatabaseTriggers::default().restore(&mut client).await.unwrap();
        assert!(client.0.is_empty());
    }
}
