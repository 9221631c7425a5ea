//! Database Enumerator and table discovery.

use tracing::{debug, info};

use crate::connection::MssqlClient;
use crate::core::identifier::quote_mssql;
use crate::core::{ColumnDescriptor, DatabaseDescriptor, TableDescriptor};
use crate::error::Result;

/// `database_id` 1-4 are master, tempdb, model and msdb; a distribution
/// database is flagged by `is_distributor`.
const LIST_DATABASES_SQL: &str = r#"
SELECT name,
       collation_name,
       CAST(CASE WHEN database_id <= 4 OR is_distributor = 1 THEN 1 ELSE 0 END AS bit) AS is_system
FROM sys.databases
ORDER BY database_id"#;

/// List every database on the instance, in server order.
pub async fn list_databases(client: &mut MssqlClient) -> Result<Vec<DatabaseDescriptor>> {
    let rows = client
        .simple_query(LIST_DATABASES_SQL)
        .await?
        .into_first_result()
        .await?;

    let mut databases = Vec::with_capacity(rows.len());
    for row in rows {
        let name: &str = row.get("name").unwrap_or_default();
        let collation: Option<&str> = row.get("collation_name");
        let is_system: bool = row.get("is_system").unwrap_or(false);
        databases.push(DatabaseDescriptor {
            name: name.to_string(),
            collation: collation.map(str::to_string),
            is_system,
        });
    }

    Ok(databases)
}

/// Drop system databases, keeping server order.
pub fn user_databases(all: Vec<DatabaseDescriptor>) -> Vec<DatabaseDescriptor> {
    all.into_iter().filter(|d| !d.is_system).collect()
}

/// List user databases and log what was found.
pub async fn list_user_databases(client: &mut MssqlClient) -> Result<Vec<DatabaseDescriptor>> {
    info!("Retrieving the databases");
    let databases = user_databases(list_databases(client).await?);
    let names: Vec<&str> = databases.iter().map(|d| d.name.as_str()).collect();
    info!(
        "Retrieved {} user databases: {}",
        databases.len(),
        names.join(", ")
    );
    Ok(databases)
}

fn list_tables_sql(database: &str) -> Result<String> {
    let db = quote_mssql(database)?;
    Ok(format!(
        r#"
SELECT s.name AS schema_name,
       t.name AS table_name,
       c.name AS column_name,
       CAST(CASE WHEN c.is_computed = 1
                   OR c.system_type_id = 189
                   OR c.generated_always_type <> 0
                 THEN 1 ELSE 0 END AS bit) AS is_computed,
       c.is_identity
FROM {db}.sys.tables t
JOIN {db}.sys.schemas s ON s.schema_id = t.schema_id
JOIN {db}.sys.columns c ON c.object_id = t.object_id
WHERE t.is_ms_shipped = 0
ORDER BY t.object_id, c.column_id"#
    ))
}

/// List the user tables of `database` with their columns.
///
/// Rowversion and generated-always period columns count as computed: the
/// server produces their values and rejects explicit inserts.
pub async fn list_tables(client: &mut MssqlClient, database: &str) -> Result<Vec<TableDescriptor>> {
    let sql = list_tables_sql(database)?;
    debug!("Listing tables of {}", database);
    let rows = client.simple_query(sql).await?.into_first_result().await?;

    let mut tables: Vec<TableDescriptor> = Vec::new();
    for row in rows {
        let schema: &str = row.get("schema_name").unwrap_or_default();
        let table: &str = row.get("table_name").unwrap_or_default();
        let column = ColumnDescriptor {
            name: row.get::<&str, _>("column_name").unwrap_or_default().to_string(),
            is_computed: row.get("is_computed").unwrap_or(false),
            is_identity: row.get("is_identity").unwrap_or(false),
        };

        match tables.last_mut() {
            Some(last) if last.schema == schema && last.name == table => last.columns.push(column),
            _ => tables.push(TableDescriptor::new(schema, table, vec![column])),
        }
    }

    info!("Found {} tables in {}", tables.len(), database);
    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db(name: &str, is_system: bool) -> DatabaseDescriptor {
        DatabaseDescriptor {
            name: name.to_string(),
            collation: Some("SQL_Latin1_General_CP1_CI_AS".to_string()),
            is_system,
        }
    }

    #[test]
    fn test_user_databases_excludes_system() {
        let all = vec![
            db("master", true),
            db("tempdb", true),
            db("model", true),
            db("msdb", true),
            db("Sales", false),
        ];
        let names: Vec<_> = user_databases(all).into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["Sales"]);
    }

    #[test]
    fn test_user_databases_keeps_server_order() {
        let all = vec![db("Zeta", false), db("master", true), db("Alpha", false)];
        let names: Vec<_> = user_databases(all).into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["Zeta", "Alpha"]);
    }

    #[test]
    fn test_list_tables_sql_quotes_database() {
        let sql = list_tables_sql("Sales]x").unwrap();
        assert!(sql.contains("FROM [Sales]]x].sys.tables t"));
        assert!(sql.contains("is_ms_shipped = 0"));
        assert!(list_tables_sql("").is_err());
    }
}
