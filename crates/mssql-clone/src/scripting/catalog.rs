//! Reads a [`CatalogSnapshot`] from the `sys.*` views of the connected database.

use std::collections::HashMap;

use tiberius::Row;
use tracing::debug;

use super::model::*;
use crate::connection::MssqlClient;
use crate::error::Result;

async fn fetch(client: &mut MssqlClient, sql: &str) -> Result<Vec<Row>> {
    Ok(client.simple_query(sql).await?.into_first_result().await?)
}

fn text(row: &Row, column: &str) -> Result<String> {
    Ok(row.try_get::<&str, _>(column)?.unwrap_or_default().to_string())
}

fn opt_text(row: &Row, column: &str) -> Result<Option<String>> {
    Ok(row.try_get::<&str, _>(column)?.map(str::to_string))
}

fn flag(row: &Row, column: &str) -> Result<bool> {
    Ok(row.try_get::<bool, _>(column)?.unwrap_or(false))
}

fn int(row: &Row, column: &str) -> Result<i32> {
    Ok(row.try_get::<i32, _>(column)?.unwrap_or(0))
}

fn name(row: &Row, schema: &str, object: &str) -> Result<ObjectName> {
    Ok(ObjectName::new(text(row, schema)?, text(row, object)?))
}

const SCHEMAS_SQL: &str = r#"
SELECT s.name
FROM sys.schemas s
WHERE s.schema_id > 4 AND s.schema_id < 16384
ORDER BY s.schema_id"#;

const XML_COLLECTIONS_SQL: &str = r#"
SELECT SCHEMA_NAME(x.schema_id) AS schema_name,
       x.name,
       CAST(XML_SCHEMA_NAMESPACE(SCHEMA_NAME(x.schema_id), x.name) AS nvarchar(max)) AS definition
FROM sys.xml_schema_collections x
WHERE x.schema_id <> SCHEMA_ID('sys')
ORDER BY x.xml_collection_id"#;

const ALIAS_TYPES_SQL: &str = r#"
SELECT SCHEMA_NAME(ty.schema_id) AS schema_name,
       ty.name,
       TYPE_NAME(ty.system_type_id) AS base_type,
       CAST(ty.max_length AS int) AS max_length,
       CAST(ty.precision AS int) AS precision,
       CAST(ty.scale AS int) AS scale,
       ty.is_nullable
FROM sys.types ty
WHERE ty.is_user_defined = 1 AND ty.is_table_type = 0 AND ty.is_assembly_type = 0
ORDER BY ty.user_type_id"#;

const TABLE_TYPES_SQL: &str = r#"
SELECT tt.type_table_object_id AS object_id,
       SCHEMA_NAME(tt.schema_id) AS schema_name,
       tt.name
FROM sys.table_types tt
WHERE tt.is_user_defined = 1
ORDER BY tt.user_type_id"#;

const SEQUENCES_SQL: &str = r#"
SELECT SCHEMA_NAME(s.schema_id) AS schema_name,
       s.name,
       TYPE_NAME(s.system_type_id) AS type_name,
       CAST(s.precision AS int) AS precision,
       CAST(s.start_value AS nvarchar(40)) AS start_value,
       CAST(s.increment AS nvarchar(40)) AS increment,
       CAST(s.minimum_value AS nvarchar(40)) AS minimum_value,
       CAST(s.maximum_value AS nvarchar(40)) AS maximum_value,
       s.is_cycling,
       s.is_cached,
       s.cache_size
FROM sys.sequences s
ORDER BY s.object_id"#;

const DEFAULTS_SQL: &str = r#"
SELECT SCHEMA_NAME(o.schema_id) AS schema_name, o.name, m.definition
FROM sys.objects o
JOIN sys.sql_modules m ON m.object_id = o.object_id
WHERE o.type = 'D' AND o.parent_object_id = 0 AND o.is_ms_shipped = 0
ORDER BY o.object_id"#;

const DEFAULT_BINDINGS_SQL: &str = r#"
SELECT SCHEMA_NAME(d.schema_id) AS default_schema, d.name AS default_name,
       SCHEMA_NAME(ty.schema_id) AS target_schema, ty.name AS target_name,
       CAST(NULL AS sysname) AS column_name
FROM sys.types ty
JOIN sys.objects d ON d.object_id = ty.default_object_id
WHERE d.type = 'D' AND d.parent_object_id = 0
UNION ALL
SELECT SCHEMA_NAME(d.schema_id), d.name,
       SCHEMA_NAME(t.schema_id), t.name,
       c.name
FROM sys.columns c
JOIN sys.tables t ON t.object_id = c.object_id
JOIN sys.objects d ON d.object_id = c.default_object_id
WHERE d.type = 'D' AND d.parent_object_id = 0 AND t.is_ms_shipped = 0"#;

const TABLES_SQL: &str = r#"
SELECT t.object_id, SCHEMA_NAME(t.schema_id) AS schema_name, t.name
FROM sys.tables t
WHERE t.is_ms_shipped = 0
ORDER BY t.object_id"#;

const COLUMNS_SQL: &str = r#"
SELECT c.object_id,
       c.name,
       ty.name AS type_name,
       SCHEMA_NAME(ty.schema_id) AS type_schema,
       ty.is_user_defined,
       CAST(c.max_length AS int) AS max_length,
       CAST(c.precision AS int) AS precision,
       CAST(c.scale AS int) AS scale,
       c.collation_name,
       c.is_nullable,
       CAST(ic.seed_value AS nvarchar(40)) AS identity_seed,
       CAST(ic.increment_value AS nvarchar(40)) AS identity_increment,
       cc.definition AS computed_definition,
       ISNULL(cc.is_persisted, 0) AS is_persisted,
       dc.name AS default_name,
       dc.definition AS default_definition,
       SCHEMA_NAME(xc.schema_id) AS xml_schema,
       xc.name AS xml_collection,
       c.is_xml_document,
       c.is_rowguidcol,
       c.is_sparse
FROM sys.columns c
JOIN sys.types ty ON ty.user_type_id = c.user_type_id
LEFT JOIN sys.identity_columns ic ON ic.object_id = c.object_id AND ic.column_id = c.column_id
LEFT JOIN sys.computed_columns cc ON cc.object_id = c.object_id AND cc.column_id = c.column_id
LEFT JOIN sys.default_constraints dc ON dc.object_id = c.default_object_id
LEFT JOIN sys.xml_schema_collections xc ON xc.xml_collection_id = c.xml_collection_id AND c.xml_collection_id <> 0
WHERE c.object_id IN (
    SELECT object_id FROM sys.tables WHERE is_ms_shipped = 0
    UNION ALL
    SELECT type_table_object_id FROM sys.table_types WHERE is_user_defined = 1
)
ORDER BY c.object_id, c.column_id"#;

const MODULES_SQL: &str = r#"
SELECT o.object_id,
       SCHEMA_NAME(o.schema_id) AS schema_name,
       o.name,
       RTRIM(o.type) AS type_code,
       m.definition,
       m.uses_ansi_nulls,
       m.uses_quoted_identifier,
       OBJECT_SCHEMA_NAME(o.parent_object_id) AS parent_schema,
       OBJECT_NAME(o.parent_object_id) AS parent_name,
       ISNULL(tr.is_disabled, 0) AS is_disabled
FROM sys.objects o
JOIN sys.sql_modules m ON m.object_id = o.object_id
LEFT JOIN sys.triggers tr ON tr.object_id = o.object_id
WHERE o.is_ms_shipped = 0 AND o.type IN ('V', 'P', 'FN', 'IF', 'TF', 'TR')
ORDER BY o.object_id"#;

const DATABASE_TRIGGERS_SQL: &str = r#"
SELECT tr.name, m.definition, m.uses_ansi_nulls, m.uses_quoted_identifier, tr.is_disabled
FROM sys.triggers tr
JOIN sys.sql_modules m ON m.object_id = tr.object_id
WHERE tr.parent_class = 0 AND tr.is_ms_shipped = 0
ORDER BY tr.object_id"#;

/// Constraint dependencies are attributed to the table that owns them.
const DEPENDENCIES_SQL: &str = r#"
SELECT DISTINCT
       CASE WHEN o.type IN ('C', 'D') AND o.parent_object_id <> 0
            THEN o.parent_object_id ELSE d.referencing_id END AS referencing_id,
       d.referenced_id
FROM sys.sql_expression_dependencies d
JOIN sys.objects o ON o.object_id = d.referencing_id
WHERE d.referenced_id IS NOT NULL"#;

const INDEXES_SQL: &str = r#"
SELECT i.object_id,
       i.index_id,
       SCHEMA_NAME(o.schema_id) AS schema_name,
       o.name AS table_name,
       i.name,
       i.type_desc,
       i.is_unique,
       i.is_primary_key,
       i.is_unique_constraint,
       i.filter_definition,
       i.ignore_dup_key,
       CAST(i.fill_factor AS int) AS fill_factor,
       i.is_disabled
FROM sys.indexes i
JOIN sys.objects o ON o.object_id = i.object_id
WHERE o.is_ms_shipped = 0 AND o.type IN ('U', 'V') AND i.type > 0 AND i.is_hypothetical = 0
ORDER BY i.object_id, i.index_id"#;

const INDEX_COLUMNS_SQL: &str = r#"
SELECT ic.object_id, ic.index_id, c.name, ic.is_descending_key, ic.is_included_column
FROM sys.index_columns ic
JOIN sys.columns c ON c.object_id = ic.object_id AND c.column_id = ic.column_id
JOIN sys.objects o ON o.object_id = ic.object_id
WHERE o.is_ms_shipped = 0 AND o.type IN ('U', 'V')
ORDER BY ic.object_id, ic.index_id, ic.key_ordinal, ic.index_column_id"#;

const CHECK_CONSTRAINTS_SQL: &str = r#"
SELECT SCHEMA_NAME(t.schema_id) AS schema_name,
       t.name AS table_name,
       cc.name,
       cc.definition,
       cc.is_disabled,
       cc.is_not_trusted,
       cc.is_not_for_replication
FROM sys.check_constraints cc
JOIN sys.tables t ON t.object_id = cc.parent_object_id
WHERE t.is_ms_shipped = 0
ORDER BY cc.parent_object_id, cc.object_id"#;

const FOREIGN_KEYS_SQL: &str = r#"
SELECT fk.object_id,
       SCHEMA_NAME(pt.schema_id) AS schema_name,
       pt.name AS table_name,
       fk.name,
       SCHEMA_NAME(rt.schema_id) AS ref_schema,
       rt.name AS ref_table,
       fk.delete_referential_action_desc,
       fk.update_referential_action_desc,
       fk.is_disabled,
       fk.is_not_trusted,
       fk.is_not_for_replication
FROM sys.foreign_keys fk
JOIN sys.tables pt ON fk.parent_object_id = pt.object_id
JOIN sys.tables rt ON fk.referenced_object_id = rt.object_id
WHERE pt.is_ms_shipped = 0
ORDER BY fk.parent_object_id, fk.object_id"#;

const FOREIGN_KEY_COLUMNS_SQL: &str = r#"
SELECT fkc.constraint_object_id, pc.name AS parent_column, rc.name AS ref_column
FROM sys.foreign_key_columns fkc
JOIN sys.columns pc ON pc.object_id = fkc.parent_object_id AND pc.column_id = fkc.parent_column_id
JOIN sys.columns rc ON rc.object_id = fkc.referenced_object_id AND rc.column_id = fkc.referenced_column_id
ORDER BY fkc.constraint_object_id, fkc.constraint_column_id"#;

const SEARCH_PROPERTY_LISTS_SQL: &str = r#"
SELECT l.name AS list_name,
       p.property_name,
       CAST(p.property_set_guid AS nvarchar(36)) AS set_guid,
       p.property_int_id,
       p.property_description
FROM sys.registered_search_property_lists l
LEFT JOIN sys.registered_search_properties p ON p.property_list_id = l.property_list_id
ORDER BY l.property_list_id, p.property_id"#;

/// Read every scripted object class from the connected database.
pub async fn read_snapshot(client: &mut MssqlClient) -> Result<CatalogSnapshot> {
    let mut snapshot = CatalogSnapshot::default();

    for row in fetch(client, SCHEMAS_SQL).await? {
        snapshot.schemas.push(SchemaDef {
            name: text(&row, "name")?,
        });
    }

    for row in fetch(client, XML_COLLECTIONS_SQL).await? {
        snapshot.xml_schema_collections.push(XmlSchemaCollectionDef {
            name: name(&row, "schema_name", "name")?,
            definition: text(&row, "definition")?,
        });
    }

    let mut columns = read_columns(client).await?;

    for row in fetch(client, ALIAS_TYPES_SQL).await? {
        snapshot.user_types.push(UserTypeDef::Alias {
            name: name(&row, "schema_name", "name")?,
            base: TypeRef::system(
                text(&row, "base_type")?,
                int(&row, "max_length")?,
                int(&row, "precision")?,
                int(&row, "scale")?,
            ),
            is_nullable: flag(&row, "is_nullable")?,
        });
    }
    for row in fetch(client, TABLE_TYPES_SQL).await? {
        let object_id = int(&row, "object_id")?;
        snapshot.user_types.push(UserTypeDef::Table {
            name: name(&row, "schema_name", "name")?,
            columns: columns.remove(&object_id).unwrap_or_default(),
        });
    }

    for row in fetch(client, SEQUENCES_SQL).await? {
        let cache = if flag(&row, "is_cached")? {
            Some(row.try_get::<i32, _>("cache_size")?)
        } else {
            None
        };
        snapshot.sequences.push(SequenceDef {
            name: name(&row, "schema_name", "name")?,
            type_name: text(&row, "type_name")?,
            precision: int(&row, "precision")?,
            start_value: text(&row, "start_value")?,
            increment: text(&row, "increment")?,
            minimum_value: text(&row, "minimum_value")?,
            maximum_value: text(&row, "maximum_value")?,
            is_cycling: flag(&row, "is_cycling")?,
            cache,
        });
    }

    for row in fetch(client, DEFAULTS_SQL).await? {
        snapshot.defaults.push(DefaultObjectDef {
            name: name(&row, "schema_name", "name")?,
            definition: text(&row, "definition")?,
        });
    }
    for row in fetch(client, DEFAULT_BINDINGS_SQL).await? {
        let target_name = name(&row, "target_schema", "target_name")?;
        let target = match opt_text(&row, "column_name")? {
            Some(column) => BindTarget::Column {
                table: target_name,
                column,
            },
            None => BindTarget::Type(target_name),
        };
        snapshot.default_bindings.push(DefaultBinding {
            default: name(&row, "default_schema", "default_name")?,
            target,
        });
    }

    for row in fetch(client, TABLES_SQL).await? {
        let object_id = int(&row, "object_id")?;
        snapshot.tables.push(TableDef {
            object_id,
            name: name(&row, "schema_name", "name")?,
            columns: columns.remove(&object_id).unwrap_or_default(),
        });
    }

    for row in fetch(client, MODULES_SQL).await? {
        let type_code = text(&row, "type_code")?;
        let Some(kind) = ModuleKind::from_type_code(&type_code) else {
            continue;
        };
        let parent = match (opt_text(&row, "parent_schema")?, opt_text(&row, "parent_name")?) {
            (Some(schema), Some(parent)) if kind == ModuleKind::Trigger => {
                Some(ObjectName::new(schema, parent))
            }
            _ => None,
        };
        snapshot.modules.push(ModuleDef {
            object_id: int(&row, "object_id")?,
            name: name(&row, "schema_name", "name")?,
            kind,
            definition: opt_text(&row, "definition")?,
            uses_ansi_nulls: flag(&row, "uses_ansi_nulls")?,
            uses_quoted_identifier: flag(&row, "uses_quoted_identifier")?,
            parent,
            is_disabled: flag(&row, "is_disabled")?,
        });
    }

    for row in fetch(client, DATABASE_TRIGGERS_SQL).await? {
        snapshot.database_triggers.push(DatabaseTriggerDef {
            name: text(&row, "name")?,
            definition: opt_text(&row, "definition")?,
            uses_ansi_nulls: flag(&row, "uses_ansi_nulls")?,
            uses_quoted_identifier: flag(&row, "uses_quoted_identifier")?,
            is_disabled: flag(&row, "is_disabled")?,
        });
    }

    for row in fetch(client, DEPENDENCIES_SQL).await? {
        snapshot
            .dependencies
            .push((int(&row, "referencing_id")?, int(&row, "referenced_id")?));
    }

    snapshot.indexes = read_indexes(client).await?;

    for row in fetch(client, CHECK_CONSTRAINTS_SQL).await? {
        snapshot.check_constraints.push(CheckConstraintDef {
            table: name(&row, "schema_name", "table_name")?,
            name: text(&row, "name")?,
            definition: text(&row, "definition")?,
            is_disabled: flag(&row, "is_disabled")?,
            is_not_trusted: flag(&row, "is_not_trusted")?,
            not_for_replication: flag(&row, "is_not_for_replication")?,
        });
    }

    snapshot.foreign_keys = read_foreign_keys(client).await?;
    snapshot.search_property_lists = read_search_property_lists(client).await?;

    debug!(
        "Catalog snapshot: {} schemas, {} types, {} tables, {} modules, {} indexes, {} foreign keys",
        snapshot.schemas.len(),
        snapshot.user_types.len(),
        snapshot.tables.len(),
        snapshot.modules.len(),
        snapshot.indexes.len(),
        snapshot.foreign_keys.len()
    );

    Ok(snapshot)
}

/// Columns of tables and table types, keyed by owning object_id.
async fn read_columns(client: &mut MssqlClient) -> Result<HashMap<i32, Vec<ColumnDef>>> {
    let mut columns: HashMap<i32, Vec<ColumnDef>> = HashMap::new();

    for row in fetch(client, COLUMNS_SQL).await? {
        let user_schema = if flag(&row, "is_user_defined")? {
            opt_text(&row, "type_schema")?
        } else {
            None
        };
        let data_type = TypeRef {
            name: text(&row, "type_name")?,
            user_schema,
            max_length: int(&row, "max_length")?,
            precision: int(&row, "precision")?,
            scale: int(&row, "scale")?,
        };

        let identity = match (
            opt_text(&row, "identity_seed")?,
            opt_text(&row, "identity_increment")?,
        ) {
            (Some(seed), Some(increment)) => Some((seed, increment)),
            _ => None,
        };
        let computed = match opt_text(&row, "computed_definition")? {
            Some(definition) => Some((definition, flag(&row, "is_persisted")?)),
            None => None,
        };
        let default = match (opt_text(&row, "default_name")?, opt_text(&row, "default_definition")?) {
            (Some(name), Some(definition)) => Some(DefaultConstraintDef { name, definition }),
            _ => None,
        };
        let xml_collection = match (opt_text(&row, "xml_schema")?, opt_text(&row, "xml_collection")?) {
            (Some(schema), Some(collection)) => Some((
                ObjectName::new(schema, collection),
                flag(&row, "is_xml_document")?,
            )),
            _ => None,
        };

        columns
            .entry(int(&row, "object_id")?)
            .or_default()
            .push(ColumnDef {
                name: text(&row, "name")?,
                data_type,
                collation: opt_text(&row, "collation_name")?,
                is_nullable: flag(&row, "is_nullable")?,
                identity,
                computed,
                default,
                xml_collection,
                is_rowguidcol: flag(&row, "is_rowguidcol")?,
                is_sparse: flag(&row, "is_sparse")?,
            });
    }

    Ok(columns)
}

async fn read_indexes(client: &mut MssqlClient) -> Result<Vec<IndexDef>> {
    let mut key_columns: HashMap<(i32, i32), Vec<IndexColumn>> = HashMap::new();
    let mut included: HashMap<(i32, i32), Vec<String>> = HashMap::new();

    for row in fetch(client, INDEX_COLUMNS_SQL).await? {
        let key = (int(&row, "object_id")?, int(&row, "index_id")?);
        let column = text(&row, "name")?;
        if flag(&row, "is_included_column")? {
            included.entry(key).or_default().push(column);
        } else {
            key_columns.entry(key).or_default().push(IndexColumn {
                name: column,
                descending: flag(&row, "is_descending_key")?,
            });
        }
    }

    let mut indexes = Vec::new();
    for row in fetch(client, INDEXES_SQL).await? {
        let key = (int(&row, "object_id")?, int(&row, "index_id")?);
        indexes.push(IndexDef {
            object_id: key.0,
            index_id: key.1,
            table: name(&row, "schema_name", "table_name")?,
            name: text(&row, "name")?,
            kind: IndexKind::from_type_desc(&text(&row, "type_desc")?),
            is_unique: flag(&row, "is_unique")?,
            is_primary_key: flag(&row, "is_primary_key")?,
            is_unique_constraint: flag(&row, "is_unique_constraint")?,
            key_columns: key_columns.remove(&key).unwrap_or_default(),
            included_columns: included.remove(&key).unwrap_or_default(),
            filter: opt_text(&row, "filter_definition")?,
            ignore_dup_key: flag(&row, "ignore_dup_key")?,
            fill_factor: int(&row, "fill_factor")?,
            is_disabled: flag(&row, "is_disabled")?,
        });
    }

    Ok(indexes)
}

async fn read_foreign_keys(client: &mut MssqlClient) -> Result<Vec<ForeignKeyDef>> {
    let mut column_pairs: HashMap<i32, (Vec<String>, Vec<String>)> = HashMap::new();
    for row in fetch(client, FOREIGN_KEY_COLUMNS_SQL).await? {
        let entry = column_pairs
            .entry(int(&row, "constraint_object_id")?)
            .or_default();
        entry.0.push(text(&row, "parent_column")?);
        entry.1.push(text(&row, "ref_column")?);
    }

    let mut foreign_keys = Vec::new();
    for row in fetch(client, FOREIGN_KEYS_SQL).await? {
        let object_id = int(&row, "object_id")?;
        let (columns, referenced_columns) = column_pairs.remove(&object_id).unwrap_or_default();
        foreign_keys.push(ForeignKeyDef {
            object_id,
            table: name(&row, "schema_name", "table_name")?,
            name: text(&row, "name")?,
            columns,
            referenced_table: name(&row, "ref_schema", "ref_table")?,
            referenced_columns,
            on_delete: text(&row, "delete_referential_action_desc")?,
            on_update: text(&row, "update_referential_action_desc")?,
            is_disabled: flag(&row, "is_disabled")?,
            is_not_trusted: flag(&row, "is_not_trusted")?,
            not_for_replication: flag(&row, "is_not_for_replication")?,
        });
    }

    Ok(foreign_keys)
}

async fn read_search_property_lists(client: &mut MssqlClient) -> Result<Vec<SearchPropertyListDef>> {
    let mut lists: Vec<SearchPropertyListDef> = Vec::new();

    for row in fetch(client, SEARCH_PROPERTY_LISTS_SQL).await? {
        let list_name = text(&row, "list_name")?;
        if lists.last().map(|l| l.name != list_name).unwrap_or(true) {
            lists.push(SearchPropertyListDef {
                name: list_name,
                properties: Vec::new(),
            });
        }
        if let (Some(property), Some(list)) = (opt_text(&row, "property_name")?, lists.last_mut()) {
            list.properties.push(SearchPropertyDef {
                name: property,
                set_guid: text(&row, "set_guid")?,
                int_id: int(&row, "property_int_id")?,
                description: opt_text(&row, "property_description")?,
            });
        }
    }

    Ok(lists)
}
