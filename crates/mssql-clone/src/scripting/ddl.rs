//! T-SQL rendering of a [`CatalogSnapshot`].
//!
//! Pure functions only; everything here is driven by the snapshot and the
//! requested [`ScriptOptions`], so the statement order is deterministic.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::model::*;
use super::{SchemaScript, ScriptOptions};
use crate::core::identifier::{bracket, quote_literal};

fn two_part(name: &ObjectName) -> String {
    format!("{}.{}", bracket(&name.schema), bracket(&name.name))
}

fn column_list(columns: &[IndexColumn]) -> String {
    columns
        .iter()
        .map(|c| {
            format!(
                "{} {}",
                bracket(&c.name),
                if c.descending { "DESC" } else { "ASC" }
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn name_list(names: &[String]) -> String {
    names.iter().map(|n| bracket(n)).collect::<Vec<_>>().join(", ")
}

/// Format a catalog type with its length, precision or scale.
pub fn format_type(data_type: &TypeRef) -> String {
    if let Some(schema) = &data_type.user_schema {
        return format!("{}.{}", bracket(schema), bracket(&data_type.name));
    }

    let name = data_type.name.as_str();
    match name.to_lowercase().as_str() {
        "decimal" | "numeric" => format!("{}({}, {})", name, data_type.precision, data_type.scale),

        "datetime2" | "time" | "datetimeoffset" => format!("{}({})", name, data_type.scale),

        "float" => {
            if data_type.precision > 0 && data_type.precision != 53 {
                format!("float({})", data_type.precision)
            } else {
                "float".to_string()
            }
        }

        "char" | "varchar" | "binary" | "varbinary" => {
            if data_type.max_length == -1 {
                format!("{}(max)", name)
            } else {
                format!("{}({})", name, data_type.max_length)
            }
        }

        // max_length is in bytes; two bytes per character.
        "nchar" | "nvarchar" => {
            if data_type.max_length == -1 {
                format!("{}(max)", name)
            } else {
                format!("{}({})", name, data_type.max_length / 2)
            }
        }

        _ => name.to_string(),
    }
}

/// One column inside `CREATE TABLE` or `CREATE TYPE ... AS TABLE`.
pub fn column_definition(column: &ColumnDef) -> String {
    let mut def = bracket(&column.name);

    if let Some((expression, persisted)) = &column.computed {
        def.push_str(&format!(" AS {}", expression));
        if *persisted {
            def.push_str(" PERSISTED");
            if !column.is_nullable {
                def.push_str(" NOT NULL");
            }
        }
        return def;
    }

    match &column.xml_collection {
        Some((collection, is_document)) => def.push_str(&format!(
            " xml({} {})",
            if *is_document { "DOCUMENT" } else { "CONTENT" },
            two_part(collection)
        )),
        None => {
            def.push(' ');
            def.push_str(&format_type(&column.data_type));
        }
    }

    if let Some(collation) = &column.collation {
        def.push_str(&format!(" COLLATE {}", collation));
    }
    if column.is_sparse {
        def.push_str(" SPARSE");
    }
    if let Some((seed, increment)) = &column.identity {
        def.push_str(&format!(" IDENTITY({},{})", seed, increment));
    }
    if column.is_rowguidcol {
        def.push_str(" ROWGUIDCOL");
    }
    def.push_str(if column.is_nullable { " NULL" } else { " NOT NULL" });
    if let Some(default) = &column.default {
        def.push_str(&format!(
            " CONSTRAINT {} DEFAULT {}",
            bracket(&default.name),
            default.definition
        ));
    }

    def
}

fn column_block(columns: &[ColumnDef]) -> String {
    columns
        .iter()
        .map(column_definition)
        .collect::<Vec<_>>()
        .join(",\n    ")
}

pub fn create_table(table: &TableDef) -> String {
    format!(
        "CREATE TABLE {} (\n    {}\n)",
        two_part(&table.name),
        column_block(&table.columns)
    )
}

fn create_user_type(user_type: &UserTypeDef) -> String {
    match user_type {
        UserTypeDef::Alias {
            name,
            base,
            is_nullable,
        } => format!(
            "CREATE TYPE {} FROM {} {}",
            two_part(name),
            format_type(base),
            if *is_nullable { "NULL" } else { "NOT NULL" }
        ),
        UserTypeDef::Table { name, columns } => format!(
            "CREATE TYPE {} AS TABLE (\n    {}\n)",
            two_part(name),
            column_block(columns)
        ),
    }
}

fn create_sequence(sequence: &SequenceDef) -> String {
    let type_name = match sequence.type_name.as_str() {
        "decimal" | "numeric" => format!("{}({}, 0)", sequence.type_name, sequence.precision),
        other => other.to_string(),
    };
    let cache = match sequence.cache {
        None => "NO CACHE".to_string(),
        Some(None) => "CACHE".to_string(),
        Some(Some(size)) => format!("CACHE {}", size),
    };
    format!(
        "CREATE SEQUENCE {} AS {} START WITH {} INCREMENT BY {} MINVALUE {} MAXVALUE {} {} {}",
        two_part(&sequence.name),
        type_name,
        sequence.start_value,
        sequence.increment,
        sequence.minimum_value,
        sequence.maximum_value,
        if sequence.is_cycling { "CYCLE" } else { "NO CYCLE" },
        cache
    )
}

fn bind_default(binding: &DefaultBinding) -> String {
    let target = match &binding.target {
        BindTarget::Column { table, column } => {
            format!("{}.{}", two_part(table), bracket(column))
        }
        BindTarget::Type(name) => two_part(name),
    };
    format!(
        "EXEC sp_bindefault {}, {}",
        quote_literal(&two_part(&binding.default)),
        quote_literal(&target)
    )
}

fn with_options(index: &IndexDef) -> String {
    let mut options = Vec::new();
    if index.ignore_dup_key {
        options.push("IGNORE_DUP_KEY = ON".to_string());
    }
    if index.fill_factor > 0 {
        options.push(format!("FILLFACTOR = {}", index.fill_factor));
    }
    if options.is_empty() {
        String::new()
    } else {
        format!(" WITH ({})", options.join(", "))
    }
}

fn clustering(kind: &IndexKind) -> &'static str {
    match kind {
        IndexKind::Clustered => "CLUSTERED",
        _ => "NONCLUSTERED",
    }
}

fn add_key_constraint(index: &IndexDef) -> String {
    format!(
        "ALTER TABLE {} ADD CONSTRAINT {} {} {} ({}){}",
        two_part(&index.table),
        bracket(&index.name),
        if index.is_primary_key { "PRIMARY KEY" } else { "UNIQUE" },
        clustering(&index.kind),
        column_list(&index.key_columns),
        with_options(index)
    )
}

fn create_index(index: &IndexDef) -> String {
    let mut sql = format!(
        "CREATE {}{} INDEX {} ON {} ({})",
        if index.is_unique { "UNIQUE " } else { "" },
        clustering(&index.kind),
        bracket(&index.name),
        two_part(&index.table),
        column_list(&index.key_columns)
    );
    if !index.included_columns.is_empty() {
        sql.push_str(&format!(" INCLUDE ({})", name_list(&index.included_columns)));
    }
    if let Some(filter) = &index.filter {
        sql.push_str(&format!(" WHERE {}", filter));
    }
    sql.push_str(&with_options(index));
    sql
}

fn add_check_constraint(check: &CheckConstraintDef) -> Vec<String> {
    let mut statements = vec![format!(
        "ALTER TABLE {} WITH {} ADD CONSTRAINT {} CHECK {}{}",
        two_part(&check.table),
        if check.is_not_trusted { "NOCHECK" } else { "CHECK" },
        bracket(&check.name),
        if check.not_for_replication { "NOT FOR REPLICATION " } else { "" },
        check.definition
    )];
    if check.is_disabled {
        statements.push(format!(
            "ALTER TABLE {} NOCHECK CONSTRAINT {}",
            two_part(&check.table),
            bracket(&check.name)
        ));
    }
    statements
}

fn referential_action(clause: &str, action: &str) -> String {
    match action {
        "" | "NO_ACTION" => String::new(),
        other => format!(" {} {}", clause, other.replace('_', " ")),
    }
}

fn add_foreign_key(fk: &ForeignKeyDef) -> Vec<String> {
    let mut statements = vec![format!(
        "ALTER TABLE {} WITH {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}){}{}{}",
        two_part(&fk.table),
        if fk.is_not_trusted { "NOCHECK" } else { "CHECK" },
        bracket(&fk.name),
        name_list(&fk.columns),
        two_part(&fk.referenced_table),
        name_list(&fk.referenced_columns),
        referential_action("ON DELETE", &fk.on_delete),
        referential_action("ON UPDATE", &fk.on_update),
        if fk.not_for_replication { " NOT FOR REPLICATION" } else { "" }
    )];
    if fk.is_disabled {
        statements.push(format!(
            "ALTER TABLE {} NOCHECK CONSTRAINT {}",
            two_part(&fk.table),
            bracket(&fk.name)
        ));
    }
    statements
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "ON"
    } else {
        "OFF"
    }
}

/// `SET` options, the module text, and a reset when an option was off.
fn module_statements(
    definition: &str,
    uses_ansi_nulls: bool,
    uses_quoted_identifier: bool,
) -> Vec<String> {
    let mut statements = vec![
        format!("SET ANSI_NULLS {}", on_off(uses_ansi_nulls)),
        format!("SET QUOTED_IDENTIFIER {}", on_off(uses_quoted_identifier)),
        definition.trim().to_string(),
    ];
    if !uses_ansi_nulls || !uses_quoted_identifier {
        statements.push("SET ANSI_NULLS ON".to_string());
        statements.push("SET QUOTED_IDENTIFIER ON".to_string());
    }
    statements
}

/// A node of the table/module dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Node<'a> {
    Table(&'a TableDef),
    Module(&'a ModuleDef),
}

fn module_requested(kind: ModuleKind, options: &ScriptOptions) -> bool {
    match kind {
        ModuleKind::View => options.views,
        ModuleKind::Procedure => options.stored_procedures,
        ModuleKind::Function => options.user_defined_functions,
        ModuleKind::Trigger => false,
    }
}

/// Order tables, views, functions and procedures so that every object comes
/// after the objects it references. Ready objects are taken in `object_id`
/// order; objects caught in a cycle follow in `object_id` order.
fn ordered_objects<'a>(snapshot: &'a CatalogSnapshot, options: &ScriptOptions) -> Vec<Node<'a>> {
    let mut nodes: BTreeMap<i32, Node<'a>> = BTreeMap::new();
    if options.tables {
        for table in &snapshot.tables {
            nodes.insert(table.object_id, Node::Table(table));
        }
    }
    for module in &snapshot.modules {
        if module_requested(module.kind, options) {
            nodes.insert(module.object_id, Node::Module(module));
        }
    }

    if !options.with_dependencies {
        return nodes.into_values().collect();
    }

    let mut pending: HashMap<i32, usize> = nodes.keys().map(|id| (*id, 0)).collect();
    let mut dependents: HashMap<i32, Vec<i32>> = HashMap::new();
    let edges: BTreeSet<(i32, i32)> = snapshot
        .dependencies
        .iter()
        .copied()
        .filter(|(from, to)| from != to && nodes.contains_key(from) && nodes.contains_key(to))
        .collect();
    for (referencing, referenced) in edges {
        if let Some(count) = pending.get_mut(&referencing) {
            *count += 1;
        }
        dependents.entry(referenced).or_default().push(referencing);
    }

    let mut ready: BTreeSet<i32> = pending
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(id, _)| *id)
        .collect();
    let mut ordered = Vec::with_capacity(nodes.len());

    while let Some(id) = ready.pop_first() {
        pending.remove(&id);
        if let Some(node) = nodes.get(&id) {
            ordered.push(*node);
        }
        for dependent in dependents.get(&id).into_iter().flatten() {
            if let Some(count) = pending.get_mut(dependent) {
                *count -= 1;
                if *count == 0 {
                    ready.insert(*dependent);
                }
            }
        }
    }

    let mut cyclic: Vec<i32> = pending.into_keys().collect();
    cyclic.sort_unstable();
    ordered.extend(cyclic.iter().filter_map(|id| nodes.get(id).copied()));
    ordered
}

fn index_supported(index: &IndexDef, script: &mut SchemaScript) -> bool {
    if let IndexKind::Unsupported(kind) = &index.kind {
        script.skip(format!(
            "Skipping {} index {} on {}",
            kind,
            bracket(&index.name),
            two_part(&index.table)
        ));
        return false;
    }
    true
}

/// Render the ordered DDL for a snapshot. `target` is only used in
/// diagnostics: every statement runs on a connection scoped to the clone.
pub fn render_script(
    snapshot: &CatalogSnapshot,
    options: &ScriptOptions,
    target: &str,
) -> SchemaScript {
    let mut script = SchemaScript::default();

    if options.schemas {
        for schema in &snapshot.schemas {
            script.push(format!("CREATE SCHEMA {}", bracket(&schema.name)));
        }
    }

    if options.xml_schema_collections {
        for collection in &snapshot.xml_schema_collections {
            script.push(format!(
                "CREATE XML SCHEMA COLLECTION {} AS {}",
                two_part(&collection.name),
                quote_literal(&collection.definition)
            ));
        }
    }

    if options.user_defined_types {
        for user_type in &snapshot.user_types {
            script.push(create_user_type(user_type));
        }
    }

    if options.sequences {
        for sequence in &snapshot.sequences {
            script.push(create_sequence(sequence));
        }
    }

    if options.defaults {
        for default in &snapshot.defaults {
            script.push(default.definition.trim().to_string());
        }
    }

    for node in ordered_objects(snapshot, options) {
        match node {
            Node::Table(table) => script.push(create_table(table)),
            Node::Module(module) => match &module.definition {
                Some(definition) => {
                    for statement in module_statements(
                        definition,
                        module.uses_ansi_nulls,
                        module.uses_quoted_identifier,
                    ) {
                        script.push(statement);
                    }
                }
                None => script.skip(format!(
                    "Skipping encrypted {} {} while scripting {}",
                    module.kind.label(),
                    two_part(&module.name),
                    target
                )),
            },
        }
    }

    if options.dri_all_keys {
        for index in snapshot.indexes.iter().filter(|i| i.is_constraint()) {
            if index_supported(index, &mut script) {
                script.push(add_key_constraint(index));
            }
        }
    }

    let mut indexes: Vec<&IndexDef> = snapshot
        .indexes
        .iter()
        .filter(|i| !i.is_constraint())
        .filter(|i| match i.kind {
            IndexKind::Clustered => options.clustered_indexes,
            IndexKind::Nonclustered => options.nonclustered_indexes,
            IndexKind::Unsupported(_) => options.clustered_indexes || options.nonclustered_indexes,
        })
        .collect();
    indexes.sort_by_key(|i| (i.kind != IndexKind::Clustered, i.object_id, i.index_id));
    for index in indexes {
        if !index_supported(index, &mut script) {
            continue;
        }
        script.push(create_index(index));
        if index.is_disabled && index.kind == IndexKind::Nonclustered {
            script.push(format!(
                "ALTER INDEX {} ON {} DISABLE",
                bracket(&index.name),
                two_part(&index.table)
            ));
        }
    }

    if options.dri_checks {
        for check in &snapshot.check_constraints {
            for statement in add_check_constraint(check) {
                script.push(statement);
            }
        }
    }

    if options.foreign_keys {
        for fk in &snapshot.foreign_keys {
            for statement in add_foreign_key(fk) {
                script.push(statement);
            }
        }
    }

    if options.defaults {
        for binding in &snapshot.default_bindings {
            script.push(bind_default(binding));
        }
    }

    if options.triggers {
        for trigger in snapshot
            .modules
            .iter()
            .filter(|m| m.kind == ModuleKind::Trigger)
        {
            let (Some(definition), Some(parent)) = (&trigger.definition, &trigger.parent) else {
                script.skip(format!(
                    "Skipping encrypted trigger {} while scripting {}",
                    two_part(&trigger.name),
                    target
                ));
                continue;
            };
            for statement in module_statements(
                definition,
                trigger.uses_ansi_nulls,
                trigger.uses_quoted_identifier,
            ) {
                script.push(statement);
            }
            if trigger.is_disabled {
                script.push(format!(
                    "DISABLE TRIGGER {} ON {}",
                    two_part(&trigger.name),
                    two_part(parent)
                ));
            }
        }
    }

    if options.database_triggers {
        for trigger in &snapshot.database_triggers {
            let Some(definition) = &trigger.definition else {
                script.skip(format!(
                    "Skipping encrypted database trigger {} while scripting {}",
                    bracket(&trigger.name),
                    target
                ));
                continue;
            };
            for statement in module_statements(
                definition,
                trigger.uses_ansi_nulls,
                trigger.uses_quoted_identifier,
            ) {
                script.push(statement);
            }
            if trigger.is_disabled {
                script.push(format!(
                    "DISABLE TRIGGER {} ON DATABASE",
                    bracket(&trigger.name)
                ));
            }
        }
    }

    if options.search_property_lists {
        for list in &snapshot.search_property_lists {
            script.push(format!("CREATE SEARCH PROPERTY LIST {}", bracket(&list.name)));
            for property in &list.properties {
                let description = property
                    .description
                    .as_deref()
                    .map(|d| format!(", PROPERTY_DESCRIPTION = {}", quote_literal(d)))
                    .unwrap_or_default();
                script.push(format!(
                    "ALTER SEARCH PROPERTY LIST {} ADD {} WITH (PROPERTY_SET_GUID = '{}', PROPERTY_INT_ID = {}{})",
                    bracket(&list.name),
                    quote_literal(&property.name),
                    property.set_guid,
                    property.int_id,
                    description
                ));
            }
        }
    }

    script
}
