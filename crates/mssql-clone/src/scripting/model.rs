//! Plain-data snapshot of a database's schema objects, as read from `sys.*`.

/// Two-part object name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectName {
    pub schema: String,
    pub name: String,
}

impl ObjectName {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }
}

/// User schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDef {
    pub name: String,
}

/// XML schema collection with its full namespace text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlSchemaCollectionDef {
    pub name: ObjectName,
    pub definition: String,
}

/// Data type of a column or alias type, as stored in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    /// Type name (`nvarchar`, or an alias type's own name).
    pub name: String,
    /// Schema of a user-defined type; `None` for system types.
    pub user_schema: Option<String>,
    /// `sys.columns.max_length` (bytes, -1 for max).
    pub max_length: i32,
    pub precision: i32,
    pub scale: i32,
}

impl TypeRef {
    pub fn system(name: impl Into<String>, max_length: i32, precision: i32, scale: i32) -> Self {
        Self {
            name: name.into(),
            user_schema: None,
            max_length,
            precision,
            scale,
        }
    }
}

/// User-defined type: alias of a system type, or table type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserTypeDef {
    Alias {
        name: ObjectName,
        base: TypeRef,
        is_nullable: bool,
    },
    Table {
        name: ObjectName,
        columns: Vec<ColumnDef>,
    },
}

/// Sequence object. Numeric values are kept as the server prints them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceDef {
    pub name: ObjectName,
    pub type_name: String,
    pub precision: i32,
    pub start_value: String,
    pub increment: String,
    pub minimum_value: String,
    pub maximum_value: String,
    pub is_cycling: bool,
    /// `None` = NO CACHE, `Some(None)` = default cache, `Some(Some(n))` = CACHE n.
    pub cache: Option<Option<i32>>,
}

/// Legacy `CREATE DEFAULT` object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultObjectDef {
    pub name: ObjectName,
    pub definition: String,
}

/// What a legacy default is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindTarget {
    Column { table: ObjectName, column: String },
    Type(ObjectName),
}

/// `sp_bindefault` binding of a legacy default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultBinding {
    pub default: ObjectName,
    pub target: BindTarget,
}

/// Named default constraint attached to a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultConstraintDef {
    pub name: String,
    pub definition: String,
}

/// Column of a table or table type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: TypeRef,
    pub collation: Option<String>,
    pub is_nullable: bool,
    /// Seed and increment.
    pub identity: Option<(String, String)>,
    /// Expression and `PERSISTED` flag.
    pub computed: Option<(String, bool)>,
    pub default: Option<DefaultConstraintDef>,
    /// Typed XML: collection and `DOCUMENT` flag.
    pub xml_collection: Option<(ObjectName, bool)>,
    pub is_rowguidcol: bool,
    pub is_sparse: bool,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: TypeRef) -> Self {
        Self {
            name: name.into(),
            data_type,
            collation: None,
            is_nullable: true,
            identity: None,
            computed: None,
            default: None,
            xml_collection: None,
            is_rowguidcol: false,
            is_sparse: false,
        }
    }
}

/// User table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    pub object_id: i32,
    pub name: ObjectName,
    pub columns: Vec<ColumnDef>,
}

/// Kind of a T-SQL module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    View,
    Procedure,
    Function,
    Trigger,
}

impl ModuleKind {
    /// Map a `sys.objects.type` code.
    pub fn from_type_code(code: &str) -> Option<Self> {
        match code.trim() {
            "V" => Some(ModuleKind::View),
            "P" => Some(ModuleKind::Procedure),
            "FN" | "IF" | "TF" => Some(ModuleKind::Function),
            "TR" => Some(ModuleKind::Trigger),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ModuleKind::View => "view",
            ModuleKind::Procedure => "stored procedure",
            ModuleKind::Function => "function",
            ModuleKind::Trigger => "trigger",
        }
    }
}

/// View, procedure, function or DML trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDef {
    pub object_id: i32,
    pub name: ObjectName,
    pub kind: ModuleKind,
    /// `None` when the module is encrypted.
    pub definition: Option<String>,
    pub uses_ansi_nulls: bool,
    pub uses_quoted_identifier: bool,
    /// Table or view a trigger belongs to.
    pub parent: Option<ObjectName>,
    pub is_disabled: bool,
}

/// Database-scoped DDL trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseTriggerDef {
    pub name: String,
    pub definition: Option<String>,
    pub uses_ansi_nulls: bool,
    pub uses_quoted_identifier: bool,
    pub is_disabled: bool,
}

/// Key column of an index or key constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexColumn {
    pub name: String,
    pub descending: bool,
}

/// Index kind from `sys.indexes.type_desc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexKind {
    Clustered,
    Nonclustered,
    Unsupported(String),
}

impl IndexKind {
    pub fn from_type_desc(desc: &str) -> Self {
        match desc {
            "CLUSTERED" => IndexKind::Clustered,
            "NONCLUSTERED" => IndexKind::Nonclustered,
            other => IndexKind::Unsupported(other.to_string()),
        }
    }
}

/// Index, primary key or unique constraint on a table or view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDef {
    pub object_id: i32,
    pub index_id: i32,
    pub table: ObjectName,
    pub name: String,
    pub kind: IndexKind,
    pub is_unique: bool,
    pub is_primary_key: bool,
    pub is_unique_constraint: bool,
    pub key_columns: Vec<IndexColumn>,
    pub included_columns: Vec<String>,
    pub filter: Option<String>,
    pub ignore_dup_key: bool,
    pub fill_factor: i32,
    pub is_disabled: bool,
}

impl IndexDef {
    pub fn is_constraint(&self) -> bool {
        self.is_primary_key || self.is_unique_constraint
    }
}

/// Check constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckConstraintDef {
    pub table: ObjectName,
    pub name: String,
    pub definition: String,
    pub is_disabled: bool,
    pub is_not_trusted: bool,
    pub not_for_replication: bool,
}

/// Foreign key constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyDef {
    pub object_id: i32,
    pub table: ObjectName,
    pub name: String,
    pub columns: Vec<String>,
    pub referenced_table: ObjectName,
    pub referenced_columns: Vec<String>,
    pub on_delete: String,
    pub on_update: String,
    pub is_disabled: bool,
    pub is_not_trusted: bool,
    pub not_for_replication: bool,
}

/// One registered search property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPropertyDef {
    pub name: String,
    pub set_guid: String,
    pub int_id: i32,
    pub description: Option<String>,
}

/// Search property list with its properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPropertyListDef {
    pub name: String,
    pub properties: Vec<SearchPropertyDef>,
}

/// Everything the renderer needs to script one database.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogSnapshot {
    pub schemas: Vec<SchemaDef>,
    pub xml_schema_collections: Vec<XmlSchemaCollectionDef>,
    pub user_types: Vec<UserTypeDef>,
    pub sequences: Vec<SequenceDef>,
    pub defaults: Vec<DefaultObjectDef>,
    pub default_bindings: Vec<DefaultBinding>,
    pub tables: Vec<TableDef>,
    pub modules: Vec<ModuleDef>,
    pub database_triggers: Vec<DatabaseTriggerDef>,
    pub indexes: Vec<IndexDef>,
    pub check_constraints: Vec<CheckConstraintDef>,
    pub foreign_keys: Vec<ForeignKeyDef>,
    pub search_property_lists: Vec<SearchPropertyListDef>,
    /// `(referencing object_id, referenced object_id)` pairs.
    pub dependencies: Vec<(i32, i32)>,
}
