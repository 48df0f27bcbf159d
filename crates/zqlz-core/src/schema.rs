//! Catalog descriptor types
//!
//! Flat records describing one catalog object each. They carry only what
//! the catalog queries return; anything derived (keys, groupings) lives in
//! the cache layer.

use serde::{Deserialize, Serialize};

/// Table information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub schema: String,
    pub name: String,
    pub object_id: i64,
    pub create_date: Option<String>,
    pub modify_date: Option<String>,
}

/// Column information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub schema: String,
    pub table: String,
    pub name: String,
    /// 1-based column position
    pub ordinal: i64,
    pub data_type: String,
    pub max_length: Option<i64>,
    pub precision: Option<i64>,
    pub scale: Option<i64>,
    pub nullable: bool,
    pub is_identity: bool,
    pub is_computed: bool,
    pub default_value: Option<String>,
    pub is_primary_key: bool,
}

/// View information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewInfo {
    pub schema: String,
    pub name: String,
    pub object_id: i64,
    pub modify_date: Option<String>,
}

/// Parameter information (for functions/procedures)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterInfo {
    pub name: String,
    pub data_type: String,
    pub ordinal: i64,
    pub is_output: bool,
}

/// Stored procedure information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcedureInfo {
    pub schema: String,
    pub name: String,
    pub object_id: i64,
    pub modify_date: Option<String>,
    pub parameters: Vec<ParameterInfo>,
}

/// Function kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FunctionKind {
    Scalar,
    InlineTable,
    Table,
    Clr,
}

impl FunctionKind {
    /// Map a `sys.objects.type` code
    pub fn from_type_code(code: &str) -> Self {
        match code.trim() {
            "IF" => FunctionKind::InlineTable,
            "TF" => FunctionKind::Table,
            "FS" | "FT" => FunctionKind::Clr,
            _ => FunctionKind::Scalar,
        }
    }
}

/// Function information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub schema: String,
    pub name: String,
    pub object_id: i64,
    pub function_kind: FunctionKind,
    /// Declared return type for scalar functions, `TABLE` otherwise
    pub return_type: Option<String>,
    pub modify_date: Option<String>,
    pub parameters: Vec<ParameterInfo>,
}

/// Index information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub schema: String,
    pub table: String,
    pub name: String,
    pub index_type: String,
    pub is_unique: bool,
    pub is_primary_key: bool,
    /// Key columns in key order
    pub columns: Vec<String>,
}

/// Constraint type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintType {
    PrimaryKey,
    ForeignKey,
    Unique,
    Check,
    Default,
}

impl ConstraintType {
    /// Map a `sys.objects.type` code (`PK`, `F`, `UQ`, `C`, `D`)
    pub fn from_type_code(code: &str) -> Option<Self> {
        match code.trim() {
            "PK" => Some(ConstraintType::PrimaryKey),
            "F" => Some(ConstraintType::ForeignKey),
            "UQ" => Some(ConstraintType::Unique),
            "C" => Some(ConstraintType::Check),
            "D" => Some(ConstraintType::Default),
            _ => None,
        }
    }
}

/// Constraint information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintInfo {
    pub schema: String,
    pub table: String,
    pub name: String,
    pub constraint_type: ConstraintType,
    pub columns: Vec<String>,
    pub referenced_schema: Option<String>,
    pub referenced_table: Option<String>,
    pub referenced_columns: Vec<String>,
    /// Check/default expression text
    pub definition: Option<String>,
}

impl ConstraintInfo {
    pub fn is_foreign_key(&self) -> bool {
        self.constraint_type == ConstraintType::ForeignKey
    }
}

/// Trigger event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerEvent {
    Insert,
    Update,
    Delete,
}

impl TriggerEvent {
    /// Parse `sys.trigger_events.type_desc`
    pub fn from_desc(desc: &str) -> Option<Self> {
        match desc.trim().to_ascii_uppercase().as_str() {
            "INSERT" => Some(TriggerEvent::Insert),
            "UPDATE" => Some(TriggerEvent::Update),
            "DELETE" => Some(TriggerEvent::Delete),
            _ => None,
        }
    }
}

/// Trigger information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerInfo {
    pub schema: String,
    pub name: String,
    /// Parent table, `None` for database-level triggers
    pub table: Option<String>,
    pub is_disabled: bool,
    pub is_instead_of: bool,
    pub events: Vec<TriggerEvent>,
}

/// Object type, as classified by whoever reports a catalog change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectType {
    Table,
    View,
    Procedure,
    Function,
    Trigger,
    Index,
    Constraint,
    Column,
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ObjectType::Table => "table",
            ObjectType::View => "view",
            ObjectType::Procedure => "procedure",
            ObjectType::Function => "function",
            ObjectType::Trigger => "trigger",
            ObjectType::Index => "index",
            ObjectType::Constraint => "constraint",
            ObjectType::Column => "column",
        };
        f.write_str(name)
    }
}
