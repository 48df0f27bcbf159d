//! Core types for ZQLZ

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// A database value as returned by a catalog query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// NULL value
    Null,
    /// Boolean (`bit` columns)
    Bool(bool),
    /// 16-bit signed integer (`smallint`)
    Int16(i16),
    /// 32-bit signed integer
    Int32(i32),
    /// 64-bit signed integer
    Int64(i64),
    /// 64-bit floating point
    Float64(f64),
    /// UTF-8 string
    String(String),
    /// DateTime without timezone (`datetime`, `datetime2`)
    DateTime(NaiveDateTime),
    /// DateTime with timezone (UTC)
    DateTimeUtc(DateTime<Utc>),
}

impl Value {
    /// Check if the value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get as a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int16(v) => Some(*v as i64),
            Value::Int32(v) => Some(*v as i64),
            Value::Int64(v) => Some(*v),
            Value::Bool(v) => Some(*v as i64),
            Value::String(s) => s.parse::<i64>().ok(),
            _ => None,
        }
    }

    /// Try to get as bool
    ///
    /// `bit` columns come back as integers from some drivers, so 0/1 are
    /// accepted as well.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            Value::Int16(_) | Value::Int32(_) | Value::Int64(_) => self.as_i64().map(|v| v != 0),
            _ => None,
        }
    }

    /// Render timestamps and scalars as text; `None` for NULL
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            Value::DateTime(v) => Some(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
            Value::DateTimeUtc(v) => Some(v.to_rfc3339()),
            other => Some(other.to_string()),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int16(v) => write!(f, "{}", v),
            Value::Int32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{}", v),
            Value::DateTime(v) => write!(f, "{}", v),
            Value::DateTimeUtc(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int64(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int32(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

/// A row from a query result
#[derive(Debug, Clone)]
pub struct Row {
    /// Column values
    pub values: Vec<Value>,
    /// Column names (shared with the other rows of the same result)
    columns: Arc<[String]>,
}

impl Row {
    /// Create a new row
    pub fn new(columns: impl Into<Arc<[String]>>, values: Vec<Value>) -> Self {
        Self {
            values,
            columns: columns.into(),
        }
    }

    /// Get a value by column index
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Get a value by column name (case-insensitive, catalog column names
    /// are not reliably cased across servers)
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .and_then(|idx| self.values.get(idx))
    }

    /// Non-null value by name
    fn non_null(&self, name: &str) -> Option<&Value> {
        self.get_by_name(name).filter(|v| !v.is_null())
    }

    /// String column, `None` for NULL or missing
    pub fn string(&self, name: &str) -> Option<String> {
        self.non_null(name).and_then(Value::to_text)
    }

    /// String column, empty for NULL or missing
    pub fn string_or_empty(&self, name: &str) -> String {
        self.string(name).unwrap_or_default()
    }

    /// Integer column
    pub fn i64(&self, name: &str) -> Option<i64> {
        self.non_null(name).and_then(Value::as_i64)
    }

    /// Boolean column, `false` for NULL or missing
    pub fn flag(&self, name: &str) -> bool {
        self.non_null(name).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Get column names
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Convert to a HashMap
    pub fn to_map(&self) -> HashMap<String, Value> {
        self.columns
            .iter()
            .zip(self.values.iter())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Query result
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    /// Column names in result order
    pub columns: Vec<String>,
    /// Result rows
    pub rows: Vec<Row>,
    /// Execution time in milliseconds
    pub execution_time_ms: u64,
}

impl QueryResult {
    /// Create a new empty query result
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a result from column names and raw row values
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let shared: Arc<[String]> = columns.clone().into();
        let rows = rows
            .into_iter()
            .map(|values| Row::new(shared.clone(), values))
            .collect();
        Self {
            columns,
            rows,
            execution_time_ms: 0,
        }
    }

    /// Check if the result has rows
    pub fn has_rows(&self) -> bool {
        !self.rows.is_empty()
    }

    /// Get the number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// First row, if any
    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> Row {
        Row::new(
            vec![
                "Name".to_string(),
                "is_unique".to_string(),
                "ordinal".to_string(),
                "modify_date".to_string(),
                "comment".to_string(),
            ],
            vec![
                Value::String("Users".into()),
                Value::Int32(1),
                Value::Int16(3),
                Value::DateTime(
                    chrono::NaiveDate::from_ymd_opt(2024, 5, 1)
                        .unwrap()
                        .and_hms_milli_opt(10, 30, 0, 250)
                        .unwrap(),
                ),
                Value::Null,
            ],
        )
    }

    #[test]
    fn test_get_by_name_is_case_insensitive() {
        let row = row();
        assert_eq!(row.string("name").as_deref(), Some("Users"));
        assert_eq!(row.string("NAME").as_deref(), Some("Users"));
    }

    #[test]
    fn test_flag_accepts_integer_bits() {
        let row = row();
        assert!(row.flag("is_unique"));
        assert!(!row.flag("missing"));
    }

    #[test]
    fn test_null_reads_as_absent() {
        let row = row();
        assert_eq!(row.string("comment"), None);
        assert_eq!(row.string_or_empty("comment"), "");
        assert_eq!(row.i64("ordinal"), Some(3));
    }

    #[test]
    fn test_datetime_text_is_iso() {
        let row = row();
        assert_eq!(
            row.string("modify_date").as_deref(),
            Some("2024-05-01T10:30:00.250")
        );
    }
}
