//! Metadata source trait
//!
//! A `MetadataSource` is the narrow slice of a live connection that catalog
//! consumers need: run one statement with named parameters and get rows back.
//! Transport, pooling, authentication and timeouts all live behind it.

use crate::{QueryResult, Result, Value};
use async_trait::async_trait;

/// A named statement parameter (`@schema`, `@name`, ...)
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParam {
    /// Parameter name without the leading `@`
    pub name: &'static str,
    pub value: Value,
}

impl QueryParam {
    pub fn new(name: &'static str, value: impl Into<Value>) -> Self {
        Self {
            name,
            value: value.into(),
        }
    }
}

/// Read-only access to a database's catalog
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Server the source is connected to (host, instance or alias)
    fn server_name(&self) -> &str;

    /// Database the catalog queries run against
    fn database_name(&self) -> &str;

    /// Execute a single catalog statement and return its rows
    async fn query(&self, sql: &str, params: &[QueryParam]) -> Result<QueryResult>;
}
