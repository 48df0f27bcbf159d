//! Cache keys
//!
//! Both keys are canonicalized on construction, so lookups never have to
//! remember to lowercase.

use serde::{Deserialize, Serialize};
use std::fmt;
use zqlz_core::MetadataSource;

/// Identifies one cached schema: a (server, database) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionKey(String);

impl ConnectionKey {
    pub fn new(server: &str, database: &str) -> Self {
        Self(format!(
            "{}:{}",
            server.trim().to_lowercase(),
            database.trim().to_lowercase()
        ))
    }

    /// Key for whatever target the source is connected to
    pub fn for_source(source: &dyn MetadataSource) -> Self {
        Self::new(source.server_name(), source.database_name())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File-system safe rendition: every non-alphanumeric character becomes `_`
    pub fn sanitized(&self) -> String {
        self.0
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect()
    }
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies one catalog object (or one table's collection) within a schema
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    schema: String,
    name: String,
}

impl ObjectKey {
    pub fn new(schema: &str, name: &str) -> Self {
        Self {
            schema: schema.to_lowercase(),
            name: name.to_lowercase(),
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}
