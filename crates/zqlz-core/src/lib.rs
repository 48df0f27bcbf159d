//! ZQLZ Core - Core abstractions and types for catalog access
//!
//! This crate provides the fundamental traits and types that the schema
//! cache depends on. It defines:
//!
//! - `MetadataSource` - Trait for running catalog queries against a database
//! - Catalog descriptors like `TableInfo`, `ColumnInfo`, `IndexInfo`, etc.
//! - Common types like `Value`, `Row` and `QueryResult`

mod error;
mod schema;
mod source;
mod types;

pub use error::*;
pub use schema::*;
pub use source::*;
pub use types::*;
