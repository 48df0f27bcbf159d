//! Errors raised while reading the catalog

use thiserror::Error;

/// Failure reported by a [`MetadataSource`](crate::MetadataSource)
#[derive(Error, Debug)]
pub enum ZqlzError {
    /// The session to the server is unusable
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    /// A catalog query returned something the caller cannot interpret
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of a catalog read
pub type Result<T> = std::result::Result<T, ZqlzError>;
