use std::sync::Arc;
use thiserror::Error;
use zqlz_core::ZqlzError;

pub type CacheResult<T> = Result<T, CacheError>;

/// Errors surfaced by schema cache reads and refreshes
///
/// `Clone` so one coalesced result can be handed to every waiter.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("Catalog query failed: {0}")]
    Source(Arc<ZqlzError>),

    #[error("Background schema task failed: {0}")]
    Task(String),
}

impl From<ZqlzError> for CacheError {
    fn from(err: ZqlzError) -> Self {
        CacheError::Source(Arc::new(err))
    }
}

impl From<tokio::task::JoinError> for CacheError {
    fn from(err: tokio::task::JoinError) -> Self {
        CacheError::Task(err.to_string())
    }
}
