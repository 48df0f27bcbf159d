//! ZQLZ Schema Cache - Catalog metadata cache for SQL Server databases
//!
//! This crate provides:
//! - A per-connection cache of tables, columns, views, routines, indexes,
//!   constraints and triggers
//! - Freshness negotiation against a one-query catalog hash
//! - Coalescing of concurrent loads and hash checks
//! - JSON snapshots on disk so a restart does not start cold
//! - Targeted invalidation of single objects after DDL

mod coalesce;
mod error;
mod fetch;
mod hash;
mod invalidation;
mod key;
mod model;
mod persistence;
mod service;
mod settings;
mod store;
mod validity;

pub use error::{CacheError, CacheResult};
pub use fetch::{
    TableDetails, fetch_columns, fetch_constraints, fetch_full_schema, fetch_function,
    fetch_functions, fetch_indexes, fetch_procedure, fetch_procedures, fetch_table,
    fetch_table_details, fetch_tables, fetch_triggers, fetch_view, fetch_views,
};
pub use hash::{HashOracle, compute_hash};
pub use key::{ConnectionKey, ObjectKey};
pub use model::{CachedSchema, DatabaseHash, ObjectCounts, ObjectMap};
pub use persistence::SchemaPersistence;
pub use service::{CacheStats, SchemaCacheService};
pub use settings::{CacheSettings, default_storage_dir};
pub use validity::{RECENT_CHECK_WINDOW, TRUST_WINDOW};
