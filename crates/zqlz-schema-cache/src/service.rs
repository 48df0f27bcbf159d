//! Schema cache service
//!
//! Entry point for catalog reads. Each read negotiates freshness before
//! returning anything:
//!
//! 1. A resident schema confirmed within the trust window is returned with
//!    no I/O at all.
//! 2. Otherwise the resident schema, or failing that the on-disk snapshot,
//!    is compared against the live catalog hash (reusing a comparison made
//!    in the last few seconds).
//! 3. A match adopts the candidate. A mismatch, a missing candidate or a
//!    failed hash query triggers a full fetch.
//!
//! Everything past step 1 runs at most once per connection at a time;
//! concurrent readers share the result.

use std::path::Path;
use std::sync::Arc;
use zqlz_core::{
    ColumnInfo, ConstraintInfo, FunctionInfo, IndexInfo, MetadataSource, ProcedureInfo,
    TableInfo, TriggerInfo, ViewInfo,
};

use crate::coalesce::Coalescer;
use crate::error::CacheResult;
use crate::fetch::fetch_full_schema;
use crate::hash::HashOracle;
use crate::key::{ConnectionKey, ObjectKey};
use crate::model::CachedSchema;
use crate::persistence::SchemaPersistence;
use crate::settings::{CacheSettings, default_storage_dir};
use crate::store::{CacheStore, Epoch};
use crate::validity::ValidityTracker;

/// Summary of what the cache currently holds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub connection_count: usize,
    pub tables: usize,
    pub views: usize,
    pub procedures: usize,
    pub functions: usize,
    pub triggers: usize,
    pub in_flight_loads: usize,
}

pub(crate) struct Inner {
    pub(crate) store: CacheStore,
    pub(crate) oracle: HashOracle,
    pub(crate) loads: Coalescer<Arc<CachedSchema>>,
    pub(crate) validity: ValidityTracker,
    pub(crate) persistence: SchemaPersistence,
}

/// Shared handle to the catalog cache; clones refer to the same cache
#[derive(Clone)]
pub struct SchemaCacheService {
    pub(crate) inner: Arc<Inner>,
}

impl SchemaCacheService {
    /// Create a cache whose snapshots live under `storage_dir/schema-cache`
    pub fn new(storage_dir: impl AsRef<Path>, settings: CacheSettings) -> Self {
        tracing::debug!(
            storage_dir = %storage_dir.as_ref().display(),
            hash_cache_validity_secs = settings.hash_cache_validity_secs,
            "creating schema cache"
        );
        Self {
            inner: Arc::new(Inner {
                store: CacheStore::new(),
                oracle: HashOracle::new(settings.hash_validity()),
                loads: Coalescer::new("schema-load", std::time::Duration::ZERO),
                validity: ValidityTracker::new(),
                persistence: SchemaPersistence::new(storage_dir),
            }),
        }
    }

    /// Cache using the saved settings and the per-user data directory
    pub fn open_default() -> anyhow::Result<Self> {
        let settings = CacheSettings::load()?;
        Ok(Self::new(default_storage_dir()?, settings))
    }

    /// Full cached schema for the database `source` is connected to
    #[tracing::instrument(skip(self, source), fields(server = %source.server_name(), database = %source.database_name()))]
    pub async fn get_schema(
        &self,
        source: Arc<dyn MetadataSource>,
    ) -> CacheResult<Arc<CachedSchema>> {
        let key = ConnectionKey::for_source(source.as_ref());

        if self.inner.validity.is_trusted(&key) {
            if let Some(schema) = self.inner.store.get(&key) {
                tracing::debug!(connection = %key, "schema cache hit (trusted)");
                return Ok(schema);
            }
        }

        let inner = self.inner.clone();
        let work_key = key.clone();
        self.inner
            .loads
            .run(&key, async move { inner.resolve(source, &work_key).await })
            .await
    }

    pub async fn get_tables(&self, source: Arc<dyn MetadataSource>) -> CacheResult<Vec<TableInfo>> {
        let schema = self.get_schema(source).await?;
        Ok(schema.tables.values().cloned().collect())
    }

    pub async fn get_views(&self, source: Arc<dyn MetadataSource>) -> CacheResult<Vec<ViewInfo>> {
        let schema = self.get_schema(source).await?;
        Ok(schema.views.values().cloned().collect())
    }

    pub async fn get_procedures(
        &self,
        source: Arc<dyn MetadataSource>,
    ) -> CacheResult<Vec<ProcedureInfo>> {
        let schema = self.get_schema(source).await?;
        Ok(schema.procedures.values().cloned().collect())
    }

    pub async fn get_functions(
        &self,
        source: Arc<dyn MetadataSource>,
    ) -> CacheResult<Vec<FunctionInfo>> {
        let schema = self.get_schema(source).await?;
        Ok(schema.functions.values().cloned().collect())
    }

    pub async fn get_triggers(
        &self,
        source: Arc<dyn MetadataSource>,
    ) -> CacheResult<Vec<TriggerInfo>> {
        let schema = self.get_schema(source).await?;
        Ok(schema.triggers.values().cloned().collect())
    }

    /// Columns of one table in ordinal order; empty for an unknown table
    pub async fn get_table_columns(
        &self,
        source: Arc<dyn MetadataSource>,
        schema_name: &str,
        table: &str,
    ) -> CacheResult<Vec<ColumnInfo>> {
        let schema = self.get_schema(source).await?;
        Ok(schema
            .table_columns(&ObjectKey::new(schema_name, table))
            .to_vec())
    }

    pub async fn get_table_indexes(
        &self,
        source: Arc<dyn MetadataSource>,
        schema_name: &str,
        table: &str,
    ) -> CacheResult<Vec<IndexInfo>> {
        let schema = self.get_schema(source).await?;
        Ok(schema
            .table_indexes(&ObjectKey::new(schema_name, table))
            .to_vec())
    }

    pub async fn get_table_constraints(
        &self,
        source: Arc<dyn MetadataSource>,
        schema_name: &str,
        table: &str,
    ) -> CacheResult<Vec<ConstraintInfo>> {
        let schema = self.get_schema(source).await?;
        Ok(schema
            .table_constraints(&ObjectKey::new(schema_name, table))
            .to_vec())
    }

    /// Foreign keys of every table
    pub async fn get_foreign_keys(
        &self,
        source: Arc<dyn MetadataSource>,
    ) -> CacheResult<Vec<ConstraintInfo>> {
        let schema = self.get_schema(source).await?;
        Ok(schema.foreign_keys().cloned().collect())
    }

    /// Resident schema for `key` without any freshness check or I/O
    pub fn cached_schema(&self, key: &ConnectionKey) -> Option<Arc<CachedSchema>> {
        self.inner.store.get(key)
    }

    pub fn stats(&self) -> CacheStats {
        let schemas = self.inner.store.values();
        let mut stats = CacheStats {
            connection_count: schemas.len(),
            in_flight_loads: self.inner.loads.in_flight(),
            ..CacheStats::default()
        };
        for schema in &schemas {
            stats.tables += schema.tables.len();
            stats.views += schema.views.len();
            stats.procedures += schema.procedures.len();
            stats.functions += schema.functions.len();
            stats.triggers += schema.triggers.len();
        }
        stats
    }
}

impl Inner {
    /// Steps 2 and 3 of a read
    async fn resolve(
        &self,
        source: Arc<dyn MetadataSource>,
        key: &ConnectionKey,
    ) -> CacheResult<Arc<CachedSchema>> {
        let epoch = self.store.epoch(key);
        let (candidate, from_disk) = match self.store.get(key) {
            Some(schema) => (Some(schema), false),
            None => (self.persistence.load(key).await.map(Arc::new), true),
        };

        if let Some(candidate) = candidate {
            if self.is_current(&source, key, &candidate).await {
                let resident = if from_disk {
                    tracing::debug!(connection = %key, "adopting schema snapshot from disk");
                    self.store.insert(key, epoch, candidate.clone())
                } else {
                    self.store.is_current(key, epoch)
                };
                if resident {
                    self.validity.mark_validated(key);
                }
                tracing::debug!(connection = %key, "schema cache hit (hash match)");
                return Ok(candidate);
            }
        }

        tracing::debug!(connection = %key, "schema cache miss");
        self.refresh(source, key, epoch).await
    }

    /// Compare `candidate` against the live catalog. A failed hash query
    /// counts as a mismatch.
    async fn is_current(
        &self,
        source: &Arc<dyn MetadataSource>,
        key: &ConnectionKey,
        candidate: &CachedSchema,
    ) -> bool {
        if let Some(valid) = self.validity.recent_check(key) {
            tracing::trace!(connection = %key, valid, "reusing recent hash comparison");
            return valid;
        }

        match self.oracle.compute(source.clone(), key).await {
            Ok(current) => {
                let valid = current == candidate.hash;
                if !valid {
                    tracing::debug!(
                        connection = %key,
                        cached_checksum = candidate.hash.checksum,
                        current_checksum = current.checksum,
                        "catalog hash changed"
                    );
                }
                self.validity.record_check(key, valid);
                valid
            }
            Err(e) => {
                tracing::warn!(connection = %key, error = %e, "catalog hash check failed, refreshing");
                false
            }
        }
    }

    /// Fetch everything and replace the resident and on-disk schema. Both
    /// writes are dropped if the key was cleared after `epoch` was taken.
    pub(crate) async fn refresh(
        &self,
        source: Arc<dyn MetadataSource>,
        key: &ConnectionKey,
        epoch: Epoch,
    ) -> CacheResult<Arc<CachedSchema>> {
        let schema = Arc::new(fetch_full_schema(source, &self.oracle, key).await?);
        if self.store.insert(key, epoch, schema.clone()) {
            self.validity.mark_validated(key);
            self.persistence
                .save_if(key, &schema, || self.store.is_current(key, epoch))
                .await;
        }
        Ok(schema)
    }
}
