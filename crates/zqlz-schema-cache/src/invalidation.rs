//! Targeted invalidation and explicit refresh
//!
//! When a statement is known to have changed one catalog object, only that
//! object is dropped and re-fetched instead of reloading the whole catalog.
//! The stored hash is then re-stamped from a fresh query so the next read
//! does not see a mismatch caused by the change that was just absorbed.

use std::sync::Arc;
use zqlz_core::{MetadataSource, ObjectType};

use crate::error::CacheResult;
use crate::fetch::{fetch_function, fetch_procedure, fetch_table, fetch_table_details, fetch_view};
use crate::key::{ConnectionKey, ObjectKey};
use crate::model::CachedSchema;
use crate::service::SchemaCacheService;
use crate::store::Epoch;

impl SchemaCacheService {
    /// Drop and re-fetch one object after it changed.
    ///
    /// Does nothing when no schema is resident for the connection. If the
    /// narrow re-fetch fails the error is returned and the object stays
    /// removed. Index, constraint and column changes only re-stamp the hash;
    /// the owning table's collections are left as they are.
    #[tracing::instrument(skip(self, source), fields(server = %source.server_name(), database = %source.database_name()))]
    pub async fn invalidate_object(
        &self,
        source: Arc<dyn MetadataSource>,
        object_type: ObjectType,
        schema_name: &str,
        name: &str,
    ) -> CacheResult<()> {
        let key = ConnectionKey::for_source(source.as_ref());
        if !self.inner.store.contains(&key) {
            tracing::debug!(connection = %key, "nothing cached, skipping invalidation");
            return Ok(());
        }

        let epoch = self.inner.store.epoch(&key);
        let object = ObjectKey::new(schema_name, name);
        let src = source.as_ref();
        let store = &self.inner.store;

        match object_type {
            ObjectType::Table => {
                store.update(&key, epoch, |schema| schema.remove_table(&object));
                if let Some(table) = fetch_table(src, schema_name, name).await? {
                    let details = fetch_table_details(src, schema_name, name).await?;
                    store.update(&key, epoch, |schema| {
                        schema.insert_table(
                            table,
                            details.columns,
                            details.indexes,
                            details.constraints,
                        )
                    });
                }
            }
            ObjectType::View => {
                store.update(&key, epoch, |schema| schema.views.shift_remove(&object));
                if let Some(view) = fetch_view(src, schema_name, name).await? {
                    store.update(&key, epoch, |schema| {
                        schema.views.insert(object.clone(), view)
                    });
                }
            }
            ObjectType::Procedure => {
                store.update(&key, epoch, |schema| {
                    schema.procedures.shift_remove(&object)
                });
                if let Some(procedure) = fetch_procedure(src, schema_name, name).await? {
                    store.update(&key, epoch, |schema| {
                        schema.procedures.insert(object.clone(), procedure)
                    });
                }
            }
            ObjectType::Function => {
                store.update(&key, epoch, |schema| {
                    schema.functions.shift_remove(&object)
                });
                if let Some(function) = fetch_function(src, schema_name, name).await? {
                    store.update(&key, epoch, |schema| {
                        schema.functions.insert(object.clone(), function)
                    });
                }
            }
            ObjectType::Trigger => {
                // A recreated trigger shows up on the next full refresh
                store.update(&key, epoch, |schema| {
                    schema.triggers.shift_remove(&object)
                });
            }
            ObjectType::Index | ObjectType::Constraint | ObjectType::Column => {
                tracing::debug!(connection = %key, %object_type, %object, "no collection refresh for this object type");
            }
        }

        let hash = self.inner.oracle.compute_fresh(source.clone(), &key).await?;
        store.update(&key, epoch, |schema| {
            schema.hash = hash;
            schema.touch();
        });

        if let Some(schema) = store.get(&key) {
            self.persist_in_background(key.clone(), epoch, schema);
        }
        tracing::debug!(connection = %key, %object_type, %object, "invalidated object");
        Ok(())
    }

    pub async fn refresh_table(
        &self,
        source: Arc<dyn MetadataSource>,
        schema_name: &str,
        name: &str,
    ) -> CacheResult<()> {
        self.invalidate_object(source, ObjectType::Table, schema_name, name)
            .await
    }

    pub async fn refresh_view(
        &self,
        source: Arc<dyn MetadataSource>,
        schema_name: &str,
        name: &str,
    ) -> CacheResult<()> {
        self.invalidate_object(source, ObjectType::View, schema_name, name)
            .await
    }

    pub async fn refresh_procedure(
        &self,
        source: Arc<dyn MetadataSource>,
        schema_name: &str,
        name: &str,
    ) -> CacheResult<()> {
        self.invalidate_object(source, ObjectType::Procedure, schema_name, name)
            .await
    }

    pub async fn refresh_function(
        &self,
        source: Arc<dyn MetadataSource>,
        schema_name: &str,
        name: &str,
    ) -> CacheResult<()> {
        self.invalidate_object(source, ObjectType::Function, schema_name, name)
            .await
    }

    /// Reload the whole catalog regardless of freshness. Joins a load
    /// already running for the connection instead of starting a second one.
    #[tracing::instrument(skip(self, source), fields(server = %source.server_name(), database = %source.database_name()))]
    pub async fn refresh_schema(
        &self,
        source: Arc<dyn MetadataSource>,
    ) -> CacheResult<Arc<CachedSchema>> {
        let key = ConnectionKey::for_source(source.as_ref());
        tracing::info!(connection = %key, "refreshing schema");
        let inner = self.inner.clone();
        let work_key = key.clone();
        self.inner
            .loads
            .run(&key, async move {
                let epoch = inner.store.epoch(&work_key);
                inner.refresh(source, &work_key, epoch).await
            })
            .await
    }

    /// Forget everything held for one connection, on disk included
    pub async fn clear(&self, key: &ConnectionKey) {
        let inner = &self.inner;
        let was_resident = inner.store.remove(key).is_some();
        inner.validity.forget(key);
        inner.oracle.forget(key);
        inner.loads.forget(key);
        inner.persistence.remove(key).await;
        tracing::info!(connection = %key, was_resident, "cleared schema cache");
    }

    /// Forget everything for every connection
    pub async fn clear_all(&self) {
        let inner = &self.inner;
        let cleared = inner.store.clear();
        inner.validity.clear();
        inner.oracle.clear();
        inner.loads.clear();
        inner.persistence.clear().await;
        tracing::info!(cleared, "cleared all schema caches");
    }

    /// Save without waiting; the write is dropped if the key gets cleared
    /// before it lands
    fn persist_in_background(
        &self,
        key: ConnectionKey,
        epoch: Epoch,
        schema: Arc<CachedSchema>,
    ) {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            inner
                .persistence
                .save_if(&key, &schema, || inner.store.is_current(&key, epoch))
                .await;
        });
    }
}
