//! In-memory schema store

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::key::ConnectionKey;
use crate::model::CachedSchema;

/// Write generation of one connection key
///
/// Taken before starting work whose result will be written back. `clear`
/// and `clear_all` move it on, so a write carrying an older epoch is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Epoch {
    generation: u64,
    key_epoch: u64,
}

#[derive(Default)]
struct Slots {
    schemas: HashMap<ConnectionKey, Arc<CachedSchema>>,
    epochs: HashMap<ConnectionKey, u64>,
    generation: u64,
}

impl Slots {
    fn epoch(&self, key: &ConnectionKey) -> Epoch {
        Epoch {
            generation: self.generation,
            key_epoch: self.epochs.get(key).copied().unwrap_or(0),
        }
    }
}

/// Resident schemas, one per connection key
///
/// Readers get an `Arc` snapshot and never block writers for longer than a
/// map operation. Edits copy-on-write through `Arc::make_mut`, so a reader
/// holding an older snapshot keeps seeing it unchanged.
#[derive(Default)]
pub struct CacheStore {
    slots: RwLock<Slots>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &ConnectionKey) -> Option<Arc<CachedSchema>> {
        self.slots.read().schemas.get(key).cloned()
    }

    pub fn contains(&self, key: &ConnectionKey) -> bool {
        self.slots.read().schemas.contains_key(key)
    }

    pub fn epoch(&self, key: &ConnectionKey) -> Epoch {
        self.slots.read().epoch(key)
    }

    pub fn is_current(&self, key: &ConnectionKey, epoch: Epoch) -> bool {
        self.slots.read().epoch(key) == epoch
    }

    /// Store `schema` unless the key was cleared since `epoch` was taken.
    /// Returns whether it was stored.
    pub fn insert(
        &self,
        key: &ConnectionKey,
        epoch: Epoch,
        schema: Arc<CachedSchema>,
    ) -> bool {
        let mut slots = self.slots.write();
        if slots.epoch(key) != epoch {
            tracing::debug!(connection = %key, "dropping schema from before a clear");
            return false;
        }
        tracing::trace!(connection = %key, "storing schema");
        slots.schemas.insert(key.clone(), schema);
        true
    }

    /// Apply `edit` to the resident schema for `key` as one atomic step.
    /// Returns `None` when nothing is cached for the key or it was cleared
    /// since `epoch` was taken.
    pub fn update<R>(
        &self,
        key: &ConnectionKey,
        epoch: Epoch,
        edit: impl FnOnce(&mut CachedSchema) -> R,
    ) -> Option<R> {
        let mut slots = self.slots.write();
        if slots.epoch(key) != epoch {
            return None;
        }
        let schema = slots.schemas.get_mut(key)?;
        Some(edit(Arc::make_mut(schema)))
    }

    /// Drop the schema for `key` and move its epoch on
    pub fn remove(&self, key: &ConnectionKey) -> Option<Arc<CachedSchema>> {
        let mut slots = self.slots.write();
        *slots.epochs.entry(key.clone()).or_default() += 1;
        slots.schemas.remove(key)
    }

    /// Drop every schema and move every epoch on, returning how many were
    /// resident
    pub fn clear(&self) -> usize {
        let mut slots = self.slots.write();
        slots.generation += 1;
        let count = slots.schemas.len();
        slots.schemas.clear();
        count
    }

    /// Snapshot of every resident schema
    pub fn values(&self) -> Vec<Arc<CachedSchema>> {
        self.slots.read().schemas.values().cloned().collect()
    }
}
