//! Cached schema data model

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use zqlz_core::{
    ColumnInfo, ConstraintInfo, FunctionInfo, IndexInfo, ProcedureInfo, TableInfo, TriggerInfo,
    ViewInfo,
};

use crate::key::ObjectKey;

/// Ordered mapping from an object (or owning table) to its cached data
pub type ObjectMap<T> = IndexMap<ObjectKey, T>;

/// Per-kind object counts included in the fingerprint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectCounts {
    pub tables: i64,
    pub views: i64,
    pub procedures: i64,
    pub functions: i64,
}

/// Aggregate fingerprint of a database catalog
///
/// Equality covers the checksum, the max-modify timestamp text and the
/// counts. `computed_at` only records when the fingerprint was taken.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseHash {
    pub checksum: i64,
    pub max_modify_date: String,
    pub object_counts: ObjectCounts,
    pub computed_at: DateTime<Utc>,
}

impl PartialEq for DatabaseHash {
    fn eq(&self, other: &Self) -> bool {
        self.checksum == other.checksum
            && self.max_modify_date == other.max_modify_date
            && self.object_counts == other.object_counts
    }
}

impl Eq for DatabaseHash {}

/// Everything cached for one connection key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedSchema {
    pub hash: DatabaseHash,
    #[serde(with = "entries")]
    pub tables: ObjectMap<TableInfo>,
    #[serde(with = "entries")]
    pub views: ObjectMap<ViewInfo>,
    #[serde(with = "entries")]
    pub procedures: ObjectMap<ProcedureInfo>,
    #[serde(with = "entries")]
    pub functions: ObjectMap<FunctionInfo>,
    #[serde(with = "entries")]
    pub triggers: ObjectMap<TriggerInfo>,
    /// Keyed by owning table
    #[serde(with = "entries")]
    pub columns: ObjectMap<Vec<ColumnInfo>>,
    /// Keyed by owning table
    #[serde(with = "entries")]
    pub indexes: ObjectMap<Vec<IndexInfo>>,
    /// Keyed by owning table
    #[serde(with = "entries")]
    pub constraints: ObjectMap<Vec<ConstraintInfo>>,
    pub last_updated: DateTime<Utc>,
}

impl CachedSchema {
    /// Empty schema stamped with `hash`
    pub fn new(hash: DatabaseHash) -> Self {
        Self {
            hash,
            tables: ObjectMap::new(),
            views: ObjectMap::new(),
            procedures: ObjectMap::new(),
            functions: ObjectMap::new(),
            triggers: ObjectMap::new(),
            columns: ObjectMap::new(),
            indexes: ObjectMap::new(),
            constraints: ObjectMap::new(),
            last_updated: Utc::now(),
        }
    }

    /// Drop a table together with its columns, indexes and constraints
    pub fn remove_table(&mut self, key: &ObjectKey) -> Option<TableInfo> {
        self.columns.shift_remove(key);
        self.indexes.shift_remove(key);
        self.constraints.shift_remove(key);
        self.tables.shift_remove(key)
    }

    /// Insert (or replace) a table and its dependent collections as one unit
    pub fn insert_table(
        &mut self,
        table: TableInfo,
        columns: Vec<ColumnInfo>,
        indexes: Vec<IndexInfo>,
        constraints: Vec<ConstraintInfo>,
    ) {
        let key = ObjectKey::new(&table.schema, &table.name);
        self.columns.insert(key.clone(), columns);
        self.indexes.insert(key.clone(), indexes);
        self.constraints.insert(key.clone(), constraints);
        self.tables.insert(key, table);
    }

    pub fn table_columns(&self, key: &ObjectKey) -> &[ColumnInfo] {
        self.columns.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn table_indexes(&self, key: &ObjectKey) -> &[IndexInfo] {
        self.indexes.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn table_constraints(&self, key: &ObjectKey) -> &[ConstraintInfo] {
        self.constraints.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    /// Every foreign key across all tables
    pub fn foreign_keys(&self) -> impl Iterator<Item = &ConstraintInfo> {
        self.constraints
            .values()
            .flatten()
            .filter(|c| c.is_foreign_key())
    }

    /// Number of top-level objects (tables, views, routines, triggers)
    pub fn object_count(&self) -> usize {
        self.tables.len()
            + self.views.len()
            + self.procedures.len()
            + self.functions.len()
            + self.triggers.len()
    }

    pub(crate) fn touch(&mut self) {
        self.last_updated = Utc::now();
    }
}

/// Serde bridge writing an `IndexMap` as a sequence of `[key, value]` pairs
/// and reading it back into an `IndexMap`. JSON object keys must be strings,
/// and `ObjectKey` is a struct.
mod entries {
    use indexmap::IndexMap;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::hash::Hash;

    pub fn serialize<S, K, V>(map: &IndexMap<K, V>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        K: Serialize,
        V: Serialize,
    {
        serializer.collect_seq(map.iter())
    }

    pub fn deserialize<'de, D, K, V>(deserializer: D) -> Result<IndexMap<K, V>, D::Error>
    where
        D: Deserializer<'de>,
        K: Deserialize<'de> + Eq + Hash,
        V: Deserialize<'de>,
    {
        let pairs = Vec::<(K, V)>::deserialize(deserializer)?;
        Ok(pairs.into_iter().collect())
    }
}
