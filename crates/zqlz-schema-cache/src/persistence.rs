//! On-disk schema snapshots
//!
//! One JSON file per connection key under `<storage>/schema-cache/`. A file
//! is only a hint: it is never served without a hash comparison, so any
//! problem reading it degrades to a cold cache instead of an error.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::key::ConnectionKey;
use crate::model::CachedSchema;

const CACHE_DIR_NAME: &str = "schema-cache";
const FORMAT_VERSION: u32 = 1;

/// Distinguishes temp files of overlapping writes
static NEXT_TMP: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Error)]
enum PersistError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Snapshot format version {found}, expected {expected}", expected = FORMAT_VERSION)]
    Version { found: u32 },

    #[error("Snapshot belongs to {found}")]
    Connection { found: ConnectionKey },
}

#[derive(Deserialize)]
struct Header {
    format_version: u32,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    format_version: u32,
    connection: &'a ConnectionKey,
    schema: &'a CachedSchema,
}

#[derive(Deserialize)]
struct Snapshot {
    connection: ConnectionKey,
    schema: CachedSchema,
}

/// Snapshot files under one storage directory
///
/// Clones share one write lock, so a save never interleaves with a remove
/// or clear of the same directory.
#[derive(Debug, Clone)]
pub struct SchemaPersistence {
    dir: PathBuf,
    writes: Arc<Mutex<()>>,
}

impl SchemaPersistence {
    pub fn new(storage_dir: impl AsRef<Path>) -> Self {
        Self {
            dir: storage_dir.as_ref().join(CACHE_DIR_NAME),
            writes: Arc::new(Mutex::new(())),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &ConnectionKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.sanitized()))
    }

    /// Stored snapshot for `key`, or `None` when there is nothing usable
    pub async fn load(&self, key: &ConnectionKey) -> Option<CachedSchema> {
        let path = self.path_for(key);
        match self.read_snapshot(&path, key).await {
            Ok(Some(schema)) => {
                tracing::debug!(connection = %key, path = %path.display(), "loaded schema snapshot");
                Some(schema)
            }
            Ok(None) => {
                tracing::debug!(connection = %key, "no schema snapshot on disk");
                None
            }
            Err(e) => {
                tracing::warn!(connection = %key, path = %path.display(), error = %e, "ignoring unreadable schema snapshot");
                None
            }
        }
    }

    async fn read_snapshot(
        &self,
        path: &Path,
        key: &ConnectionKey,
    ) -> Result<Option<CachedSchema>, PersistError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let header: Header = serde_json::from_slice(&bytes)?;
        if header.format_version != FORMAT_VERSION {
            return Err(PersistError::Version {
                found: header.format_version,
            });
        }

        let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
        // Distinct keys can sanitize to the same file name
        if &snapshot.connection != key {
            return Err(PersistError::Connection {
                found: snapshot.connection,
            });
        }
        Ok(Some(snapshot.schema))
    }

    /// Write the snapshot for `key`. Failures are logged, never returned.
    pub async fn save(&self, key: &ConnectionKey, schema: &CachedSchema) {
        self.save_if(key, schema, || true).await;
    }

    /// Write the snapshot only if `still_current` holds once no remove or
    /// clear can run alongside the write
    pub async fn save_if(
        &self,
        key: &ConnectionKey,
        schema: &CachedSchema,
        still_current: impl FnOnce() -> bool,
    ) {
        let _guard = self.writes.lock().await;
        if !still_current() {
            tracing::debug!(connection = %key, "skipping save of a cleared schema");
            return;
        }
        match self.write_snapshot(key, schema).await {
            Ok(path) => {
                tracing::debug!(connection = %key, path = %path.display(), "saved schema snapshot");
            }
            Err(e) => {
                tracing::warn!(connection = %key, error = %e, "failed to save schema snapshot");
            }
        }
    }

    async fn write_snapshot(
        &self,
        key: &ConnectionKey,
        schema: &CachedSchema,
    ) -> Result<PathBuf, PersistError> {
        let bytes = serde_json::to_vec(&SnapshotRef {
            format_version: FORMAT_VERSION,
            connection: key,
            schema,
        })?;

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(key);
        let tmp = path.with_extension(format!(
            "json.{}.tmp",
            NEXT_TMP.fetch_add(1, Ordering::Relaxed)
        ));
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(path)
    }

    /// Delete the snapshot for `key`, if any
    pub async fn remove(&self, key: &ConnectionKey) {
        let _guard = self.writes.lock().await;
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => tracing::debug!(connection = %key, "removed schema snapshot"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(connection = %key, error = %e, "failed to remove schema snapshot");
            }
        }
    }

    /// Delete every snapshot in the cache directory
    pub async fn clear(&self) {
        let _guard = self.writes.lock().await;
        if let Err(e) = self.remove_all().await {
            tracing::warn!(dir = %self.dir.display(), error = %e, "failed to clear schema snapshots");
        }
    }

    async fn remove_all(&self) -> Result<usize, PersistError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                tokio::fs::remove_file(&path).await?;
                removed += 1;
            }
        }
        tracing::debug!(removed, "cleared schema snapshots");
        Ok(removed)
    }
}
