//! Schema cache settings

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_HASH_CACHE_VALIDITY_SECS: u64 = 120;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// How long a computed catalog hash is reused before querying again.
    /// Zero disables the reuse.
    pub hash_cache_validity_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            hash_cache_validity_secs: DEFAULT_HASH_CACHE_VALIDITY_SECS,
        }
    }
}

impl CacheSettings {
    pub fn with_hash_validity(secs: u64) -> Self {
        Self {
            hash_cache_validity_secs: secs,
        }
    }

    pub fn hash_validity(&self) -> Duration {
        Duration::from_secs(self.hash_cache_validity_secs)
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::settings_path()?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::settings_path()?)
    }

    /// Missing file means defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read cache settings from {:?}", path))?;
        serde_json::from_str(&content).with_context(|| "Failed to parse cache settings JSON")
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn settings_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not find config directory")?;
        Ok(config_dir.join("zqlz").join("schema_cache.json"))
    }
}

/// Private storage root the cache directory is created under
pub fn default_storage_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .context("Could not determine data directory")
        .map(|p| p.join("zqlz"))
}
