//! Configuration schema for Strata
//!
//! Configuration is stored at `~/.config/strata/config.toml`

use crate::cache::{
    engine::DEFAULT_MANIFEST_NAME, pool::DEFAULT_POOL_WIDTH, store::DEFAULT_INDEX_FILE,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Remote repository settings
    pub repository: RepositoryConfig,

    /// Local cache layout
    pub cache: CacheConfig,

    /// Worker pool settings
    pub pool: PoolConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Remote repository settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Repository root (`file://`, `http://` or `https://`)
    pub url: String,

    /// Timeout for a single HTTP request in seconds
    pub timeout_secs: u64,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout_secs: 30,
        }
    }
}

/// Local cache layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory releases are mirrored into (default: platform cache dir)
    pub work_dir: Option<PathBuf>,

    /// Completion index file name inside each layer directory
    pub index_file: String,

    /// Top manifest name inside each layer directory
    pub manifest_name: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            work_dir: None,
            index_file: DEFAULT_INDEX_FILE.to_string(),
            manifest_name: DEFAULT_MANIFEST_NAME.to_string(),
        }
    }
}

impl CacheConfig {
    /// Configured work dir, or `~/.cache/strata`
    pub fn work_dir(&self) -> PathBuf {
        self.work_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("strata")
        })
    }
}

/// Worker pool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum concurrent repository requests
    pub width: usize,

    /// Extra attempts for a failing file load (0 = fail immediately)
    pub export_retries: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_POOL_WIDTH,
            export_retries: 0,
        }
    }
}
