//! Configuration types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::{CairnResult, ConfigError};

fn default_use_cache() -> bool {
    true
}

/// Store handle configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Consult and populate the cache on reads. Defaults to `true`, matching
    /// `Store::default()` and the free functions.
    #[serde(default = "default_use_cache")]
    pub use_cache: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            use_cache: default_use_cache(),
        }
    }
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }
}

/// LMDB cache backend configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LmdbCacheConfig {
    /// Directory holding the LMDB files. Created if missing.
    pub path: PathBuf,
    /// Maximum map size in megabytes.
    pub max_size_mb: usize,
}

impl LmdbCacheConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_size_mb: 64,
        }
    }

    pub fn with_max_size_mb(mut self, max_size_mb: usize) -> Self {
        self.max_size_mb = max_size_mb;
        self
    }

    /// Map size in bytes, or `None` if `max_size_mb` does not fit in a `usize`
    /// once scaled.
    pub fn map_size_bytes(&self) -> Option<usize> {
        self.max_size_mb.checked_mul(1024 * 1024)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> CairnResult<()> {
        if self.path.as_os_str().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "path".to_string(),
            }
            .into());
        }

        if self.max_size_mb == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_size_mb".to_string(),
                value: self.max_size_mb.to_string(),
                reason: "max_size_mb must be greater than 0".to_string(),
            }
            .into());
        }

        if self.map_size_bytes().is_none() {
            return Err(ConfigError::InvalidValue {
                field: "max_size_mb".to_string(),
                value: self.max_size_mb.to_string(),
                reason: "map size in bytes overflows usize".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

/// Top-level configuration file.
///
/// ```toml
/// [store]
/// use_cache = true
///
/// [lmdb]
/// path = "/var/cache/cairn"
/// max_size_mb = 256
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CairnConfig {
    #[serde(default)]
    pub store: StoreConfig,
    pub lmdb: Option<LmdbCacheConfig>,
}

impl CairnConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(input: &str) -> CairnResult<Self> {
        let config: CairnConfig = toml::from_str(input).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CairnResult<()> {
        if let Some(lmdb) = &self.lmdb {
            lmdb.validate()?;
        }
        Ok(())
    }
}
