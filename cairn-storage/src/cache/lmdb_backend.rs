//! LMDB-backed cache service.
//!
//! Uses the heed crate (Rust bindings for LMDB) to provide a memory-mapped
//! key-value store that survives process restarts. Values are the serialized
//! entities, prefixed with the full cache key they were stored under.
//!
//! # Keys
//!
//! LMDB rejects keys longer than 511 bytes. Cache keys up to that
//! length are used directly; longer ones are replaced by a SHA-256 digest.
//! Reads compare the stored cache key with the requested one, so two keys
//! sharing a database key never see each other's value.
//!
//! # Thread Safety
//!
//! LMDB provides ACID transactions. The backend uses:
//! - Read transactions for `get` operations
//! - Write transactions for `set` and `delete`
//! - Statistics are tracked behind a lock

use std::borrow::Cow;
use std::sync::RwLock;

use async_trait::async_trait;
use cairn_core::{CacheError, CairnResult, LmdbCacheConfig};
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use sha2::{Digest, Sha256};

use crate::traits::{CacheService, CacheStats};

/// Largest key LMDB accepts with its default build settings.
const MAX_KEY_SIZE: usize = 511;

const DIGEST_PREFIX: &str = "sha256:";

/// The database key for `cache_key`.
fn db_key(cache_key: &str) -> Cow<'_, [u8]> {
    if cache_key.len() <= MAX_KEY_SIZE {
        Cow::Borrowed(cache_key.as_bytes())
    } else {
        let digest = Sha256::digest(cache_key.as_bytes());
        Cow::Owned(format!("{}{}", DIGEST_PREFIX, hex::encode(digest)).into_bytes())
    }
}

/// Frame `value` as `[key length: u64 BE][cache key][value]`.
fn seal(cache_key: &str, value: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(8 + cache_key.len() + value.len());
    framed.extend_from_slice(&(cache_key.len() as u64).to_be_bytes());
    framed.extend_from_slice(cache_key.as_bytes());
    framed.extend_from_slice(value);
    framed
}

/// The value framed by [`seal`], if it was stored under `cache_key`.
fn unseal<'a>(cache_key: &str, framed: &'a [u8]) -> Option<&'a [u8]> {
    let len_bytes: [u8; 8] = framed.get(..8)?.try_into().ok()?;
    let key_len = usize::try_from(u64::from_be_bytes(len_bytes)).ok()?;
    let rest = &framed[8..];
    let stored_key = rest.get(..key_len)?;
    if stored_key != cache_key.as_bytes() {
        return None;
    }
    rest.get(key_len..)
}

/// Error type for LMDB cache operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbCacheError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbCacheError> for cairn_core::CairnError {
    fn from(e: LmdbCacheError) -> Self {
        cairn_core::CairnError::Cache(CacheError::Backend {
            reason: e.to_string(),
        })
    }
}

/// LMDB-backed [`CacheService`].
///
/// # Example
///
/// ```ignore
/// use cairn_core::LmdbCacheConfig;
/// use cairn_storage::LmdbCache;
///
/// let cache = LmdbCache::open(&LmdbCacheConfig::new("/tmp/cairn-cache"))?;
/// let ctx = StoreContext::new(store, Arc::new(cache));
/// ```
pub struct LmdbCache {
    /// The LMDB environment.
    env: Env,
    /// The main database (single unnamed database).
    db: Database<Bytes, Bytes>,
    stats: RwLock<CacheStats>,
}

impl LmdbCache {
    /// Open (or create) the cache described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The configuration is invalid
    /// - The directory cannot be created
    /// - LMDB environment cannot be opened
    /// - Database cannot be created
    pub fn open(config: &LmdbCacheConfig) -> CairnResult<Self> {
        config.validate()?;
        Ok(Self::open_env(config)?)
    }

    fn open_env(config: &LmdbCacheConfig) -> Result<Self, LmdbCacheError> {
        let map_size = config
            .map_size_bytes()
            .ok_or_else(|| LmdbCacheError::EnvOpen("map size overflows usize".to_string()))?;
        std::fs::create_dir_all(&config.path)?;

        // SAFETY: the environment is opened once per directory by this process
        // and never resized while transactions are live.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(1)
                .open(&config.path)
        }
        .map_err(|e| LmdbCacheError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbCacheError::DbOpen(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        let entry_count = {
            let rtxn = env
                .read_txn()
                .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
            db.len(&rtxn)
                .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?
        };

        Ok(Self {
            env,
            db,
            stats: RwLock::new(CacheStats {
                entry_count,
                ..Default::default()
            }),
        })
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
            .read()
            .map(|stats| stats.clone())
            .unwrap_or_default()
    }

    fn record(&self, hit: bool) {
        if let Ok(mut stats) = self.stats.write() {
            if hit {
                stats.hits += 1;
            } else {
                stats.misses += 1;
            }
        }
    }

    fn refresh_entry_count(&self) -> Result<(), LmdbCacheError> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
        let count = self
            .db
            .len(&rtxn)
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
        if let Ok(mut stats) = self.stats.write() {
            stats.entry_count = count;
        }
        Ok(())
    }

    fn read(&self, cache_key: &str) -> Result<Option<Vec<u8>>, LmdbCacheError> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
        let framed = self
            .db
            .get(&rtxn, &db_key(cache_key))
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
        Ok(framed
            .and_then(|framed| unseal(cache_key, framed))
            .map(<[u8]>::to_vec))
    }

    fn write(&self, cache_key: &str, value: &[u8]) -> Result<(), LmdbCacheError> {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        self.db
            .put(&mut wtxn, &db_key(cache_key), &seal(cache_key, value))
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        self.refresh_entry_count()
    }

    fn remove(&self, cache_key: &str) -> Result<(), LmdbCacheError> {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        let key = db_key(cache_key);
        // A digest slot holding another cache key's value is left alone.
        let owned = self
            .db
            .get(&wtxn, &key)
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?
            .is_some_and(|framed| unseal(cache_key, framed).is_some());
        let deleted = owned
            && self
                .db
                .delete(&mut wtxn, &key)
                .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        if deleted {
            self.refresh_entry_count()?;
        }
        Ok(())
    }
}

#[async_trait]
impl CacheService for LmdbCache {
    async fn set(&self, cache_key: &str, value: Vec<u8>) -> CairnResult<()> {
        Ok(self.write(cache_key, &value)?)
    }

    async fn get(&self, cache_key: &str) -> CairnResult<Vec<u8>> {
        match self.read(cache_key)? {
            Some(bytes) => {
                self.record(true);
                Ok(bytes)
            }
            None => {
                self.record(false);
                Err(CacheError::Miss {
                    cache_key: cache_key.to_string(),
                }
                .into())
            }
        }
    }

    async fn delete(&self, cache_key: &str) -> CairnResult<()> {
        Ok(self.remove(cache_key)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_core::{CairnError, ConfigError};
    use tempfile::TempDir;

    fn open_temp() -> (TempDir, LmdbCache) {
        let dir = TempDir::new().unwrap();
        let cache = LmdbCache::open(&LmdbCacheConfig::new(dir.path()).with_max_size_mb(10)).unwrap();
        (dir, cache)
    }

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let (_dir, cache) = open_temp();
        cache.set("k1", b"{\"a\":1}".to_vec()).await.unwrap();
        assert_eq!(cache.get("k1").await.unwrap(), b"{\"a\":1}".to_vec());
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().entry_count, 1);
    }

    #[tokio::test]
    async fn test_get_missing_is_miss() {
        let (_dir, cache) = open_temp();
        let err = cache.get("absent").await.unwrap_err();
        assert!(err.is_cache_miss());
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test]
    async fn test_delete_removes_entry() {
        let (_dir, cache) = open_temp();
        cache.set("k1", vec![1, 2, 3]).await.unwrap();
        cache.delete("k1").await.unwrap();
        assert!(cache.get("k1").await.unwrap_err().is_cache_miss());
        assert_eq!(cache.stats().entry_count, 0);

        // Deleting again is not an error.
        assert!(cache.delete("k1").await.is_ok());
    }

    #[tokio::test]
    async fn test_long_key_is_hashed() {
        let (_dir, cache) = open_temp();
        let long_key = cairn_core::Key::named("Named", "x".repeat(600)).encode();
        assert!(long_key.len() > MAX_KEY_SIZE);

        cache.set(&long_key, b"long".to_vec()).await.unwrap();
        assert_eq!(cache.get(&long_key).await.unwrap(), b"long".to_vec());

        cache.delete(&long_key).await.unwrap();
        assert!(cache.get(&long_key).await.unwrap_err().is_cache_miss());
        assert_eq!(cache.stats().entry_count, 0);
    }

    #[tokio::test]
    async fn test_shared_db_key_does_not_leak_values() {
        let (_dir, cache) = open_temp();
        let long_key = "k".repeat(MAX_KEY_SIZE + 1);
        let digest_key = String::from_utf8(db_key(&long_key).into_owned()).unwrap();

        cache.set(&digest_key, b"short".to_vec()).await.unwrap();
        assert!(cache.get(&long_key).await.unwrap_err().is_cache_miss());

        // Deleting the long key must not evict the other entry.
        cache.delete(&long_key).await.unwrap();
        assert_eq!(cache.get(&digest_key).await.unwrap(), b"short".to_vec());
    }

    #[test]
    fn test_db_key_boundary() {
        let at_limit = "a".repeat(MAX_KEY_SIZE);
        assert_eq!(&*db_key(&at_limit), at_limit.as_bytes());

        let over = "a".repeat(MAX_KEY_SIZE + 1);
        let hashed = db_key(&over);
        assert!(hashed.len() <= MAX_KEY_SIZE);
        assert!(hashed.starts_with(DIGEST_PREFIX.as_bytes()));
    }

    #[test]
    fn test_unseal_rejects_other_key() {
        let framed = seal("a", b"value");
        assert_eq!(unseal("a", &framed), Some(&b"value"[..]));
        assert_eq!(unseal("b", &framed), None);
        assert_eq!(unseal("a", &framed[..4]), None);
    }

    #[test]
    fn test_overflowing_map_size_rejected() {
        let dir = TempDir::new().unwrap();
        let result = LmdbCache::open(&LmdbCacheConfig::new(dir.path()).with_max_size_mb(usize::MAX));
        assert!(matches!(
            result,
            Err(CairnError::Config(ConfigError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = TempDir::new().unwrap();
        let result = LmdbCache::open(&LmdbCacheConfig::new(dir.path()).with_max_size_mb(0));
        assert!(matches!(
            result,
            Err(CairnError::Config(ConfigError::InvalidValue { .. }))
        ));
    }
}
