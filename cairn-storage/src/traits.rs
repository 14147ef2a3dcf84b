//! Collaborator traits for the document store and the cache service.
//!
//! Cairn never talks to a concrete database or cache. It drives these traits,
//! and backends (in-memory, LMDB, or a remote service adapter) implement them.

use async_trait::async_trait;
use cairn_core::{CairnResult, Cursor, IndexQuery, Key};

/// Durable document store.
///
/// # Contract
///
/// - `get` must return `StoreError::NotFound` for a missing key, never an
///   empty document.
/// - `run` walks the index in the order given by the query's sort spec (key
///   order breaking ties) and yields keys only.
/// - Scan freshness is the store's own consistency model: a store that
///   indexes asynchronously may not show a just-written entity in a scan.
///   Cairn adds no stronger guarantee and never waits for the index.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// The key stream produced by [`DocumentStore::run`].
    type Scan: KeyScan;

    /// Write a serialized entity under `key`, returning the key it was stored under.
    async fn put(&self, key: &Key, document: Vec<u8>) -> CairnResult<Key>;

    /// Read the serialized entity stored under `key`.
    async fn get(&self, key: &Key) -> CairnResult<Vec<u8>>;

    /// Remove the entity stored under `key`.
    async fn delete(&self, key: &Key) -> CairnResult<()>;

    /// Start an index scan.
    async fn run(&self, query: &IndexQuery) -> CairnResult<Self::Scan>;
}

/// An ordered stream of keys from an index scan.
#[async_trait]
pub trait KeyScan: Send {
    /// The next key, or `Ok(None)` at end of stream.
    async fn next(&mut self) -> CairnResult<Option<Key>>;

    /// A cursor positioned after the last key yielded so far.
    ///
    /// Passing it as the start of a later query resumes the scan there.
    fn cursor(&self) -> CairnResult<Cursor>;
}

/// Key to serialized-value cache service.
///
/// # Contract
///
/// - `get` must return `CacheError::Miss` when nothing is cached under the
///   key. Any other error is treated as the cache being unhealthy.
/// - `delete` of an absent key succeeds.
/// - Eviction and expiry are the service's business.
#[async_trait]
pub trait CacheService: Send + Sync {
    async fn set(&self, cache_key: &str, value: Vec<u8>) -> CairnResult<()>;

    async fn get(&self, cache_key: &str) -> CairnResult<Vec<u8>>;

    async fn delete(&self, cache_key: &str) -> CairnResult<()>;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
