//! Process-local cache service.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use cairn_core::{CacheError, CairnResult};

use crate::traits::{CacheService, CacheStats};

/// In-memory [`CacheService`] with hit/miss accounting.
///
/// Entries never expire; this backend has no eviction policy.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: RwLock<HashMap<String, Vec<u8>>>,
    stats: RwLock<CacheStats>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if something is cached under `cache_key`.
    pub fn contains(&self, cache_key: &str) -> bool {
        self.entries
            .read()
            .map(|entries| entries.contains_key(cache_key))
            .unwrap_or(false)
    }

    /// Raw bytes cached under `cache_key`, without touching statistics.
    pub fn peek(&self, cache_key: &str) -> Option<Vec<u8>> {
        self.entries
            .read()
            .ok()
            .and_then(|entries| entries.get(cache_key).cloned())
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
        if let Ok(mut stats) = self.stats.write() {
            stats.entry_count = 0;
        }
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

    fn set_entry_count(&self, count: usize) {
        if let Ok(mut stats) = self.stats.write() {
            stats.entry_count = count as u64;
        }
    }
}

fn poisoned() -> CacheError {
    CacheError::Backend {
        reason: "cache lock poisoned".to_string(),
    }
}

#[async_trait]
impl CacheService for InMemoryCache {
    async fn set(&self, cache_key: &str, value: Vec<u8>) -> CairnResult<()> {
        let count = {
            let mut entries = self.entries.write().map_err(|_| poisoned())?;
            entries.insert(cache_key.to_string(), value);
            entries.len()
        };
        self.set_entry_count(count);
        Ok(())
    }

    async fn get(&self, cache_key: &str) -> CairnResult<Vec<u8>> {
        let found = {
            let entries = self.entries.read().map_err(|_| poisoned())?;
            entries.get(cache_key).cloned()
        };
        self.record(found.is_some());
        found.ok_or_else(|| {
            CacheError::Miss {
                cache_key: cache_key.to_string(),
            }
            .into()
        })
    }

    async fn delete(&self, cache_key: &str) -> CairnResult<()> {
        let count = {
            let mut entries = self.entries.write().map_err(|_| poisoned())?;
            entries.remove(cache_key);
            entries.len()
        };
        self.set_entry_count(count);
        Ok(())
    }
}
