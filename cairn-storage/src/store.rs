//! The public operation surface.
//!
//! [`Store`] carries the one piece of per-handle configuration, whether reads
//! go through the cache. The free functions are the same operations with the
//! cache enabled.

use cairn_core::{CairnResult, Cursor, Entity, IndexQuery, Key, StoreConfig};

use crate::cache;
use crate::context::StoreContext;
use crate::ops;
use crate::query;
use crate::traits::{CacheService, DocumentStore};

/// Handle selecting the cache policy for every operation made through it.
///
/// `Store::default()` follows [`StoreConfig::default()`] and the free
/// functions: the cache is on. [`Store::new`] is the explicit cache-off
/// handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Store {
    use_cache: bool,
}

impl Default for Store {
    fn default() -> Self {
        Self::from_config(&StoreConfig::default())
    }
}

impl Store {
    /// A store that reads and writes without the cache.
    pub fn new() -> Self {
        Self { use_cache: false }
    }

    /// A store that reads through and populates the cache.
    pub fn with_cache() -> Self {
        Self { use_cache: true }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self {
            use_cache: config.use_cache,
        }
    }

    pub fn uses_cache(&self) -> bool {
        self.use_cache
    }

    /// Persist `entity` and return the key it was stored under.
    ///
    /// See [`CairnError::Persisted`](cairn_core::CairnError::Persisted) for
    /// failures that happen after the store write.
    pub async fn put<S, C, T>(&self, ctx: &StoreContext<S, C>, entity: &mut T) -> CairnResult<Key>
    where
        S: DocumentStore,
        C: CacheService,
        T: Entity,
    {
        ops::put(ctx, entity, self.use_cache).await
    }

    /// Overwrite `entity` with the stored value under its key.
    pub async fn get<S, C, T>(&self, ctx: &StoreContext<S, C>, entity: &mut T) -> CairnResult<()>
    where
        S: DocumentStore,
        C: CacheService,
        T: Entity,
    {
        ops::get(ctx, entity, self.use_cache).await
    }

    /// Overwrite `entity` with the stored value under `key`.
    pub async fn get_by_key<S, C, T>(
        &self,
        ctx: &StoreContext<S, C>,
        key: &Key,
        entity: &mut T,
    ) -> CairnResult<()>
    where
        S: DocumentStore,
        C: CacheService,
        T: Entity,
    {
        ops::get_by_key(ctx, key, entity, self.use_cache).await
    }

    /// Delete `entity` from the store and evict it from the cache.
    ///
    /// Eviction always happens, whatever the cache policy of this handle.
    pub async fn delete<S, C, T>(&self, ctx: &StoreContext<S, C>, entity: &T) -> CairnResult<()>
    where
        S: DocumentStore,
        C: CacheService,
        T: Entity,
    {
        ops::delete(ctx, entity).await
    }

    /// Whether `entity` is in the store. Never consults the cache.
    pub async fn exists<S, C, T>(&self, ctx: &StoreContext<S, C>, entity: &T) -> CairnResult<bool>
    where
        S: DocumentStore,
        C: CacheService,
        T: Entity,
    {
        ops::exists(ctx, entity).await
    }

    pub async fn query_values<S, C, T>(
        &self,
        ctx: &StoreContext<S, C>,
        query: &IndexQuery,
        results: &mut Vec<T>,
    ) -> CairnResult<Cursor>
    where
        S: DocumentStore,
        C: CacheService,
        T: Entity + Default,
    {
        query::query_values(ctx, query, self.use_cache, results).await
    }

    pub async fn query_pointers<S, C, T>(
        &self,
        ctx: &StoreContext<S, C>,
        query: &IndexQuery,
        results: &mut Vec<Box<T>>,
    ) -> CairnResult<Cursor>
    where
        S: DocumentStore,
        C: CacheService,
        T: Entity + Default,
    {
        query::query_pointers(ctx, query, self.use_cache, results).await
    }

    pub async fn put_cache<S, C, T>(&self, ctx: &StoreContext<S, C>, entity: &T) -> CairnResult<()>
    where
        S: DocumentStore,
        C: CacheService,
        T: Entity,
    {
        cache::put_cache(ctx, entity).await
    }

    pub async fn get_cache<S, C, T>(&self, ctx: &StoreContext<S, C>, entity: &mut T) -> CairnResult<()>
    where
        S: DocumentStore,
        C: CacheService,
        T: Entity,
    {
        cache::get_cache(ctx, entity).await
    }

    pub async fn delete_cache<S, C, T>(&self, ctx: &StoreContext<S, C>, entity: &T) -> CairnResult<()>
    where
        S: DocumentStore,
        C: CacheService,
        T: Entity,
    {
        cache::delete_cache(ctx, entity).await
    }
}

// ============================================================================
// FREE FUNCTIONS (cache enabled)
// ============================================================================

/// [`Store::put`] with the cache enabled.
pub async fn put<S, C, T>(ctx: &StoreContext<S, C>, entity: &mut T) -> CairnResult<Key>
where
    S: DocumentStore,
    C: CacheService,
    T: Entity,
{
    Store::with_cache().put(ctx, entity).await
}

/// [`Store::get`] with the cache enabled.
pub async fn get<S, C, T>(ctx: &StoreContext<S, C>, entity: &mut T) -> CairnResult<()>
where
    S: DocumentStore,
    C: CacheService,
    T: Entity,
{
    Store::with_cache().get(ctx, entity).await
}

/// [`Store::get_by_key`] with the cache enabled.
pub async fn get_by_key<S, C, T>(ctx: &StoreContext<S, C>, key: &Key, entity: &mut T) -> CairnResult<()>
where
    S: DocumentStore,
    C: CacheService,
    T: Entity,
{
    Store::with_cache().get_by_key(ctx, key, entity).await
}

pub async fn delete<S, C, T>(ctx: &StoreContext<S, C>, entity: &T) -> CairnResult<()>
where
    S: DocumentStore,
    C: CacheService,
    T: Entity,
{
    ops::delete(ctx, entity).await
}

pub async fn exists<S, C, T>(ctx: &StoreContext<S, C>, entity: &T) -> CairnResult<bool>
where
    S: DocumentStore,
    C: CacheService,
    T: Entity,
{
    ops::exists(ctx, entity).await
}

/// [`Store::query_values`] with the cache enabled.
pub async fn query_values<S, C, T>(
    ctx: &StoreContext<S, C>,
    query: &IndexQuery,
    results: &mut Vec<T>,
) -> CairnResult<Cursor>
where
    S: DocumentStore,
    C: CacheService,
    T: Entity + Default,
{
    Store::with_cache().query_values(ctx, query, results).await
}

/// [`Store::query_pointers`] with the cache enabled.
pub async fn query_pointers<S, C, T>(
    ctx: &StoreContext<S, C>,
    query: &IndexQuery,
    results: &mut Vec<Box<T>>,
) -> CairnResult<Cursor>
where
    S: DocumentStore,
    C: CacheService,
    T: Entity + Default,
{
    Store::with_cache().query_pointers(ctx, query, results).await
}
