//! Thin serialization adapters over the cache service.
//!
//! The cache key of an entity is always `entity.key().encode()`.

use cairn_core::{decode_entity, encode_entity, CairnResult, Entity};

use crate::context::StoreContext;
use crate::traits::{CacheService, DocumentStore};

/// Serialize `entity` and store it under `cache_key`.
pub(crate) async fn write_cached<C, T>(cache: &C, cache_key: &str, entity: &T) -> CairnResult<()>
where
    C: CacheService + ?Sized,
    T: Entity,
{
    let value = encode_entity(entity)?;
    cache.set(cache_key, value).await
}

/// Fetch and deserialize the value cached under `cache_key`.
///
/// A miss surfaces as `CacheError::Miss`; undecodable bytes as a codec error.
pub(crate) async fn read_cached<C, T>(cache: &C, cache_key: &str) -> CairnResult<T>
where
    C: CacheService + ?Sized,
    T: Entity,
{
    let bytes = cache.get(cache_key).await?;
    Ok(decode_entity(&bytes)?)
}

/// Write `entity` into the cache under its key's encoding.
///
/// Failures are returned: the caller asked for this write explicitly.
pub async fn put_cache<S, C, T>(ctx: &StoreContext<S, C>, entity: &T) -> CairnResult<()>
where
    S: DocumentStore,
    C: CacheService,
    T: Entity,
{
    let cache_key = entity.key().encode();
    write_cached(ctx.cache(), &cache_key, entity).await
}

/// Overwrite `entity` with the value cached under its key.
///
/// `entity` only needs the fields its key is derived from. It is left
/// untouched if the lookup fails; a miss is reported as `CacheError::Miss`.
pub async fn get_cache<S, C, T>(ctx: &StoreContext<S, C>, entity: &mut T) -> CairnResult<()>
where
    S: DocumentStore,
    C: CacheService,
    T: Entity,
{
    let cache_key = entity.key().encode();
    *entity = read_cached(ctx.cache(), &cache_key).await?;
    Ok(())
}

/// Remove the cache entry for `entity`.
pub async fn delete_cache<S, C, T>(ctx: &StoreContext<S, C>, entity: &T) -> CairnResult<()>
where
    S: DocumentStore,
    C: CacheService,
    T: Entity,
{
    let cache_key = entity.key().encode();
    ctx.cache().delete(&cache_key).await
}
