//! Cache-aside coordination between the document store and the cache.
//!
//! These are the core algorithms behind [`Store`](crate::Store) and the free
//! functions. Store errors are authoritative and always propagate. Cache
//! errors propagate only on explicit writes; on the read and delete paths they
//! go to the context's diagnostic sink and the store stays in charge.

use cairn_core::{decode_entity, encode_entity, CairnError, CairnResult, Diagnostic, Entity, Key};

use crate::cache::{read_cached, write_cached};
use crate::context::StoreContext;
use crate::traits::{CacheService, DocumentStore};

/// Persist `entity`, then optionally populate the cache.
///
/// Sequence: `before_put` → store write → `after_put` → cache write.
/// A failure after the store write is returned as [`CairnError::Persisted`]
/// carrying the key; the write is not rolled back.
pub(crate) async fn put<S, C, T>(
    ctx: &StoreContext<S, C>,
    entity: &mut T,
    cache: bool,
) -> CairnResult<Key>
where
    S: DocumentStore,
    C: CacheService,
    T: Entity,
{
    entity.before_put()?;

    let document = encode_entity(entity)?;
    let key = ctx.store().put(&entity.key(), document).await?;

    if let Err(e) = entity.after_put(&key) {
        return Err(CairnError::persisted(key, e));
    }

    if cache {
        let cache_key = key.encode();
        if let Err(e) = write_cached(ctx.cache(), &cache_key, entity).await {
            return Err(CairnError::persisted(key, e));
        }
        tracing::debug!(%key, "Cached entity after put");
    }

    Ok(key)
}

/// Delete `entity` from the store, then evict it from the cache.
///
/// A failed eviction is reported, not returned: the store delete already
/// happened, and the stale entry lives until the next overwrite or eviction.
pub(crate) async fn delete<S, C, T>(ctx: &StoreContext<S, C>, entity: &T) -> CairnResult<()>
where
    S: DocumentStore,
    C: CacheService,
    T: Entity,
{
    let key = entity.key();
    ctx.store().delete(&key).await?;

    let cache_key = key.encode();
    if let Err(error) = ctx.cache().delete(&cache_key).await {
        ctx.diagnostics()
            .record(Diagnostic::CacheEvictFailed { cache_key, error });
    }
    Ok(())
}

/// Load `entity` by its own key.
pub(crate) async fn get<S, C, T>(
    ctx: &StoreContext<S, C>,
    entity: &mut T,
    use_cache: bool,
) -> CairnResult<()>
where
    S: DocumentStore,
    C: CacheService,
    T: Entity,
{
    let key = entity.key();
    get_by_key(ctx, &key, entity, use_cache).await
}

/// Load the entity stored under `key` into `entity`.
///
/// With `use_cache`:
/// - hit: the cached value is returned and the store is not touched
/// - miss: the store is read, `after_get` runs, and the value is written back
///   to the cache (a failed write-back is only reported)
/// - any other cache failure: reported, then the store is read without
///   re-populating the cache
///
/// `after_get` runs only on the miss path, on the value about to be cached.
/// Uncached reads and the fallback return the stored document as decoded.
/// `entity` is only overwritten on success.
pub(crate) async fn get_by_key<S, C, T>(
    ctx: &StoreContext<S, C>,
    key: &Key,
    entity: &mut T,
    use_cache: bool,
) -> CairnResult<()>
where
    S: DocumentStore,
    C: CacheService,
    T: Entity,
{
    if use_cache {
        let cache_key = key.encode();
        match read_cached::<C, T>(ctx.cache(), &cache_key).await {
            Ok(cached) => {
                tracing::debug!(%key, "Cache hit");
                *entity = cached;
                return Ok(());
            }
            Err(e) if e.is_cache_miss() => {
                tracing::debug!(%key, "Cache miss");
                let mut loaded: T = read_document(ctx, key).await?;
                loaded.after_get(key)?;
                *entity = loaded;
                if let Err(error) = write_cached(ctx.cache(), &cache_key, &*entity).await {
                    ctx.diagnostics()
                        .record(Diagnostic::CacheFillFailed { cache_key, error });
                }
                return Ok(());
            }
            Err(error) => {
                ctx.diagnostics()
                    .record(Diagnostic::CacheReadFailed { cache_key, error });
            }
        }
    }

    *entity = read_document(ctx, key).await?;
    Ok(())
}

/// Returns whether `entity` is present in the store. The cache is not consulted.
pub(crate) async fn exists<S, C, T>(ctx: &StoreContext<S, C>, entity: &T) -> CairnResult<bool>
where
    S: DocumentStore,
    C: CacheService,
    T: Entity,
{
    match read_document::<S, C, T>(ctx, &entity.key()).await {
        Ok(_) => Ok(true),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}

/// Read and decode the document under `key`. No hooks run.
async fn read_document<S, C, T>(ctx: &StoreContext<S, C>, key: &Key) -> CairnResult<T>
where
    S: DocumentStore,
    C: CacheService,
    T: Entity,
{
    let document = ctx.store().get(key).await?;
    Ok(decode_entity(&document)?)
}
