//! Index-only scans hydrated through the cache-aware read path.

use cairn_core::{CairnResult, Cursor, Diagnostic, Entity, IndexQuery};

use crate::context::StoreContext;
use crate::ops;
use crate::traits::{CacheService, DocumentStore, KeyScan};

/// Run `query` keys-only and hydrate each key into a fresh `T`.
///
/// Hydrated entities are handed to `sink` in scan order. A key that fails to
/// hydrate is reported as [`Diagnostic::ItemSkipped`] and left out; scan
/// errors abort the query.
async fn project<S, C, T, F>(
    ctx: &StoreContext<S, C>,
    query: &IndexQuery,
    use_cache: bool,
    mut sink: F,
) -> CairnResult<Cursor>
where
    S: DocumentStore,
    C: CacheService,
    T: Entity + Default,
    F: FnMut(T),
{
    let query = query.clone().keys_only();
    let mut scan = ctx.store().run(&query).await?;

    let mut hydrated = 0usize;
    while let Some(key) = scan.next().await? {
        let mut entity = T::default();
        match ops::get_by_key(ctx, &key, &mut entity, use_cache).await {
            Ok(()) => {
                sink(entity);
                hydrated += 1;
            }
            Err(error) => ctx
                .diagnostics()
                .record(Diagnostic::ItemSkipped { key, error }),
        }
    }

    tracing::debug!(kind = query.kind(), hydrated, "Query complete");
    scan.cursor()
}

/// Append the entities matched by `query` to `results` by value.
pub(crate) async fn query_values<S, C, T>(
    ctx: &StoreContext<S, C>,
    query: &IndexQuery,
    use_cache: bool,
    results: &mut Vec<T>,
) -> CairnResult<Cursor>
where
    S: DocumentStore,
    C: CacheService,
    T: Entity + Default,
{
    project(ctx, query, use_cache, |entity: T| results.push(entity)).await
}

/// Append the entities matched by `query` to `results`, boxed.
pub(crate) async fn query_pointers<S, C, T>(
    ctx: &StoreContext<S, C>,
    query: &IndexQuery,
    use_cache: bool,
    results: &mut Vec<Box<T>>,
) -> CairnResult<Cursor>
where
    S: DocumentStore,
    C: CacheService,
    T: Entity + Default,
{
    project(ctx, query, use_cache, |entity: T| results.push(Box::new(entity))).await
}
