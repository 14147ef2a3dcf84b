//! Property-Based Tests for the Cache-Aside Read/Write Paths
//!
//! **Property 1: Round-trip.** `put(e)` then `get` on a shell built from
//! `e`'s identifying fields returns a value equal to `e`, with or without
//! the cache.
//!
//! **Property 2: Delete.** After `delete(e)`, `get` returns the store's
//! NotFound and the cache holds nothing for `e`.
//!
//! **Property 3: Cache authority on hit.** After a cached `put(e)`, removing
//! `e` from the store behind Cairn's back does not affect `get`, which never
//! touches the store.
//!
//! **Property 4: Miss repopulation.** An entity present in the store but not
//! the cache is returned by `get`, which leaves the cache populated.

use std::sync::Arc;
use std::time::Duration;

use cairn_core::{decode_entity, CairnResult, Diagnostic, Entity, LmdbCacheConfig};
use cairn_storage::{
    delete, delete_cache, exists, get, get_cache, put, put_cache, CacheService, DocumentStore,
    InMemoryDocumentStore, LmdbCache, Store, StoreContext,
};
use cairn_test_utils::assertions::{
    assert_cache_miss, assert_hook_error, assert_not_found, assert_persisted,
    assert_store_failure,
};
use cairn_test_utils::fixtures::{faulty, in_memory, test_document, test_user};
use cairn_test_utils::generators::arb_user;
use cairn_test_utils::{LineItem, User};
use proptest::prelude::*;
use tokio::runtime::Runtime;

fn test_runtime() -> Result<Runtime, TestCaseError> {
    Runtime::new().map_err(|e| TestCaseError::fail(format!("Failed to create runtime: {}", e)))
}

fn check<T>(result: CairnResult<T>) -> Result<T, TestCaseError> {
    result.map_err(|e| TestCaseError::fail(e.to_string()))
}

// ============================================================================
// PROPERTY TESTS
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// **Property 1: Round-trip**
    #[test]
    fn prop_put_then_get_roundtrip(user in arb_user(), cached in any::<bool>()) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let h = in_memory();
            let store = if cached { Store::with_cache() } else { Store::new() };

            let mut written = user.clone();
            let key = check(store.put(&h.ctx, &mut written).await)?;
            prop_assert_eq!(&key, &user.key());

            let mut shell = User::shell(user.id);
            check(store.get(&h.ctx, &mut shell).await)?;
            prop_assert_eq!(&shell, &user);
            Ok::<(), TestCaseError>(())
        })?;
    }

    /// **Property 2: Delete**
    #[test]
    fn prop_delete_then_get_not_found(user in arb_user()) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let h = in_memory();
            let mut written = user.clone();
            check(put(&h.ctx, &mut written).await)?;
            check(delete(&h.ctx, &user).await)?;

            let mut shell = User::shell(user.id);
            let result = get(&h.ctx, &mut shell).await;
            assert_not_found(&result, &user.key());
            prop_assert_eq!(&shell, &User::shell(user.id));

            assert_cache_miss(&h.cache.get(&user.key().encode()).await);
            Ok::<(), TestCaseError>(())
        })?;
    }

    /// **Property 3: Cache authority on hit**
    #[test]
    fn prop_cache_hit_never_touches_store(user in arb_user()) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let h = in_memory();
            let mut written = user.clone();
            let key = check(put(&h.ctx, &mut written).await)?;

            let cached = h
                .cache
                .peek(&key.encode())
                .ok_or_else(|| TestCaseError::fail("entity not cached after put"))?;
            let cached: User = check(decode_entity(&cached).map_err(Into::into))?;
            prop_assert_eq!(&cached, &user);

            // Remove from the store directly, bypassing eviction.
            check(h.store.delete(&key).await)?;

            let mut shell = User::shell(user.id);
            check(get(&h.ctx, &mut shell).await)?;
            prop_assert_eq!(&shell, &user);
            prop_assert_eq!(h.store.stats().gets, 0);
            Ok::<(), TestCaseError>(())
        })?;
    }

    /// **Property 4: Miss repopulation**
    #[test]
    fn prop_miss_repopulates_cache(user in arb_user()) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let h = in_memory();
            let mut written = user.clone();
            let key = check(Store::new().put(&h.ctx, &mut written).await)?;
            prop_assert!(!h.cache.contains(&key.encode()));

            let mut shell = User::shell(user.id);
            check(get(&h.ctx, &mut shell).await)?;
            prop_assert_eq!(&shell, &user);
            prop_assert_eq!(h.store.stats().gets, 1);

            let cached = h
                .cache
                .peek(&key.encode())
                .ok_or_else(|| TestCaseError::fail("cache not repopulated"))?;
            let cached: User = check(decode_entity(&cached).map_err(Into::into))?;
            prop_assert_eq!(&cached, &user);
            Ok::<(), TestCaseError>(())
        })?;
    }
}

// ============================================================================
// EXISTS
// ============================================================================

#[tokio::test]
async fn test_exists_reports_presence() {
    let h = faulty();
    let mut user = test_user("ada", 36);

    assert!(!exists(&h.ctx, &user).await.unwrap());
    put(&h.ctx, &mut user).await.unwrap();
    assert!(exists(&h.ctx, &user).await.unwrap());
}

#[tokio::test]
async fn test_exists_propagates_store_failure() {
    let h = faulty();
    let mut user = test_user("ada", 36);
    put(&h.ctx, &mut user).await.unwrap();

    h.store.fail_gets(true);
    assert_store_failure(&exists(&h.ctx, &user).await);
}

#[tokio::test]
async fn test_exists_ignores_cache() {
    let h = in_memory();
    let user = test_user("cached-only", 1);
    put_cache(&h.ctx, &user).await.unwrap();

    assert!(!exists(&h.ctx, &user).await.unwrap());
}

#[tokio::test]
async fn test_exists_does_not_run_after_get() {
    let h = in_memory();
    let mut doc = test_document(4, "present");
    doc.fail_after_get = true;
    Store::new().put(&h.ctx, &mut doc).await.unwrap();

    assert!(exists(&h.ctx, &doc).await.unwrap());
}

// ============================================================================
// PUT
// ============================================================================

#[tokio::test]
async fn test_before_put_rejection_writes_nothing() {
    let h = in_memory();
    let mut doc = test_document(1, "  ");

    assert_hook_error(&put(&h.ctx, &mut doc).await);
    assert!(h.store.is_empty());
    assert!(h.cache.is_empty());
}

#[tokio::test]
async fn test_after_put_failure_reports_persisted_key() {
    let h = in_memory();
    let mut doc = test_document(7, "draft");
    doc.fail_after_put = true;

    let result = put(&h.ctx, &mut doc).await;

    assert_persisted(&result, &doc.key());
    assert!(h.store.contains(&doc.key()));
    assert_eq!(doc.put_key, Some(doc.key()));
    // The cache step comes after the hook and is not reached.
    assert!(h.cache.is_empty());
}

#[tokio::test]
async fn test_cache_write_failure_on_put_reports_persisted_key() {
    let h = faulty();
    h.cache.fail_writes(true);
    let mut user = test_user("ada", 36);

    let result = put(&h.ctx, &mut user).await;

    assert_persisted(&result, &user.key());
    assert!(h.store.inner().contains(&user.key()));
}

#[tokio::test]
async fn test_store_put_failure_caches_nothing() {
    let h = faulty();
    h.store.fail_puts(true);
    let mut user = test_user("ada", 36);

    assert_store_failure(&put(&h.ctx, &mut user).await);
    assert!(h.cache.inner().is_empty());
}

#[tokio::test]
async fn test_put_stamps_and_roundtrips_hooks() {
    let h = in_memory();
    let mut doc = test_document(3, "notes");
    Store::new().put(&h.ctx, &mut doc).await.unwrap();
    assert!(doc.created_at.is_some());

    let mut shell = test_document(3, "");
    Store::new().get(&h.ctx, &mut shell).await.unwrap();

    assert_eq!(shell.title, "notes");
    assert_eq!(shell.created_at, doc.created_at);
    assert!(!shell.loaded);

    // Only a cache miss runs after_get.
    let mut shell = test_document(3, "");
    get(&h.ctx, &mut shell).await.unwrap();
    assert_eq!(shell.created_at, doc.created_at);
    assert!(shell.loaded);
}

// ============================================================================
// GET
// ============================================================================

#[tokio::test]
async fn test_cache_hit_skips_after_get() {
    let h = in_memory();
    let mut doc = test_document(3, "notes");
    put(&h.ctx, &mut doc).await.unwrap();

    let mut shell = test_document(3, "");
    get(&h.ctx, &mut shell).await.unwrap();

    assert_eq!(shell.title, "notes");
    assert!(!shell.loaded);
}

#[tokio::test]
async fn test_cache_hit_survives_store_outage() {
    let h = faulty();
    let mut user = test_user("ada", 36);
    put(&h.ctx, &mut user).await.unwrap();
    h.store.fail_gets(true);

    let mut shell = User::shell(user.id);
    get(&h.ctx, &mut shell).await.unwrap();
    assert_eq!(shell, user);

    let mut shell = User::shell(user.id);
    assert_store_failure(&Store::new().get(&h.ctx, &mut shell).await);
    assert_eq!(shell, User::shell(user.id));
}

#[tokio::test]
async fn test_cache_read_failure_falls_back_without_refill() {
    let h = faulty();
    let mut doc = test_document(5, "fallback");
    Store::new().put(&h.ctx, &mut doc).await.unwrap();
    h.cache.fail_reads(true);

    let mut shell = test_document(5, "");
    get(&h.ctx, &mut shell).await.unwrap();

    assert_eq!(shell.title, "fallback");
    assert!(!shell.loaded);
    assert!(!h.cache.inner().contains(&doc.key().encode()));
    assert!(matches!(
        h.diagnostics.recorded().as_slice(),
        [Diagnostic::CacheReadFailed { .. }]
    ));
}

#[tokio::test]
async fn test_cache_fill_failure_is_reported() {
    let h = faulty();
    let mut user = test_user("ada", 36);
    Store::new().put(&h.ctx, &mut user).await.unwrap();
    h.cache.fail_writes(true);

    let mut shell = User::shell(user.id);
    get(&h.ctx, &mut shell).await.unwrap();

    assert_eq!(shell, user);
    match h.diagnostics.recorded().as_slice() {
        [Diagnostic::CacheFillFailed { cache_key, .. }] => {
            assert_eq!(cache_key, &user.key().encode())
        }
        other => panic!("unexpected diagnostics: {:?}", other),
    }
}

#[tokio::test]
async fn test_after_get_failure_propagates_and_is_not_cached() {
    let h = in_memory();
    let mut doc = test_document(9, "broken");
    doc.fail_after_get = true;
    Store::new().put(&h.ctx, &mut doc).await.unwrap();

    let mut shell = test_document(9, "");
    assert_hook_error(&get(&h.ctx, &mut shell).await);
    assert_eq!(shell.title, "");
    assert!(!h.cache.contains(&doc.key().encode()));
}

#[tokio::test]
async fn test_uncached_get_ignores_failing_after_get() {
    let h = in_memory();
    let mut doc = test_document(9, "broken");
    doc.fail_after_get = true;
    Store::new().put(&h.ctx, &mut doc).await.unwrap();

    let mut shell = test_document(9, "");
    Store::new().get(&h.ctx, &mut shell).await.unwrap();

    assert_eq!(shell.title, "broken");
    assert!(!shell.loaded);
    assert!(h.cache.is_empty());
}

#[tokio::test]
async fn test_get_by_key_fills_shell() {
    let h = in_memory();
    let mut user = test_user("ada", 36);
    let key = Store::new().put(&h.ctx, &mut user).await.unwrap();

    let mut shell = User::default();
    cairn_storage::get_by_key(&h.ctx, &key, &mut shell).await.unwrap();
    assert_eq!(shell, user);
}

// ============================================================================
// DELETE
// ============================================================================

#[tokio::test]
async fn test_delete_with_cache_down_still_deletes() {
    let h = faulty();
    let mut user = test_user("ada", 36);
    put(&h.ctx, &mut user).await.unwrap();
    h.cache.fail_deletes(true);

    delete(&h.ctx, &user).await.unwrap();

    assert!(!h.store.inner().contains(&user.key()));
    // The stale entry stays until overwritten.
    assert!(h.cache.inner().contains(&user.key().encode()));
    assert!(matches!(
        h.diagnostics.recorded().as_slice(),
        [Diagnostic::CacheEvictFailed { .. }]
    ));
}

#[tokio::test]
async fn test_store_delete_failure_leaves_cache_alone() {
    let h = faulty();
    let mut user = test_user("ada", 36);
    put(&h.ctx, &mut user).await.unwrap();
    h.store.fail_deletes(true);

    assert_store_failure(&delete(&h.ctx, &user).await);
    assert!(h.cache.inner().contains(&user.key().encode()));
}

#[tokio::test]
async fn test_delete_of_absent_entity_succeeds() {
    let h = in_memory();
    delete(&h.ctx, &test_user("ghost", 0)).await.unwrap();
    assert!(h.diagnostics.is_empty());
}

// ============================================================================
// EXPLICIT CACHE OPERATIONS
// ============================================================================

#[tokio::test]
async fn test_explicit_cache_operations() {
    let h = in_memory();
    let user = test_user("ada", 36);

    put_cache(&h.ctx, &user).await.unwrap();
    assert!(h.store.is_empty());

    let mut shell = User::shell(user.id);
    get_cache(&h.ctx, &mut shell).await.unwrap();
    assert_eq!(shell, user);

    delete_cache(&h.ctx, &user).await.unwrap();
    let mut shell = User::shell(user.id);
    assert_cache_miss(&get_cache(&h.ctx, &mut shell).await);
    assert_eq!(shell, User::shell(user.id));
}

#[tokio::test]
async fn test_put_cache_failure_propagates() {
    let h = faulty();
    h.cache.fail_writes(true);
    let user = test_user("ada", 36);

    let result = Store::new().put_cache(&h.ctx, &user).await;
    assert!(matches!(result, Err(cairn_core::CairnError::Cache(_))));
}

// ============================================================================
// COLLABORATORS
// ============================================================================

#[tokio::test]
async fn test_caller_deadline_wraps_operation() {
    let h = in_memory();
    let mut user = test_user("ada", 36);

    let key = tokio::time::timeout(Duration::from_secs(5), put(&h.ctx, &mut user))
        .await
        .expect("put finished before the deadline")
        .unwrap();
    assert_eq!(key, user.key());
}

#[tokio::test]
async fn test_lmdb_cache_backs_cache_aside() {
    let dir = tempfile::TempDir::new().unwrap();
    let cache = LmdbCache::open(&LmdbCacheConfig::new(dir.path()).with_max_size_mb(10)).unwrap();
    let store = Arc::new(InMemoryDocumentStore::new());
    let ctx = StoreContext::new(Arc::clone(&store), Arc::new(cache));

    let mut user = test_user("ada", 36);
    put(&ctx, &mut user).await.unwrap();

    let mut shell = User::shell(user.id);
    get(&ctx, &mut shell).await.unwrap();
    assert_eq!(shell, user);
    assert_eq!(store.stats().gets, 0);
    assert_eq!(ctx.cache().stats().hits, 1);
}

#[tokio::test]
async fn test_lmdb_cache_handles_long_keys() {
    let dir = tempfile::TempDir::new().unwrap();
    let cache = LmdbCache::open(&LmdbCacheConfig::new(dir.path()).with_max_size_mb(10)).unwrap();
    let store = Arc::new(InMemoryDocumentStore::new());
    let ctx = StoreContext::new(Arc::clone(&store), Arc::new(cache));

    let mut item = LineItem {
        order: "o".repeat(1024),
        line: 1,
        sku: "sku-1".to_string(),
        quantity: 2,
    };
    assert!(item.key().encode().len() > 511);
    put(&ctx, &mut item).await.unwrap();

    let mut shell = LineItem {
        order: item.order.clone(),
        line: 1,
        ..Default::default()
    };
    get(&ctx, &mut shell).await.unwrap();
    assert_eq!(shell, item);
    assert_eq!(store.stats().gets, 0);

    delete(&ctx, &item).await.unwrap();
    assert!(ctx.cache().get(&item.key().encode()).await.unwrap_err().is_cache_miss());
}
