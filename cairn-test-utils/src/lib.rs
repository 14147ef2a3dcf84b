//! Cairn Test Utilities
//!
//! Shared test infrastructure for the Cairn workspace:
//! - Fixture entities, with and without lifecycle hooks
//! - Proptest generators for keys and fixture entities
//! - Fault-injecting wrappers around the store and cache collaborators
//! - A store wrapper that records the queries it runs
//! - Custom assertions for Cairn error variants

pub use cairn_core::{
    CacheError, CairnError, CairnResult, Cursor, Diagnostic, Entity, HookError, IndexQuery, Key,
    KeyId, RecordingDiagnostics, StoreError,
};
pub use cairn_storage::{
    CacheService, DocumentStore, InMemoryCache, InMemoryDocumentStore, KeyScan, StoreContext,
};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// FIXTURE ENTITIES
// ============================================================================

/// Plain entity with no hooks, keyed by a UUID name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub age: i64,
}

impl Entity for User {
    fn key(&self) -> Key {
        Key::named("User", self.id.to_string())
    }
}

impl User {
    /// A shell carrying only the identifying field.
    pub fn shell(id: Uuid) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }
}

/// Entity that overrides every lifecycle hook.
///
/// - `before_put` rejects an empty title and stamps `created_at` once
/// - `after_put` remembers the key it was stored under
/// - `after_get` marks the value as filled from the store on a cache miss
///
/// `put_key` and `loaded` are not serialized, so a value read back from the
/// cache never has `loaded` set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub title: String,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub fail_after_put: bool,
    #[serde(default)]
    pub fail_after_get: bool,
    #[serde(skip)]
    pub put_key: Option<Key>,
    #[serde(skip)]
    pub loaded: bool,
}

impl Entity for Document {
    fn key(&self) -> Key {
        Key::int("Document", self.id)
    }

    fn before_put(&mut self) -> Result<(), HookError> {
        if self.title.trim().is_empty() {
            return Err(HookError::before_put("title must not be empty"));
        }
        if self.created_at.is_none() {
            self.created_at = Some(Utc::now());
        }
        Ok(())
    }

    fn after_put(&mut self, key: &Key) -> Result<(), HookError> {
        self.put_key = Some(key.clone());
        if self.fail_after_put {
            return Err(HookError::after_put("after_put refused"));
        }
        Ok(())
    }

    fn after_get(&mut self, _key: &Key) -> Result<(), HookError> {
        if self.fail_after_get {
            return Err(HookError::after_get("after_get refused"));
        }
        self.loaded = true;
        Ok(())
    }
}

/// Entity whose key has a parent, for ancestor queries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub order: String,
    pub line: i64,
    pub sku: String,
    pub quantity: i64,
}

impl Entity for LineItem {
    fn key(&self) -> Key {
        Key::int("LineItem", self.line).with_parent(Key::named("Order", self.order.clone()))
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for keys and fixture entities.

    use super::*;
    use proptest::prelude::*;

    /// Generate a random UUID.
    pub fn arb_uuid() -> impl Strategy<Value = Uuid> {
        any::<[u8; 16]>().prop_map(Uuid::from_bytes)
    }

    pub fn arb_key_id() -> impl Strategy<Value = KeyId> {
        prop_oneof![
            any::<i64>().prop_map(KeyId::Int),
            "[a-zA-Z0-9/,:_ -]{0,16}".prop_map(KeyId::Name),
        ]
    }

    /// Generate a key with up to two ancestors.
    pub fn arb_key() -> impl Strategy<Value = Key> {
        let leaf = ("[A-Z][a-zA-Z]{0,8}", arb_key_id()).prop_map(|(kind, id)| Key::new(kind, id));
        leaf.prop_recursive(2, 3, 1, |parent| {
            (parent, "[A-Z][a-zA-Z]{0,8}", arb_key_id())
                .prop_map(|(parent, kind, id)| Key::new(kind, id).with_parent(parent))
        })
    }

    pub fn arb_user() -> impl Strategy<Value = User> {
        (arb_uuid(), "[a-z]{1,12}", 0i64..120).prop_map(|(id, name, age)| User { id, name, age })
    }

    /// Generate users with pairwise distinct ids.
    pub fn arb_users(max: usize) -> impl Strategy<Value = Vec<User>> {
        proptest::collection::vec(("[a-z]{1,12}", 0i64..120), 0..=max).prop_map(|rows| {
            rows.into_iter()
                .enumerate()
                .map(|(i, (name, age))| User {
                    id: Uuid::from_u128(i as u128 + 1),
                    name,
                    age,
                })
                .collect()
        })
    }

    /// Generate a document that passes `before_put`.
    pub fn arb_document() -> impl Strategy<Value = Document> {
        (any::<i64>(), "[a-z][a-z ]{0,20}").prop_map(|(id, title)| Document {
            id,
            title,
            ..Default::default()
        })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built collaborators and entities for common scenarios.

    use super::*;

    /// A user with a fresh v7 id.
    pub fn test_user(name: &str, age: i64) -> User {
        User {
            id: Uuid::now_v7(),
            name: name.to_string(),
            age,
        }
    }

    pub fn test_document(id: i64, title: &str) -> Document {
        Document {
            id,
            title: title.to_string(),
            ..Default::default()
        }
    }

    /// In-memory collaborators, shared with the returned context.
    pub struct Harness {
        pub ctx: StoreContext<InMemoryDocumentStore, InMemoryCache>,
        pub store: Arc<InMemoryDocumentStore>,
        pub cache: Arc<InMemoryCache>,
        pub diagnostics: RecordingDiagnostics,
    }

    pub fn in_memory() -> Harness {
        let store = Arc::new(InMemoryDocumentStore::new());
        let cache = Arc::new(InMemoryCache::new());
        let diagnostics = RecordingDiagnostics::new();
        let ctx = StoreContext::new(Arc::clone(&store), Arc::clone(&cache))
            .with_diagnostics(Arc::new(diagnostics.clone()));
        Harness {
            ctx,
            store,
            cache,
            diagnostics,
        }
    }

    /// Fault-injecting collaborators over in-memory backends.
    pub struct FaultyHarness {
        pub ctx: StoreContext<FailingStore, FlakyCache>,
        pub store: Arc<FailingStore>,
        pub cache: Arc<FlakyCache>,
        pub diagnostics: RecordingDiagnostics,
    }

    pub fn faulty() -> FaultyHarness {
        let store = Arc::new(FailingStore::new(InMemoryDocumentStore::new()));
        let cache = Arc::new(FlakyCache::new(InMemoryCache::new()));
        let diagnostics = RecordingDiagnostics::new();
        let ctx = StoreContext::new(Arc::clone(&store), Arc::clone(&cache))
            .with_diagnostics(Arc::new(diagnostics.clone()));
        FaultyHarness {
            ctx,
            store,
            cache,
            diagnostics,
        }
    }
}

// ============================================================================
// FAULT INJECTION
// ============================================================================

/// Document store wrapper whose operations can be made to fail.
///
/// Injected failures are `StoreError::Unavailable` (or `ScanFailed` for
/// scans), never `NotFound`.
pub struct FailingStore<S = InMemoryDocumentStore> {
    inner: S,
    fail_puts: AtomicBool,
    fail_gets: AtomicBool,
    fail_deletes: AtomicBool,
    fail_scans: AtomicBool,
}

impl<S: DocumentStore> FailingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fail_puts: AtomicBool::new(false),
            fail_gets: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
            fail_scans: AtomicBool::new(false),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn fail_puts(&self, on: bool) {
        self.fail_puts.store(on, Ordering::SeqCst);
    }

    pub fn fail_gets(&self, on: bool) {
        self.fail_gets.store(on, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, on: bool) {
        self.fail_deletes.store(on, Ordering::SeqCst);
    }

    pub fn fail_scans(&self, on: bool) {
        self.fail_scans.store(on, Ordering::SeqCst);
    }
}

fn unavailable(op: &str) -> CairnError {
    StoreError::Unavailable {
        reason: format!("injected {} failure", op),
    }
    .into()
}

#[async_trait]
impl<S: DocumentStore> DocumentStore for FailingStore<S> {
    type Scan = S::Scan;

    async fn put(&self, key: &Key, document: Vec<u8>) -> CairnResult<Key> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(unavailable("put"));
        }
        self.inner.put(key, document).await
    }

    async fn get(&self, key: &Key) -> CairnResult<Vec<u8>> {
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(unavailable("get"));
        }
        self.inner.get(key).await
    }

    async fn delete(&self, key: &Key) -> CairnResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(unavailable("delete"));
        }
        self.inner.delete(key).await
    }

    async fn run(&self, query: &IndexQuery) -> CairnResult<Self::Scan> {
        if self.fail_scans.load(Ordering::SeqCst) {
            return Err(StoreError::ScanFailed {
                reason: "injected scan failure".to_string(),
            }
            .into());
        }
        self.inner.run(query).await
    }
}

/// Document store wrapper that records every query it is asked to run.
pub struct RecordingStore<S = InMemoryDocumentStore> {
    inner: S,
    queries: Mutex<Vec<IndexQuery>>,
}

impl<S: DocumentStore> RecordingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Queries passed to `run`, oldest first.
    pub fn queries(&self) -> Vec<IndexQuery> {
        self.queries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl<S: DocumentStore> DocumentStore for RecordingStore<S> {
    type Scan = S::Scan;

    async fn put(&self, key: &Key, document: Vec<u8>) -> CairnResult<Key> {
        self.inner.put(key, document).await
    }

    async fn get(&self, key: &Key) -> CairnResult<Vec<u8>> {
        self.inner.get(key).await
    }

    async fn delete(&self, key: &Key) -> CairnResult<()> {
        self.inner.delete(key).await
    }

    async fn run(&self, query: &IndexQuery) -> CairnResult<Self::Scan> {
        self.queries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(query.clone());
        self.inner.run(query).await
    }
}

/// Cache wrapper whose operations can be made to fail with `CacheError::Unavailable`.
pub struct FlakyCache<C = InMemoryCache> {
    inner: C,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_deletes: AtomicBool,
}

impl<C: CacheService> FlakyCache<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn fail_reads(&self, on: bool) {
        self.fail_reads.store(on, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, on: bool) {
        self.fail_deletes.store(on, Ordering::SeqCst);
    }

    /// Fail every operation.
    pub fn go_down(&self) {
        self.fail_reads(true);
        self.fail_writes(true);
        self.fail_deletes(true);
    }
}

fn cache_down(op: &str) -> CairnError {
    CacheError::Unavailable {
        reason: format!("injected {} failure", op),
    }
    .into()
}

#[async_trait]
impl<C: CacheService> CacheService for FlakyCache<C> {
    async fn set(&self, cache_key: &str, value: Vec<u8>) -> CairnResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(cache_down("set"));
        }
        self.inner.set(cache_key, value).await
    }

    async fn get(&self, cache_key: &str) -> CairnResult<Vec<u8>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(cache_down("get"));
        }
        self.inner.get(cache_key).await
    }

    async fn delete(&self, cache_key: &str) -> CairnResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(cache_down("delete"));
        }
        self.inner.delete(cache_key).await
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertion helpers for Cairn error variants.

    use super::*;

    /// Assert that a CairnResult is Ok.
    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &CairnResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    /// Assert that a CairnResult is the store's NotFound for `key`.
    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &CairnResult<T>, key: &Key) {
        match result {
            Err(CairnError::Store(StoreError::NotFound { key: k })) => {
                assert_eq!(k, key, "Wrong key in NotFound error");
            }
            other => panic!("Expected NotFound for {}, got: {:?}", key, other),
        }
    }

    #[track_caller]
    pub fn assert_cache_miss<T: std::fmt::Debug>(result: &CairnResult<T>) {
        match result {
            Err(CairnError::Cache(CacheError::Miss { .. })) => {}
            other => panic!("Expected cache miss, got: {:?}", other),
        }
    }

    /// Assert that a CairnResult is a store error other than NotFound.
    #[track_caller]
    pub fn assert_store_failure<T: std::fmt::Debug>(result: &CairnResult<T>) {
        match result {
            Err(CairnError::Store(StoreError::NotFound { .. })) => {
                panic!("Expected a store failure, got NotFound")
            }
            Err(CairnError::Store(_)) => {}
            other => panic!("Expected Store error, got: {:?}", other),
        }
    }

    /// Assert a partial success: the entity was written under `key`, then a
    /// later step failed.
    #[track_caller]
    pub fn assert_persisted<T: std::fmt::Debug>(result: &CairnResult<T>, key: &Key) {
        match result {
            Err(err @ CairnError::Persisted { .. }) => {
                assert_eq!(err.persisted_key(), Some(key), "Wrong persisted key");
            }
            other => panic!("Expected Persisted error for {}, got: {:?}", key, other),
        }
    }

    #[track_caller]
    pub fn assert_hook_error<T: std::fmt::Debug>(result: &CairnResult<T>) {
        match result {
            Err(CairnError::Hook(_)) => {}
            other => panic!("Expected Hook error, got: {:?}", other),
        }
    }
}
