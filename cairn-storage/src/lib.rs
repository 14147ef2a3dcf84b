//! Cairn Storage - Cache-Aside Persistence
//!
//! Coordinates a durable [`DocumentStore`] and a fast [`CacheService`] for
//! [`Entity`](cairn_core::Entity) values:
//!
//! - writes go to the store, then (optionally) to the cache
//! - reads try the cache first and fall back to the store, refilling the cache
//! - deletes remove from the store, then evict from the cache
//! - queries run keys-only against the store index and hydrate each key
//!   through the read path
//!
//! The store is authoritative. Cache trouble on reads and evictions never
//! fails an operation; it is reported through the context's
//! [`DiagnosticSink`](cairn_core::DiagnosticSink).
//!
//! ```ignore
//! let ctx = StoreContext::new(Arc::new(InMemoryDocumentStore::new()), Arc::new(InMemoryCache::new()));
//! let key = cairn_storage::put(&ctx, &mut user).await?;
//!
//! let mut shell = User { id: user.id, ..Default::default() };
//! cairn_storage::get(&ctx, &mut shell).await?;
//! ```

pub mod cache;
pub mod context;
pub mod memory;
mod ops;
mod query;
pub mod store;
pub mod traits;

pub use cache::{
    delete_cache, get_cache, put_cache, InMemoryCache, LmdbCache, LmdbCacheError,
};
pub use context::StoreContext;
pub use memory::{InMemoryDocumentStore, MemoryScan, StoreStats};
pub use store::{delete, exists, get, get_by_key, put, query_pointers, query_values, Store};
pub use traits::{CacheService, CacheStats, DocumentStore, KeyScan};
