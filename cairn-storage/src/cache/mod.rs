//! Cache-aside primitives and cache service backends.
//!
//! The primitives ([`put_cache`], [`get_cache`], [`delete_cache`]) serialize
//! entities in and out of whatever [`CacheService`](crate::CacheService) the
//! context carries. Two backends ship with the crate:
//!
//! - [`InMemoryCache`] for tests and single-process use
//! - [`LmdbCache`] for a persistent local cache

pub mod lmdb_backend;
pub mod memory;
mod primitives;

pub use lmdb_backend::{LmdbCache, LmdbCacheError};
pub use memory::InMemoryCache;
pub use primitives::{delete_cache, get_cache, put_cache};

pub(crate) use primitives::{read_cached, write_cached};
