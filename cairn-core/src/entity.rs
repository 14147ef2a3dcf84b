//! The entity contract and its serialization codec.

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{CodecError, HookError};
use crate::Key;

/// Anything Cairn can persist.
///
/// # Implementation Requirements
///
/// - `key()` must be pure: calling it twice on an unmodified entity returns
///   an identical key. It is typically built from an identifying field and a
///   fixed kind tag.
/// - The serialized form must round-trip through JSON.
///
/// # Lifecycle hooks
///
/// The three hooks default to no-ops. An entity opts into a hook by
/// overriding it:
///
/// - [`Entity::before_put`] runs before anything is written and may mutate
///   the entity. An error aborts the put.
/// - [`Entity::after_put`] runs after the store write succeeded. An error is
///   surfaced to the caller but the write stands.
/// - [`Entity::after_get`] runs when a cache miss is filled from the store,
///   before the value is cached or returned. Cache hits, uncached reads, the
///   fallback after a cache error and `exists` do not run it.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync {
    /// Derive the durable-store key for this entity.
    fn key(&self) -> Key;

    fn before_put(&mut self) -> Result<(), HookError> {
        Ok(())
    }

    fn after_put(&mut self, _key: &Key) -> Result<(), HookError> {
        Ok(())
    }

    fn after_get(&mut self, _key: &Key) -> Result<(), HookError> {
        Ok(())
    }
}

/// Serialize an entity for the store or the cache.
pub fn encode_entity<T: Serialize + ?Sized>(entity: &T) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(entity).map_err(|e| CodecError::Serialize {
        reason: e.to_string(),
    })
}

/// Deserialize an entity previously produced by [`encode_entity`].
pub fn decode_entity<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    serde_json::from_slice(bytes).map_err(|e| CodecError::Deserialize {
        reason: e.to_string(),
    })
}
