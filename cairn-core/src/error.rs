//! Error types for Cairn operations

use crate::Key;
use thiserror::Error;

/// Document store errors. These are authoritative and always reach the caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("No such entity: {key}")]
    NotFound { key: Key },

    #[error("Document store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Write failed for {key}: {reason}")]
    WriteFailed { key: Key, reason: String },

    #[error("Index scan failed: {reason}")]
    ScanFailed { reason: String },

    #[error("Invalid cursor: {reason}")]
    InvalidCursor { reason: String },

    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Cache service errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache miss for {cache_key}")]
    Miss { cache_key: String },

    #[error("Cache unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Cache backend error: {reason}")]
    Backend { reason: String },
}

/// Errors raised by entity lifecycle hooks.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HookError {
    #[error("before_put rejected the entity: {reason}")]
    BeforePut { reason: String },

    #[error("after_put failed: {reason}")]
    AfterPut { reason: String },

    #[error("after_get failed: {reason}")]
    AfterGet { reason: String },
}

impl HookError {
    pub fn before_put(reason: impl Into<String>) -> Self {
        Self::BeforePut {
            reason: reason.into(),
        }
    }

    pub fn after_put(reason: impl Into<String>) -> Self {
        Self::AfterPut {
            reason: reason.into(),
        }
    }

    pub fn after_get(reason: impl Into<String>) -> Self {
        Self::AfterGet {
            reason: reason.into(),
        }
    }
}

/// Serialization and decoding errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("Failed to serialize entity: {reason}")]
    Serialize { reason: String },

    #[error("Failed to deserialize entity: {reason}")]
    Deserialize { reason: String },

    #[error("Invalid encoded key: {reason}")]
    InvalidKey { reason: String },

    #[error("Invalid encoded cursor: {reason}")]
    InvalidCursor { reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to parse configuration: {reason}")]
    Parse { reason: String },
}

/// Master error type for all Cairn errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CairnError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Hook error: {0}")]
    Hook(#[from] HookError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// The entity was written to the store under `key`, but a later step failed.
    ///
    /// The store write is not rolled back.
    #[error("Persisted as {key}, then failed: {source}")]
    Persisted {
        key: Key,
        #[source]
        source: Box<CairnError>,
    },
}

impl CairnError {
    /// Wrap `source` as a failure that happened after `key` was persisted.
    pub fn persisted(key: Key, source: impl Into<CairnError>) -> Self {
        Self::Persisted {
            key,
            source: Box::new(source.into()),
        }
    }

    /// Returns true if this is the store's "no such entity" outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CairnError::Store(StoreError::NotFound { .. }))
    }

    /// Returns true if this is the cache's "miss" outcome.
    pub fn is_cache_miss(&self) -> bool {
        matches!(self, CairnError::Cache(CacheError::Miss { .. }))
    }

    /// The key of an entity that was persisted before the failure, if any.
    pub fn persisted_key(&self) -> Option<&Key> {
        match self {
            CairnError::Persisted { key, .. } => Some(key),
            _ => None,
        }
    }
}

/// Result type alias for Cairn operations.
pub type CairnResult<T> = Result<T, CairnError>;

// =============================================================================
// TESTS
// =============================================================================
