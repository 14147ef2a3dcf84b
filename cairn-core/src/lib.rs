//! Cairn Core - Keys, Entities and Errors
//!
//! Pure types shared by every Cairn crate: the durable-store [`Key`] and its
//! cache-key encoding, scan [`Cursor`]s, [`IndexQuery`] descriptions, the
//! [`Entity`] contract with its lifecycle hooks, the error taxonomy, the
//! diagnostic sink and configuration. No I/O happens here.

pub mod config;
pub mod diagnostics;
pub mod entity;
pub mod error;
pub mod key;
pub mod query;

pub use config::{CairnConfig, LmdbCacheConfig, StoreConfig};
pub use diagnostics::{Diagnostic, DiagnosticSink, RecordingDiagnostics, TracingDiagnostics};
pub use entity::{decode_entity, encode_entity, Entity};
pub use error::{CacheError, CairnError, CairnResult, CodecError, ConfigError, HookError, StoreError};
pub use key::{Cursor, Key, KeyId};
pub use query::{Direction, Filter, FilterOp, IndexQuery, Order};
