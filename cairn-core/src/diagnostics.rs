//! Injectable sink for non-fatal failures.
//!
//! Cache trouble on the read path, a failed cache eviction after a delete, or
//! an entity that could not be hydrated during a query never fail the calling
//! operation. They are reported here instead, so callers can observe them
//! without depending on them.

use std::sync::{Arc, Mutex};

use crate::{CairnError, Key};

/// A suppressed, non-fatal failure.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// A cache read failed for a reason other than a miss; the store was read instead.
    CacheReadFailed { cache_key: String, error: CairnError },
    /// Writing a store-sourced value back into the cache failed.
    CacheFillFailed { cache_key: String, error: CairnError },
    /// Evicting a deleted entity from the cache failed.
    CacheEvictFailed { cache_key: String, error: CairnError },
    /// A query hit could not be hydrated and was left out of the results.
    ItemSkipped { key: Key, error: CairnError },
}

impl Diagnostic {
    /// The error carried by this diagnostic.
    pub fn error(&self) -> &CairnError {
        match self {
            Diagnostic::CacheReadFailed { error, .. }
            | Diagnostic::CacheFillFailed { error, .. }
            | Diagnostic::CacheEvictFailed { error, .. }
            | Diagnostic::ItemSkipped { error, .. } => error,
        }
    }
}

/// Receiver for [`Diagnostic`]s.
pub trait DiagnosticSink: Send + Sync {
    fn record(&self, diagnostic: Diagnostic);
}

/// Default sink: emits each diagnostic as a `tracing` warning.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl DiagnosticSink for TracingDiagnostics {
    fn record(&self, diagnostic: Diagnostic) {
        match &diagnostic {
            Diagnostic::CacheReadFailed { cache_key, error } => {
                tracing::warn!(%cache_key, %error, "Cache read failed, falling back to store");
            }
            Diagnostic::CacheFillFailed { cache_key, error } => {
                tracing::warn!(%cache_key, %error, "Unable to put into cache");
            }
            Diagnostic::CacheEvictFailed { cache_key, error } => {
                tracing::warn!(%cache_key, %error, "Unable to evict deleted entity from cache");
            }
            Diagnostic::ItemSkipped { key, error } => {
                tracing::warn!(%key, %error, "Skipping query result that failed to load");
            }
        }
    }
}

/// Sink that keeps every diagnostic in memory.
///
/// Cloning shares the underlying buffer.
#[derive(Debug, Clone, Default)]
pub struct RecordingDiagnostics {
    recorded: Arc<Mutex<Vec<Diagnostic>>>,
}

impl RecordingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn recorded(&self) -> Vec<Diagnostic> {
        match self.recorded.lock() {
            Ok(recorded) => recorded.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.recorded().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        match self.recorded.lock() {
            Ok(mut recorded) => recorded.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

impl DiagnosticSink for RecordingDiagnostics {
    fn record(&self, diagnostic: Diagnostic) {
        tracing::debug!(?diagnostic, "Recording diagnostic");
        match self.recorded.lock() {
            Ok(mut recorded) => recorded.push(diagnostic),
            Err(poisoned) => poisoned.into_inner().push(diagnostic),
        }
    }
}
