//! The collaborators an operation runs against.

use std::sync::Arc;

use cairn_core::{DiagnosticSink, TracingDiagnostics};

use crate::traits::{CacheService, DocumentStore};

/// Bundles the document store, the cache service and the diagnostic sink.
///
/// Every operation borrows a context; nothing in it is mutated by Cairn.
/// Cloning is cheap and shares the collaborators.
pub struct StoreContext<S, C>
where
    S: DocumentStore,
    C: CacheService,
{
    store: Arc<S>,
    cache: Arc<C>,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl<S, C> StoreContext<S, C>
where
    S: DocumentStore,
    C: CacheService,
{
    /// Create a context that reports suppressed failures through `tracing`.
    pub fn new(store: Arc<S>, cache: Arc<C>) -> Self {
        Self {
            store,
            cache,
            diagnostics: Arc::new(TracingDiagnostics),
        }
    }

    /// Replace the diagnostic sink.
    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn diagnostics(&self) -> &dyn DiagnosticSink {
        self.diagnostics.as_ref()
    }
}

impl<S, C> Clone for StoreContext<S, C>
where
    S: DocumentStore,
    C: CacheService,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cache: Arc::clone(&self.cache),
            diagnostics: Arc::clone(&self.diagnostics),
        }
    }
}
