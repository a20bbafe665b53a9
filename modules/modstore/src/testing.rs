//! Test helpers. Enabled by the `test-utils` feature.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;

use crate::context::ErrorContext;
use crate::error::Phase;
use crate::namespace::Namespace;
use crate::state::StateValue;

/// What an error handler saw, minus the non-cloneable parts.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorRecord {
    pub phase: Phase,
    pub action: String,
    pub namespace: Namespace,
    pub message: String,
    pub value: Value,
    pub context: Value,
}

/// Error handler that records every call. Clones share the record list.
#[derive(Debug, Clone, Default)]
pub struct RecordingErrorHandler {
    records: Arc<Mutex<Vec<ErrorRecord>>>,
}

impl RecordingErrorHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handler to pass to `add_error_handler` or `Module::error_handler`.
    pub fn handler<S: StateValue>(&self) -> impl Fn(ErrorContext<S>) + Send + Sync + 'static {
        let records = Arc::clone(&self.records);
        move |ctx: ErrorContext<S>| {
            records
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(ErrorRecord {
                    phase: ctx.phase,
                    action: ctx.action,
                    namespace: ctx.namespace,
                    message: ctx.error.to_string(),
                    value: ctx.value,
                    context: ctx.context,
                });
        }
    }

    pub fn records(&self) -> Vec<ErrorRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shared counter for asserting how often a handler ran.
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}
