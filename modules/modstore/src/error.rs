//! Typed errors for dispatch and service lookup.

use std::any::Any;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stage of a dispatch in which a handler failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Transform,
    Watch,
    Async,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Transform => "transform",
            Phase::Watch => "watch",
            Phase::Async => "async",
        };
        f.write_str(name)
    }
}

/// Errors surfaced by the store itself.
///
/// Failures raised by user handlers travel as `anyhow::Error` inside an
/// [`ErrorContext`](crate::ErrorContext) and are never returned from
/// `dispatch`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Dispatch was called without an action key
    #[error("the action must be provided for dispatch")]
    InvalidDispatch,

    /// Neither the namespaced nor the root service key is registered
    #[error("the service for {key} could not be found")]
    ServiceNotFound { key: String },

    /// The service exists but is not of the requested type
    #[error("the service for {key} is not of the requested type")]
    ServiceTypeMismatch { key: String },

    /// A nested dispatch was queued after its parent dispatch had settled
    #[error("cannot queue {action}: the dispatch that owns this dispatcher has settled")]
    DispatcherClosed { action: String },

    /// A handler panicked; the panic was caught and recovered
    #[error("{phase} handler panicked: {message}")]
    HandlerPanicked { phase: Phase, message: String },
}

impl StoreError {
    pub(crate) fn from_panic(phase: Phase, payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        StoreError::HandlerPanicked { phase, message }
    }
}

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
