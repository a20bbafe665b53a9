//! Per-dispatch context values handed to handlers.
//!
//! Each context owns cloned state. Nothing a handler does to a context is
//! visible to the store unless the engine commits it, and only the transform
//! phase is ever committed.

use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Phase, StoreError, StoreResult};
use crate::namespace::Namespace;
use crate::service::ServiceFactory;
use crate::state::{GlobalState, StateValue};
use crate::traits::{AsyncCallback, TransformCallback};

/// Passed by `&mut` to every transform resolved for a dispatch.
///
/// All transforms of one dispatch share this value, so later transforms see
/// what earlier ones wrote.
pub struct TransformContext<S> {
    /// Canonical action key, e.g. `nsA:test`.
    pub action: String,
    pub namespace: Namespace,
    /// Copy of the addressed namespace's state.
    pub state: S,
    /// Copy of the whole tree.
    pub global_state: GlobalState<S>,
    pub value: Value,
    /// Free-form data carried on to the async phase.
    pub context: Value,
    pub factory: ServiceFactory,
    pub(crate) transforms: Arc<Vec<TransformCallback<S>>>,
}

/// Passed to async handlers and middleware.
pub struct AsyncContext<S> {
    pub action: String,
    pub namespace: Namespace,
    pub state: S,
    pub global_state: GlobalState<S>,
    pub value: Value,
    /// Whatever the transform phase left in its `context`.
    pub context: Value,
    /// Merged configuration the services were built with.
    pub config: Arc<Value>,
    pub factory: ServiceFactory,
    /// Queues follow-up actions; they run after this dispatch settles.
    /// Closed once they have been taken, so it must not outlive the batch.
    pub dispatcher: Dispatcher,
    pub(crate) asyncs: Arc<Vec<AsyncCallback<S>>>,
}

/// Middleware sees the same context as the async handlers it wraps.
pub type MiddlewareContext<S> = AsyncContext<S>;

impl<S: Clone> Clone for AsyncContext<S> {
    fn clone(&self) -> Self {
        Self {
            action: self.action.clone(),
            namespace: self.namespace.clone(),
            state: self.state.clone(),
            global_state: self.global_state.clone(),
            value: self.value.clone(),
            context: self.context.clone(),
            config: Arc::clone(&self.config),
            factory: self.factory.clone(),
            dispatcher: self.dispatcher.clone(),
            asyncs: Arc::clone(&self.asyncs),
        }
    }
}

impl<S> AsyncContext<S> {
    /// Queue `action` in this dispatch's namespace.
    pub fn dispatch(&self, action: &str, value: Value) -> StoreResult<()> {
        self.dispatcher.dispatch(action, value)
    }

    /// Queue `action` exactly as written, ignoring this dispatch's namespace.
    pub fn dispatch_root(&self, action: &str, value: Value) -> StoreResult<()> {
        self.dispatcher.dispatch_root(action, value)
    }
}

/// Fresh copies of the just-committed state, one per watcher call.
#[derive(Debug, Clone)]
pub struct WatchContext<S> {
    pub namespace: Namespace,
    pub state: S,
    pub global_state: GlobalState<S>,
}

/// Everything known about a failed handler.
pub struct ErrorContext<S> {
    pub error: anyhow::Error,
    pub phase: Phase,
    pub action: String,
    pub namespace: Namespace,
    pub state: S,
    pub global_state: GlobalState<S>,
    pub value: Value,
    pub context: Value,
    pub factory: ServiceFactory,
}

impl<S: StateValue> ErrorContext<S> {
    pub(crate) fn from_transform(ctx: &TransformContext<S>, error: anyhow::Error) -> Self {
        Self {
            error,
            phase: Phase::Transform,
            action: ctx.action.clone(),
            namespace: ctx.namespace.clone(),
            state: ctx.state.clone(),
            global_state: ctx.global_state.clone(),
            value: ctx.value.clone(),
            context: ctx.context.clone(),
            factory: ctx.factory.clone(),
        }
    }

    pub(crate) fn from_async(ctx: &AsyncContext<S>, error: anyhow::Error) -> Self {
        Self {
            error,
            phase: Phase::Async,
            action: ctx.action.clone(),
            namespace: ctx.namespace.clone(),
            state: ctx.state.clone(),
            global_state: ctx.global_state.clone(),
            value: ctx.value.clone(),
            context: ctx.context.clone(),
            factory: ctx.factory.clone(),
        }
    }
}

/// A nested dispatch waiting for its parent to settle.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct QueuedDispatch {
    pub action: String,
    pub value: Value,
}

/// Queues nested dispatches for the engine to drain.
///
/// Actions are qualified with the originating namespace at queue time, so
/// `dispatch("inner:test")` from namespace `outer` becomes
/// `outer:inner:test`.
///
/// The engine drains the queue once, when the async batch settles. After
/// that the dispatcher is closed and every clone of it rejects new actions
/// with [`StoreError::DispatcherClosed`].
#[derive(Debug, Clone)]
pub struct Dispatcher {
    namespace: Namespace,
    /// `None` once drained.
    queue: Arc<Mutex<Option<Vec<QueuedDispatch>>>>,
}

impl Dispatcher {
    pub(crate) fn new(namespace: Namespace) -> Self {
        Self {
            namespace,
            queue: Arc::new(Mutex::new(Some(Vec::new()))),
        }
    }

    pub fn dispatch(&self, action: &str, value: Value) -> StoreResult<()> {
        self.enqueue(action, value, false)
    }

    pub fn dispatch_root(&self, action: &str, value: Value) -> StoreResult<()> {
        self.enqueue(action, value, true)
    }

    fn enqueue(&self, action: &str, value: Value, root: bool) -> StoreResult<()> {
        if action.is_empty() {
            return Err(StoreError::InvalidDispatch);
        }
        let action = match (&self.namespace, root) {
            (Namespace::Named(ns), false) => format!("{ns}:{action}"),
            _ => action.to_string(),
        };
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(queue) = queue.as_mut() else {
            warn!(action = %action, "nested dispatch after its parent settled");
            return Err(StoreError::DispatcherClosed { action });
        };
        debug!(action = %action, root, "queued nested dispatch");
        queue.push(QueuedDispatch { action, value });
        Ok(())
    }

    /// Take everything queued, in queue order, and close the dispatcher.
    pub(crate) fn drain(&self) -> Vec<QueuedDispatch> {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .unwrap_or_default()
    }
}
