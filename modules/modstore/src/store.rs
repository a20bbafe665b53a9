//! Public handle to a built store.

use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;
use tracing::Instrument;
use uuid::Uuid;

use crate::builder::StoreBuilder;
use crate::context::WatchContext;
use crate::engine::Engine;
use crate::error::StoreResult;
use crate::namespace::Namespace;
use crate::state::{Frozen, GlobalState, StateValue};
use crate::watch::Subscription;

/// A built store. Cheap to clone; clones share state and watchers.
///
/// Registrations are frozen: the only way to change state is to dispatch.
pub struct Store<S> {
    engine: Arc<Engine<S>>,
}

impl<S> Clone for Store<S> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
        }
    }
}

impl<S: StateValue> Store<S> {
    pub fn builder() -> StoreBuilder<S> {
        StoreBuilder::new()
    }

    pub(crate) fn from_engine(engine: Engine<S>) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }

    /// Dispatch `action` with `value`.
    ///
    /// Resolves once the action and every action queued beneath it have
    /// settled. Only an empty action key is an error; handler failures go
    /// to the error handler.
    pub async fn dispatch(&self, action: &str, value: Value) -> StoreResult<()> {
        self.dispatch_with(action, value, false).await
    }

    /// Dispatch in the root namespace, stripping any `namespace:` prefix.
    pub async fn dispatch_root(&self, action: &str, value: Value) -> StoreResult<()> {
        self.dispatch_with(action, value, true).await
    }

    async fn dispatch_with(&self, action: &str, value: Value, root: bool) -> StoreResult<()> {
        let span = tracing::info_span!(
            "dispatch",
            dispatch_id = %Uuid::new_v4(),
            action = %action,
            root
        );
        self.engine.dispatch(action, value, root).instrument(span).await
    }

    /// Watch every committed transform phase until unsubscribed.
    pub fn watch<F>(&self, callback: F) -> Subscription
    where
        F: Fn(WatchContext<S>) -> Result<()> + Send + Sync + 'static,
    {
        self.engine.watchers.subscribe(Arc::new(callback))
    }

    /// Copy of a namespace's state; the root namespace for `None`.
    ///
    /// Never waits on a running transform phase. Called from inside one, it
    /// returns the state as of the last commit.
    pub fn get_state(&self, namespace: Option<&str>) -> S {
        self.engine
            .read_namespace(&Namespace::from_option(namespace))
    }

    /// Copy of the whole tree.
    pub fn global_state(&self) -> GlobalState<S> {
        self.engine.read_tree()
    }

    /// Read-only copy of a namespace's state.
    pub fn snapshot(&self, namespace: Option<&str>) -> Frozen<S> {
        Frozen::new(self.get_state(namespace))
    }
}
