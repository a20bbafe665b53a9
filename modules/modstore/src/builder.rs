//! Store builder: merges module declarations into one set of registries.

use std::any::Any;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;

use crate::chain::Chain;
use crate::context::{AsyncContext, ErrorContext, TransformContext};
use crate::engine::Engine;
use crate::middleware::log_error;
use crate::module::{erase_factory, Module};
use crate::namespace::Namespace;
use crate::registry::HandlerRegistry;
use crate::state::{GlobalState, StateValue};
use crate::store::Store;
use crate::traits::{
    async_fn, ErrorCallback, FactoryCallback, Middleware, MiddlewareCallback, TransformCallback,
    TransformWrap,
};

/// Collects modules and single registrations, then [`build`](Self::build)s
/// an immutable [`Store`].
///
/// Every method is chainable. `namespace: None` addresses the root
/// namespace.
pub struct StoreBuilder<S> {
    registry: HandlerRegistry<S>,
    factories: BTreeMap<String, FactoryCallback>,
    middlewares: Vec<Middleware<S>>,
    transform_wraps: Vec<TransformWrap<S>>,
    error_handler: Option<ErrorCallback<S>>,
    state: GlobalState<S>,
    config: Value,
}

impl<S: StateValue> Default for StoreBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: StateValue> StoreBuilder<S> {
    pub fn new() -> Self {
        Self {
            registry: HandlerRegistry::default(),
            factories: BTreeMap::new(),
            middlewares: Vec::new(),
            transform_wraps: Vec::new(),
            error_handler: None,
            state: GlobalState::new(),
            config: Value::Object(Default::default()),
        }
    }

    /// Merge a module into the store, optionally mounted under `namespace`.
    ///
    /// Transforms and asyncs append to any existing handlers for the same
    /// key, factories overwrite, and initial state is shallow-merged into
    /// the namespace's existing state. The module's middleware and
    /// transform-wraps are placed outside everything registered before.
    pub fn add_module(mut self, module: Module<S>, namespace: Option<&str>) -> Self {
        let ns = Namespace::from_option(namespace);
        let Module {
            transforms,
            asyncs,
            factories,
            middlewares,
            transform_wraps,
            error_handler,
            initial_state,
        } = module;

        for (key, callback) in transforms {
            self.registry.add_transform(ns.qualify(&key), callback);
        }
        for (key, callback) in asyncs {
            self.registry.add_async(ns.qualify(&key), callback);
        }
        for (key, factory) in factories {
            self.factories.insert(ns.service_key(&key), factory);
        }

        self.middlewares.splice(0..0, middlewares);
        self.transform_wraps.splice(0..0, transform_wraps);

        if error_handler.is_some() {
            self.error_handler = error_handler;
        }

        let slot = self.state.entry(ns).or_default();
        if let Some(initial) = initial_state {
            slot.merge(initial);
        }
        self
    }

    pub fn add_transform<F>(mut self, key: &str, callback: F, namespace: Option<&str>) -> Self
    where
        F: Fn(&mut TransformContext<S>) -> Result<()> + Send + Sync + 'static,
    {
        let key = Namespace::from_option(namespace).qualify(key);
        self.registry.add_transform(key, Arc::new(callback));
        self
    }

    pub fn add_async<F, Fut>(mut self, key: &str, callback: F, namespace: Option<&str>) -> Self
    where
        F: Fn(AsyncContext<S>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let key = Namespace::from_option(namespace).qualify(key);
        self.registry.add_async(key, async_fn(callback));
        self
    }

    /// Register a service factory. A later registration for the same
    /// qualified key replaces the earlier one.
    pub fn add_factory<F, T>(mut self, key: &str, factory: F, namespace: Option<&str>) -> Self
    where
        F: Fn(&Value) -> T + Send + Sync + 'static,
        T: Any + Send + Sync,
    {
        let key = Namespace::from_option(namespace).service_key(key);
        self.factories.insert(key, erase_factory(factory));
        self
    }

    /// Prepend a middleware: the most recently added one is outermost.
    pub fn add_middleware(mut self, chain: impl Chain<MiddlewareCallback<S>> + 'static) -> Self {
        self.middlewares.insert(0, Arc::new(chain));
        self
    }

    /// Prepend a transform-wrap: the most recently added one is outermost.
    pub fn add_transform_wrap(mut self, chain: impl Chain<TransformCallback<S>> + 'static) -> Self {
        self.transform_wraps.insert(0, Arc::new(chain));
        self
    }

    /// Replace the error handler. Only the last one registered is used.
    pub fn add_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(ErrorContext<S>) + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    /// Shallow-merge `state` into the namespace's initial state.
    pub fn initial_state(mut self, state: S, namespace: Option<&str>) -> Self {
        self.state
            .entry(Namespace::from_option(namespace))
            .or_default()
            .merge(state);
        self
    }

    /// Shallow-merge `config` into the configuration passed to factories.
    pub fn add_config(mut self, config: Value) -> Self {
        self.config.merge(config);
        self
    }

    /// Instantiate every service once and freeze all registrations.
    pub fn build(self) -> Store<S> {
        let error_handler = self
            .error_handler
            .unwrap_or_else(|| Arc::new(log_error::<S>) as ErrorCallback<S>);

        let engine = Engine::new(
            self.registry,
            self.factories,
            self.config,
            self.state,
            &self.middlewares,
            &self.transform_wraps,
            error_handler,
        );
        Store::from_engine(engine)
    }
}
