//! Module declarations: the unit a store is composed from.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;

use crate::chain::Chain;
use crate::context::{AsyncContext, ErrorContext, TransformContext};
use crate::service::Service;
use crate::state::StateValue;
use crate::traits::{
    async_fn, AsyncCallback, ErrorCallback, FactoryCallback, Middleware, MiddlewareCallback,
    TransformCallback, TransformWrap,
};

/// Everything one module contributes to a store.
///
/// Keys are written unqualified; [`StoreBuilder::add_module`](crate::StoreBuilder::add_module)
/// prefixes them with the namespace the module is mounted under.
///
/// ```ignore
/// let counter = Module::new()
///     .initial_state(json!({ "n": 0 }))
///     .transform("inc", |ctx| {
///         ctx.state["n"] = json!(ctx.state["n"].as_i64().unwrap_or(0) + 1);
///         Ok(())
///     });
/// ```
pub struct Module<S> {
    pub(crate) transforms: Vec<(String, TransformCallback<S>)>,
    pub(crate) asyncs: Vec<(String, AsyncCallback<S>)>,
    pub(crate) factories: Vec<(String, FactoryCallback)>,
    pub(crate) middlewares: Vec<Middleware<S>>,
    pub(crate) transform_wraps: Vec<TransformWrap<S>>,
    pub(crate) error_handler: Option<ErrorCallback<S>>,
    pub(crate) initial_state: Option<S>,
}

impl<S> Default for Module<S> {
    fn default() -> Self {
        Self {
            transforms: Vec::new(),
            asyncs: Vec::new(),
            factories: Vec::new(),
            middlewares: Vec::new(),
            transform_wraps: Vec::new(),
            error_handler: None,
            initial_state: None,
        }
    }
}

impl<S: StateValue> Module<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transform<F>(mut self, key: &str, callback: F) -> Self
    where
        F: Fn(&mut TransformContext<S>) -> Result<()> + Send + Sync + 'static,
    {
        self.transforms.push((key.to_string(), Arc::new(callback)));
        self
    }

    pub fn async_handler<F, Fut>(mut self, key: &str, callback: F) -> Self
    where
        F: Fn(AsyncContext<S>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.asyncs.push((key.to_string(), async_fn(callback)));
        self
    }

    pub fn factory<F, T>(mut self, key: &str, factory: F) -> Self
    where
        F: Fn(&Value) -> T + Send + Sync + 'static,
        T: Any + Send + Sync,
    {
        self.factories.push((key.to_string(), erase_factory(factory)));
        self
    }

    /// Middleware listed earlier in a module wraps middleware listed later.
    pub fn middleware(mut self, chain: impl Chain<MiddlewareCallback<S>> + 'static) -> Self {
        self.middlewares.push(Arc::new(chain));
        self
    }

    /// Transform-wraps listed earlier in a module wrap those listed later.
    pub fn transform_wrap(mut self, chain: impl Chain<TransformCallback<S>> + 'static) -> Self {
        self.transform_wraps.push(Arc::new(chain));
        self
    }

    pub fn error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(ErrorContext<S>) + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    pub fn initial_state(mut self, state: S) -> Self {
        self.initial_state = Some(state);
        self
    }
}

pub(crate) fn erase_factory<F, T>(factory: F) -> FactoryCallback
where
    F: Fn(&Value) -> T + Send + Sync + 'static,
    T: Any + Send + Sync,
{
    Arc::new(move |config: &Value| Arc::new(factory(config)) as Service)
}
