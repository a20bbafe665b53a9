//! Composable, namespaced action-dispatch store.
//!
//! Independently authored [`Module`]s register synchronous transforms,
//! asynchronous handlers, service factories, middleware and transform-wraps
//! against string action keys (optionally `namespace:`-qualified). The
//! [`StoreBuilder`] merges them and `build()` freezes everything into a
//! [`Store`].
//!
//! Every dispatch runs: resolve → clone state → transforms → commit →
//! notify watchers → async handlers (through middleware) → drain queued
//! nested dispatches. Handler failures never reach the caller; they are
//! forwarded to the single active error handler.

pub mod builder;
pub mod chain;
pub mod context;
pub mod error;
pub mod middleware;
pub mod module;
pub mod namespace;
pub mod registry;
pub mod service;
pub mod state;
pub mod store;
pub mod traits;
pub mod watch;

mod engine;

#[cfg(feature = "test-utils")]
pub mod testing;

pub use builder::StoreBuilder;
pub use chain::{compose, Chain};
pub use context::{AsyncContext, Dispatcher, ErrorContext, MiddlewareContext, TransformContext, WatchContext};
pub use error::{Phase, StoreError, StoreResult};
pub use module::Module;
pub use namespace::{Namespace, GLOBAL_WILDCARD, WILDCARD};
pub use service::{Service, ServiceFactory};
pub use state::{Frozen, GlobalState, StateValue};
pub use store::Store;
pub use middleware::log_error;
pub use traits::{
    async_fn, middleware_fn, transform_fn, AsyncCallback, ErrorCallback, FactoryCallback,
    Middleware, MiddlewareCallback, TransformCallback, TransformWrap, WatchCallback,
};
pub use watch::Subscription;
