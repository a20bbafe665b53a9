//! Callback shapes registered with the builder.

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;

use crate::chain::Chain;
use crate::context::{AsyncContext, ErrorContext, MiddlewareContext, TransformContext, WatchContext};
use crate::service::Service;

/// Synchronous state transform. Mutates the context's state copies.
pub type TransformCallback<S> = Arc<dyn Fn(&mut TransformContext<S>) -> Result<()> + Send + Sync>;

/// Side-effecting handler, run concurrently with the other handlers for the
/// same action.
pub type AsyncCallback<S> = Arc<dyn Fn(AsyncContext<S>) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// The batched async step as seen by middleware.
pub type MiddlewareCallback<S> =
    Arc<dyn Fn(MiddlewareContext<S>) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Observer called after every committed transform phase.
pub type WatchCallback<S> = Arc<dyn Fn(WatchContext<S>) -> Result<()> + Send + Sync>;

/// Receives every recovered handler failure.
pub type ErrorCallback<S> = Arc<dyn Fn(ErrorContext<S>) + Send + Sync>;

/// Builds a service instance from the merged configuration.
pub type FactoryCallback = Arc<dyn Fn(&Value) -> Service + Send + Sync>;

/// Decorator around the batched transform invocation.
pub type TransformWrap<S> = Arc<dyn Chain<TransformCallback<S>>>;

/// Decorator around the batched async invocation.
pub type Middleware<S> = Arc<dyn Chain<MiddlewareCallback<S>>>;

/// Box an async closure into an [`AsyncCallback`].
pub fn async_fn<S, F, Fut>(f: F) -> AsyncCallback<S>
where
    F: Fn(AsyncContext<S>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |ctx| f(ctx).boxed())
}

/// Box an async closure into a [`MiddlewareCallback`].
///
/// ```ignore
/// builder.add_middleware(|next: MiddlewareCallback<Value>| {
///     middleware_fn(move |ctx| {
///         let next = next.clone();
///         async move {
///             tracing::info!(action = %ctx.action, "before");
///             next(ctx).await
///         }
///     })
/// })
/// ```
pub fn middleware_fn<S, F, Fut>(f: F) -> MiddlewareCallback<S>
where
    F: Fn(MiddlewareContext<S>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |ctx| f(ctx).boxed())
}

/// Box a closure into a [`TransformCallback`].
pub fn transform_fn<S, F>(f: F) -> TransformCallback<S>
where
    F: Fn(&mut TransformContext<S>) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}
