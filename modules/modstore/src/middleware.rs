//! Built-in links of the transform and middleware chains, and the default
//! error handler.
//!
//! The engine composes, for each phase:
//!
//! ```text
//! catcher → user chain (links[0] outermost) → inner step
//! ```
//!
//! The catcher turns errors and panics into calls to the error handler and
//! always returns `Ok(())`.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use anyhow::Result;
use futures::future::join_all;
use futures::FutureExt;
use tracing::error;

use crate::context::{AsyncContext, ErrorContext, TransformContext};
use crate::error::{Phase, StoreError};
use crate::state::StateValue;
use crate::traits::{ErrorCallback, MiddlewareCallback, TransformCallback};

/// Default error handler: one structured log record, error swallowed.
pub fn log_error<S: StateValue>(ctx: ErrorContext<S>) {
    error!(
        action = %ctx.action,
        namespace = %ctx.namespace,
        phase = %ctx.phase,
        value = %ctx.value,
        context = %ctx.context,
        state = ?ctx.state,
        global_state = ?ctx.global_state,
        error = %format!("{:#}", ctx.error),
        detail = ?ctx.error,
        "handler failed"
    );
}

/// Hand `ctx` to the error handler. A panicking handler is logged, not
/// propagated.
pub(crate) fn report<S: StateValue>(handler: &ErrorCallback<S>, ctx: ErrorContext<S>) {
    let action = ctx.action.clone();
    let phase = ctx.phase;
    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| handler(ctx))) {
        let err = StoreError::from_panic(phase, payload);
        error!(action = %action, error = %err, "error handler panicked");
    }
}

/// Innermost transform step: every resolved transform, in order.
///
/// Stops at the first error; transforms that already ran keep their
/// mutations.
pub(crate) fn run_transforms<S: StateValue>() -> TransformCallback<S> {
    Arc::new(|ctx: &mut TransformContext<S>| -> Result<()> {
        let transforms = Arc::clone(&ctx.transforms);
        for transform in transforms.iter() {
            transform(&mut *ctx)?;
        }
        Ok(())
    })
}

/// Outermost transform link.
pub(crate) fn catch_transform_errors<S: StateValue>(
    handler: ErrorCallback<S>,
    next: TransformCallback<S>,
) -> TransformCallback<S> {
    Arc::new(move |ctx: &mut TransformContext<S>| -> Result<()> {
        let error = match catch_unwind(AssertUnwindSafe(|| next(&mut *ctx))) {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(err)) => err,
            Err(payload) => StoreError::from_panic(Phase::Transform, payload).into(),
        };
        report(&handler, ErrorContext::from_transform(ctx, error));
        Ok(())
    })
}

/// Innermost async step: start every resolved handler, then join them all.
///
/// The first failure, in registration order, is returned so middleware can
/// see it. Any further failures go straight to the error handler.
pub(crate) fn run_asyncs<S: StateValue>(handler: ErrorCallback<S>) -> MiddlewareCallback<S> {
    Arc::new(move |ctx: AsyncContext<S>| {
        let handler = Arc::clone(&handler);
        async move {
            let asyncs = Arc::clone(&ctx.asyncs);
            let runs = asyncs.iter().map(|callback| {
                let callback = Arc::clone(callback);
                let ctx = ctx.clone();
                AssertUnwindSafe(async move { callback(ctx).await }).catch_unwind()
            });

            let mut failures = join_all(runs).await.into_iter().filter_map(|outcome| match outcome {
                Ok(Ok(())) => None,
                Ok(Err(err)) => Some(err),
                Err(payload) => Some(StoreError::from_panic(Phase::Async, payload).into()),
            });

            let first = failures.next();
            for err in failures {
                report(&handler, ErrorContext::from_async(&ctx, err));
            }
            match first {
                Some(err) => Err::<(), anyhow::Error>(err),
                None => Ok(()),
            }
        }
        .boxed()
    })
}

/// Outermost middleware link.
pub(crate) fn catch_async_errors<S: StateValue>(
    handler: ErrorCallback<S>,
    next: MiddlewareCallback<S>,
) -> MiddlewareCallback<S> {
    Arc::new(move |ctx: AsyncContext<S>| {
        let handler = Arc::clone(&handler);
        let next = Arc::clone(&next);
        async move {
            let snapshot = ctx.clone();
            let error = match AssertUnwindSafe(async move { next(ctx).await })
                .catch_unwind()
                .await
            {
                Ok(Ok(())) => return Ok(()),
                Ok(Err(err)) => err,
                Err(payload) => StoreError::from_panic(Phase::Async, payload).into(),
            };
            report(&handler, ErrorContext::from_async(&snapshot, error));
            Ok::<(), anyhow::Error>(())
        }
        .boxed()
    })
}
