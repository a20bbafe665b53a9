//! Store modules composed by the demo.

pub mod catalog;
pub mod users;

use std::sync::Arc;

use modstore::{middleware_fn, AsyncContext, MiddlewareCallback};
use serde_json::{json, Value};
use tracing::{info, warn};

/// Middleware that times each async batch and turns a failure into a
/// `failed` action in the namespace it came from.
pub fn report_failures(next: MiddlewareCallback<Value>) -> MiddlewareCallback<Value> {
    middleware_fn(move |ctx: AsyncContext<Value>| {
        let next = Arc::clone(&next);
        async move {
            let action = ctx.action.clone();
            let dispatcher = ctx.dispatcher.clone();
            let started = std::time::Instant::now();

            let outcome = next(ctx).await;
            let elapsed = started.elapsed();

            match outcome {
                Ok(()) => info!(action = %action, elapsed = ?elapsed, "async handlers settled"),
                Err(err) => {
                    let error = format!("{err:#}");
                    warn!(action = %action, elapsed = ?elapsed, error = %error, "async handler failed");
                    dispatcher.dispatch("failed", json!({ "action": action, "error": error }))?;
                }
            }
            Ok(())
        }
    })
}
