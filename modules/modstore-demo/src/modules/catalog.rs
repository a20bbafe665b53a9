//! Product catalog, mounted at the root namespace.

use anyhow::Context;
use modstore::Module;
use serde_json::{json, Value};
use tracing::debug;

use crate::api::ApiClient;

pub fn module() -> Module<Value> {
    Module::new()
        .initial_state(json!({
            "items": [],
            "loading": false,
            "last_error": null,
        }))
        .factory("api", ApiClient::from_config)
        .middleware(super::report_failures)
        .transform("load", |ctx| {
            ctx.state["loading"] = json!(true);
            ctx.context = json!({ "path": ctx.value["path"].as_str().unwrap_or("catalog") });
            Ok(())
        })
        .async_handler("load", |ctx| async move {
            let path = ctx.context["path"].as_str().unwrap_or("catalog").to_string();
            let api = ctx.factory.create_service::<ApiClient>("api")?;
            debug!(base_url = api.base_url(), path = %path, "loading catalog");
            let response = api
                .get(&path)
                .await
                .with_context(|| format!("loading {path}"))?;
            ctx.dispatch("loaded", response)?;
            Ok(())
        })
        .transform("loaded", |ctx| {
            ctx.state["items"] = ctx.value["body"].clone();
            ctx.state["fetched_at"] = ctx.value["fetched_at"].clone();
            ctx.state["loading"] = json!(false);
            ctx.state["last_error"] = Value::Null;
            Ok(())
        })
        .transform("failed", |ctx| {
            ctx.state["loading"] = json!(false);
            ctx.state["last_error"] = ctx.value["error"].clone();
            Ok(())
        })
}
