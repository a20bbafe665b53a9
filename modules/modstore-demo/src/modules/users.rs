//! Signed-in user. Mounted under the `users` namespace; the API client is
//! resolved from the root namespace.

use anyhow::bail;
use modstore::Module;
use serde_json::{json, Value};

use crate::api::ApiClient;

pub fn module() -> Module<Value> {
    Module::new()
        .initial_state(json!({ "current": null, "logins": 0, "last_error": null }))
        .transform("login", |ctx| {
            let logins = ctx.state["logins"].as_u64().unwrap_or(0);
            ctx.state["logins"] = json!(logins + 1);
            Ok(())
        })
        .async_handler("login", |ctx| async move {
            let Some(name) = ctx.value["name"].as_str() else {
                bail!("login requires a name");
            };
            let api = ctx.factory.create_service::<ApiClient>("api")?;
            let response = api.get(&format!("users/{name}")).await?;

            ctx.dispatch("profile", response["body"].clone())?;
            // Fresh catalog for the new session.
            ctx.dispatch_root("load", Value::Null)?;
            Ok(())
        })
        .transform("profile", |ctx| {
            ctx.state["current"] = ctx.value.clone();
            ctx.state["last_error"] = Value::Null;
            Ok(())
        })
        .transform("logout", |ctx| {
            ctx.state["current"] = Value::Null;
            Ok(())
        })
        .transform("failed", |ctx| {
            ctx.state["last_error"] = ctx.value["error"].clone();
            Ok(())
        })
}
