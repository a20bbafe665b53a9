use anyhow::Result;
use modstore::StoreBuilder;
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod modules;

use config::DemoConfig;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("modstore=info".parse()?)
                .add_directive("modstore_demo=info".parse()?),
        )
        .init();

    info!("modstore demo starting...");

    let config = DemoConfig::from_env()?;

    let store = StoreBuilder::<Value>::new()
        .add_config(serde_json::to_value(&config)?)
        .add_module(modules::catalog::module(), None)
        .add_module(modules::users::module(), Some("users"))
        .build();

    let _subscription = store.watch(|ctx| {
        info!(namespace = %ctx.namespace, state = %ctx.state, "state committed");
        Ok(())
    });

    let script: [(&str, Value); 5] = [
        ("load", Value::Null),
        ("users:login", json!({ "name": "ada" })),
        ("load", json!({ "path": "discontinued" })),
        ("users:login", json!({})),
        ("users:logout", Value::Null),
    ];
    for (action, value) in script {
        info!(action, "dispatching");
        store.dispatch(action, value).await?;
    }

    let tree: serde_json::Map<String, Value> = store
        .global_state()
        .into_iter()
        .map(|(namespace, state)| (namespace.to_string(), state))
        .collect();
    println!("{}", serde_json::to_string_pretty(&tree)?);
    Ok(())
}
