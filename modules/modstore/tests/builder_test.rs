//! Module merging, transform-wraps, error handler selection and services.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use modstore::testing::{CallCounter, RecordingErrorHandler};
use modstore::{transform_fn, Module, Namespace, Phase, StoreBuilder, StoreError, TransformCallback, TransformContext};
use serde_json::{json, Value};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn record_action(seen: &Arc<Mutex<Vec<String>>>) -> impl Fn(&mut TransformContext<Value>) -> anyhow::Result<()> + Send + Sync + 'static {
    let seen = Arc::clone(seen);
    move |ctx| {
        seen.lock().unwrap().push(ctx.action.clone());
        Ok(())
    }
}

/// Transform-wrap that records its name on the way in.
fn named_wrap(
    name: &'static str,
    seen: &Arc<Mutex<Vec<String>>>,
) -> impl Fn(TransformCallback<Value>) -> TransformCallback<Value> + Send + Sync + 'static {
    let seen = Arc::clone(seen);
    move |next: TransformCallback<Value>| {
        let seen = Arc::clone(&seen);
        transform_fn(move |ctx: &mut TransformContext<Value>| {
            seen.lock().unwrap().push(name.to_string());
            next(ctx)
        })
    }
}

#[derive(Debug)]
struct HttpClient {
    base_url: String,
    timeout_ms: u64,
}

// =========================================================================
// Modules
// =========================================================================

#[tokio::test]
async fn modules_merge_state_and_append_handlers() {
    let seen = Arc::new(Mutex::new(Vec::new()));

    let first = Module::<Value>::new()
        .initial_state(json!({ "a": 1, "shared": "first" }))
        .transform("go", record_action(&seen));
    let second = Module::<Value>::new()
        .initial_state(json!({ "b": 2, "shared": "second" }))
        .transform("go", record_action(&seen));

    let store = StoreBuilder::new()
        .add_module(first, None)
        .add_module(second, None)
        .build();

    assert_eq!(
        store.get_state(None),
        json!({ "a": 1, "b": 2, "shared": "second" })
    );

    store.dispatch("go", Value::Null).await.unwrap();
    assert_eq!(seen.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn module_without_initial_state_still_creates_its_namespace() {
    let store = StoreBuilder::<Value>::new()
        .add_module(Module::new(), Some("empty"))
        .build();

    assert!(store.global_state().contains_key(&Namespace::from("empty")));
    assert_eq!(store.get_state(Some("empty")), Value::Null);
}

#[tokio::test]
async fn namespaced_module_handlers_are_qualified() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let module = Module::<Value>::new()
        .initial_state(json!({ "n": 0 }))
        .transform("test", record_action(&seen))
        .transform("*", record_action(&seen))
        .transform("*:*", record_action(&seen));

    let store = StoreBuilder::new().add_module(module, Some("nsA")).build();

    store.dispatch("nsA:test", Value::Null).await.unwrap();
    assert_eq!(*seen.lock().unwrap(), vec!["nsA:test"; 3]);

    // Only the unqualified global wildcard fires for other namespaces.
    seen.lock().unwrap().clear();
    store.dispatch("nsB:test", Value::Null).await.unwrap();
    store.dispatch("test", Value::Null).await.unwrap();
    assert_eq!(*seen.lock().unwrap(), vec!["nsB:test", "test"]);

    assert_eq!(store.get_state(Some("nsA")), json!({ "n": 0 }));
}

#[tokio::test]
async fn module_namespace_addresses_its_own_state() {
    let module = Module::<Value>::new()
        .initial_state(json!({ "count": 0 }))
        .transform("bump", |ctx| {
            let count = ctx.state["count"].as_i64().unwrap_or(0);
            ctx.state["count"] = json!(count + 1);
            Ok(())
        });

    let store = StoreBuilder::new()
        .initial_state(json!({ "root": true }), None)
        .add_module(module, Some("counter"))
        .build();

    store.dispatch("counter:bump", Value::Null).await.unwrap();
    store.dispatch("counter:bump", Value::Null).await.unwrap();

    assert_eq!(store.get_state(Some("counter")), json!({ "count": 2 }));
    assert_eq!(store.get_state(None), json!({ "root": true }));
}

// =========================================================================
// Transform-wraps
// =========================================================================

#[tokio::test]
async fn latest_transform_wrap_is_outermost() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let store = StoreBuilder::<Value>::new()
        .add_transform_wrap(named_wrap("w1", &seen))
        .add_transform_wrap(named_wrap("w2", &seen))
        .add_transform("go", record_action(&seen), None)
        .build();

    store.dispatch("go", Value::Null).await.unwrap();

    assert_eq!(*seen.lock().unwrap(), vec!["w2", "w1", "go"]);
}

#[tokio::test]
async fn module_wraps_keep_their_order_and_go_outside() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let module = Module::<Value>::new()
        .transform_wrap(named_wrap("m1", &seen))
        .transform_wrap(named_wrap("m2", &seen));

    let store = StoreBuilder::<Value>::new()
        .add_transform_wrap(named_wrap("before", &seen))
        .add_module(module, None)
        .add_transform("go", record_action(&seen), None)
        .build();

    store.dispatch("go", Value::Null).await.unwrap();

    assert_eq!(*seen.lock().unwrap(), vec!["m1", "m2", "before", "go"]);
}

#[tokio::test]
async fn wrap_can_swallow_the_transform_phase() {
    let store = StoreBuilder::<Value>::new()
        .initial_state(json!({ "n": 0 }), None)
        .add_transform_wrap(|next: TransformCallback<Value>| {
            transform_fn(move |ctx: &mut TransformContext<Value>| {
                if ctx.value == json!("skip") {
                    return Ok(());
                }
                next(ctx)
            })
        })
        .add_transform(
            "set",
            |ctx| {
                ctx.state = json!({ "n": ctx.value.clone() });
                Ok(())
            },
            None,
        )
        .build();

    store.dispatch("set", json!("skip")).await.unwrap();
    assert_eq!(store.get_state(None), json!({ "n": 0 }));

    store.dispatch("set", json!(7)).await.unwrap();
    assert_eq!(store.get_state(None), json!({ "n": 7 }));
}

// =========================================================================
// Error handler
// =========================================================================

#[tokio::test]
async fn last_error_handler_wins() {
    let early = RecordingErrorHandler::new();
    let from_module = RecordingErrorHandler::new();
    let silent = Module::<Value>::new();

    let store = StoreBuilder::<Value>::new()
        .add_error_handler(early.handler::<Value>())
        .add_module(Module::new().error_handler(from_module.handler::<Value>()), None)
        .add_module(silent, None)
        .add_transform("boom", |_| anyhow::bail!("boom"), None)
        .build();

    store.dispatch("boom", Value::Null).await.unwrap();

    assert!(early.is_empty());
    assert_eq!(from_module.len(), 1);
    assert_eq!(from_module.records()[0].phase, Phase::Transform);
}

#[tokio::test]
async fn builder_error_handler_replaces_module_handler() {
    let from_module = RecordingErrorHandler::new();
    let late = RecordingErrorHandler::new();

    let store = StoreBuilder::<Value>::new()
        .add_module(Module::new().error_handler(from_module.handler::<Value>()), None)
        .add_error_handler(late.handler::<Value>())
        .add_transform("boom", |_| anyhow::bail!("boom"), None)
        .build();

    store.dispatch("boom", json!({ "why": "test" })).await.unwrap();

    assert!(from_module.is_empty());
    let records = late.records();
    assert_eq!(records[0].action, "boom");
    assert_eq!(records[0].value, json!({ "why": "test" }));
}

#[tokio::test]
async fn panicking_error_handler_is_contained() {
    let store = StoreBuilder::<Value>::new()
        .initial_state(json!(0), None)
        .add_error_handler(|_| panic!("handler down"))
        .add_transform("boom", |_| anyhow::bail!("boom"), None)
        .add_transform(
            "ok",
            |ctx| {
                ctx.state = json!(1);
                Ok(())
            },
            None,
        )
        .build();

    store.dispatch("boom", Value::Null).await.unwrap();
    store.dispatch("ok", Value::Null).await.unwrap();

    assert_eq!(store.get_state(None), json!(1));
}

// =========================================================================
// Services
// =========================================================================

#[tokio::test]
async fn factories_run_once_at_build_with_merged_config() {
    let built = Arc::new(AtomicUsize::new(0));
    let calls = Arc::clone(&built);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    let store = StoreBuilder::<Value>::new()
        .add_config(json!({ "base_url": "http://localhost:8080/" }))
        .add_factory(
            "http",
            move |config: &Value| {
                calls.fetch_add(1, Ordering::SeqCst);
                HttpClient {
                    base_url: config["base_url"].as_str().unwrap_or_default().to_string(),
                    timeout_ms: config["timeout_ms"].as_u64().unwrap_or_default(),
                }
            },
            None,
        )
        .add_config(json!({ "timeout_ms": 2000 }))
        .add_async(
            "call",
            move |ctx| {
                let sink = Arc::clone(&sink);
                async move {
                    let client = ctx.factory.create_service::<HttpClient>("http")?;
                    sink.lock()
                        .unwrap()
                        .push((client.base_url.clone(), client.timeout_ms));
                    Ok(())
                }
            },
            None,
        )
        .build();

    assert_eq!(built.load(Ordering::SeqCst), 1);

    store.dispatch("call", Value::Null).await.unwrap();
    store.dispatch("call", Value::Null).await.unwrap();

    assert_eq!(built.load(Ordering::SeqCst), 1);
    assert_eq!(
        *seen.lock().unwrap(),
        vec![("http://localhost:8080/".to_string(), 2000); 2]
    );
}

#[tokio::test]
async fn later_factory_for_the_same_key_wins() {
    let errors = RecordingErrorHandler::new();
    let answers = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&answers);

    let store = StoreBuilder::<Value>::new()
        .add_factory("greeting", |_: &Value| "first".to_string(), None)
        .add_module(
            Module::new().factory("greeting", |_: &Value| "second".to_string()),
            None,
        )
        .add_async(
            "greet",
            move |ctx| {
                let sink = Arc::clone(&sink);
                async move {
                    let greeting = ctx.factory.create_service::<String>("greeting")?;
                    sink.lock().unwrap().push(greeting.as_str().to_string());
                    Ok(())
                }
            },
            None,
        )
        .add_error_handler(errors.handler::<Value>())
        .build();

    store.dispatch("greet", Value::Null).await.unwrap();

    assert!(errors.is_empty());
    assert_eq!(*answers.lock().unwrap(), vec!["second"]);
}

#[tokio::test]
async fn namespaced_dispatch_falls_back_to_root_services() {
    let answers = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&answers);

    let store = StoreBuilder::<Value>::new()
        .add_factory("db", |_: &Value| "root db".to_string(), None)
        .add_factory("db", |_: &Value| "users db".to_string(), Some("users"))
        .add_factory("cache", |_: &Value| "root cache".to_string(), None)
        .add_async(
            "*:*",
            move |ctx| {
                let sink = Arc::clone(&sink);
                async move {
                    let db = ctx.factory.create_service::<String>("db")?;
                    let cache = ctx.factory.create_service::<String>("cache")?;
                    sink.lock()
                        .unwrap()
                        .push(format!("{} {db} {cache}", ctx.namespace));
                    Ok(())
                }
            },
            None,
        )
        .build();

    store.dispatch("users:load", Value::Null).await.unwrap();
    store.dispatch("load", Value::Null).await.unwrap();

    assert_eq!(
        *answers.lock().unwrap(),
        vec!["users users db root cache", "<root> root db root cache"]
    );
}

#[tokio::test]
async fn wrong_service_type_is_reported() {
    let errors = RecordingErrorHandler::new();
    let store = StoreBuilder::<Value>::new()
        .add_factory("n", |_: &Value| 5_u32, None)
        .add_async(
            "call",
            |ctx| async move {
                ctx.factory.create_service::<String>("n")?;
                Ok(())
            },
            None,
        )
        .add_error_handler(errors.handler::<Value>())
        .build();

    store.dispatch("call", Value::Null).await.unwrap();

    let expected = StoreError::ServiceTypeMismatch { key: "n".into() }.to_string();
    assert_eq!(errors.records()[0].message, expected);
    assert_eq!(errors.records()[0].phase, Phase::Async);
}

#[tokio::test]
async fn transforms_can_use_services_too() {
    let calls = CallCounter::new();
    let store = StoreBuilder::<Value>::new()
        .add_factory("calls", move |_: &Value| calls.clone(), None)
        .add_transform(
            "go",
            |ctx| {
                let calls = ctx.factory.create_service::<CallCounter>("calls")?;
                calls.hit();
                ctx.state = json!(calls.count());
                Ok(())
            },
            None,
        )
        .build();

    store.dispatch("go", Value::Null).await.unwrap();
    store.dispatch("go", Value::Null).await.unwrap();

    assert_eq!(store.get_state(None), json!(2));
}

#[tokio::test]
async fn namespaced_factory_keys_are_always_prefixed() {
    let answers = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&answers);

    let store = StoreBuilder::<Value>::new()
        .add_factory("*:*", |_: &Value| "root".to_string(), None)
        .add_module(
            Module::new().factory("*:*", |_: &Value| "scoped".to_string()),
            Some("a"),
        )
        .add_async(
            "*:*",
            move |ctx| {
                let sink = Arc::clone(&sink);
                async move {
                    let service = ctx.factory.create_service::<String>("*:*")?;
                    sink.lock()
                        .unwrap()
                        .push(format!("{} {service}", ctx.namespace));
                    Ok(())
                }
            },
            None,
        )
        .build();

    store.dispatch("a:load", Value::Null).await.unwrap();
    store.dispatch("load", Value::Null).await.unwrap();

    assert_eq!(*answers.lock().unwrap(), vec!["a scoped", "<root> root"]);
}
