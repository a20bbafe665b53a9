//! The dispatch loop.

use std::collections::{BTreeMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde_json::Value;
use tracing::{debug, info, trace, warn};

use crate::chain::compose;
use crate::context::{
    AsyncContext, Dispatcher, ErrorContext, QueuedDispatch, TransformContext, WatchContext,
};
use crate::error::{Phase, StoreError, StoreResult};
use crate::middleware::{catch_async_errors, catch_transform_errors, report, run_asyncs, run_transforms};
use crate::namespace::{ActionRoute, Namespace};
use crate::registry::HandlerRegistry;
use crate::service::{instantiate, ServiceFactory, ServiceMap};
use crate::state::{GlobalState, StateValue};
use crate::traits::{
    ErrorCallback, FactoryCallback, Middleware, MiddlewareCallback, TransformCallback,
    TransformWrap,
};
use crate::watch::WatcherRegistry;

/// State and copies produced by one committed transform phase.
struct Committed<S> {
    state: S,
    global_state: GlobalState<S>,
    context: Value,
}

/// Owns the state tree and every frozen registration of a built store.
///
/// Resolve → clone → transform → commit → notify → async → drain, until
/// the queue of nested dispatches is empty.
pub(crate) struct Engine<S> {
    registry: HandlerRegistry<S>,
    services: ServiceMap,
    config: Arc<Value>,
    /// Last committed tree. Only written at commit, so reads never wait on
    /// user code.
    tree: RwLock<GlobalState<S>>,
    /// Held from the transform-phase copy to its commit.
    commit: Mutex<()>,
    pub(crate) watchers: Arc<WatcherRegistry<S>>,
    transform_pipeline: TransformCallback<S>,
    async_pipeline: MiddlewareCallback<S>,
    error_handler: ErrorCallback<S>,
}

impl<S: StateValue> Engine<S> {
    pub fn new(
        registry: HandlerRegistry<S>,
        factories: BTreeMap<String, FactoryCallback>,
        config: Value,
        initial_state: GlobalState<S>,
        middlewares: &[Middleware<S>],
        transform_wraps: &[TransformWrap<S>],
        error_handler: ErrorCallback<S>,
    ) -> Self {
        let services = instantiate(factories, &config);

        let transform_pipeline = catch_transform_errors(
            Arc::clone(&error_handler),
            compose(transform_wraps, run_transforms()),
        );
        let async_pipeline = catch_async_errors(
            Arc::clone(&error_handler),
            compose(middlewares, run_asyncs(Arc::clone(&error_handler))),
        );

        info!(
            transforms = registry.transform_count(),
            asyncs = registry.async_count(),
            services = services.len(),
            middlewares = middlewares.len(),
            transform_wraps = transform_wraps.len(),
            namespaces = initial_state.len(),
            "store built"
        );

        Self {
            registry,
            services,
            config: Arc::new(config),
            tree: RwLock::new(initial_state),
            commit: Mutex::new(()),
            watchers: Arc::new(WatcherRegistry::new()),
            transform_pipeline,
            async_pipeline,
            error_handler,
        }
    }

    pub fn read_tree(&self) -> GlobalState<S> {
        self.tree
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn read_namespace(&self, namespace: &Namespace) -> S {
        self.tree
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(namespace)
            .cloned()
            .unwrap_or_default()
    }

    /// Dispatch an action and every action it queues, depth first: each
    /// queued action settles, including its own children, before the next
    /// one starts.
    pub async fn dispatch(&self, action: &str, value: Value, root: bool) -> StoreResult<()> {
        let route = ActionRoute::resolve(action, root)?;

        let mut pending: VecDeque<(ActionRoute, Value)> = VecDeque::new();
        pending.push_back((route, value));

        while let Some((route, value)) = pending.pop_front() {
            let children = self.run(route, value).await;

            for child in children.into_iter().rev() {
                match ActionRoute::resolve(&child.action, false) {
                    Ok(route) => pending.push_front((route, child.value)),
                    Err(err) => warn!(action = %child.action, error = %err, "dropping nested dispatch"),
                }
            }
        }

        Ok(())
    }

    /// One action, without its children. Returns the actions it queued.
    async fn run(&self, route: ActionRoute, value: Value) -> Vec<QueuedDispatch> {
        let transforms = self.registry.transforms_for(&route);
        let asyncs = self.registry.asyncs_for(&route);

        if transforms.is_empty() && asyncs.is_empty() {
            trace!(action = %route.key, "no handlers resolved");
            return Vec::new();
        }
        debug!(
            action = %route.key,
            namespace = %route.namespace,
            transforms = transforms.len(),
            asyncs = asyncs.len(),
            "dispatching"
        );

        let factory = ServiceFactory::new(route.namespace.clone(), Arc::clone(&self.services));

        let committed = if transforms.is_empty() {
            let global_state = self.read_tree();
            Committed {
                state: global_state.get(&route.namespace).cloned().unwrap_or_default(),
                global_state,
                context: Value::Null,
            }
        } else {
            let committed = self.transform_phase(&route, &value, transforms, &factory);
            self.notify(&route, &value, &committed, &factory);
            committed
        };

        if asyncs.is_empty() {
            return Vec::new();
        }

        let dispatcher = Dispatcher::new(route.namespace.clone());
        let ctx = AsyncContext {
            action: route.key,
            namespace: route.namespace,
            state: committed.state,
            global_state: committed.global_state,
            value,
            context: committed.context,
            config: Arc::clone(&self.config),
            factory,
            dispatcher: dispatcher.clone(),
            asyncs: Arc::new(asyncs),
        };

        // The outermost link reports failures itself and always succeeds.
        let _ = (self.async_pipeline)(ctx).await;

        dispatcher.drain()
    }

    /// Run the transforms against a copy of the tree and commit the copy.
    ///
    /// The commit lock is held from copy to commit, so concurrent dispatches
    /// never interleave inside a transform phase. The tree itself is only
    /// locked to copy and to commit: a transform that reads the store sees
    /// the last committed tree instead of blocking.
    fn transform_phase(
        &self,
        route: &ActionRoute,
        value: &Value,
        transforms: Vec<TransformCallback<S>>,
        factory: &ServiceFactory,
    ) -> Committed<S> {
        let _commit = self.commit.lock().unwrap_or_else(PoisonError::into_inner);

        let global_state = self.read_tree();
        let state = global_state.get(&route.namespace).cloned().unwrap_or_default();
        let mut ctx = TransformContext {
            action: route.key.clone(),
            namespace: route.namespace.clone(),
            state,
            global_state,
            value: value.clone(),
            context: Value::Null,
            factory: factory.clone(),
            transforms: Arc::new(transforms),
        };

        // The outermost link reports failures itself and always succeeds.
        let _ = (self.transform_pipeline)(&mut ctx);

        let TransformContext {
            state,
            mut global_state,
            context,
            ..
        } = ctx;
        global_state.insert(route.namespace.clone(), state.clone());
        *self.tree.write().unwrap_or_else(PoisonError::into_inner) = global_state.clone();

        Committed {
            state,
            global_state,
            context,
        }
    }

    /// Call every watcher with its own copy of the committed state. A
    /// failing watcher is reported and the remaining watchers still run.
    fn notify(
        &self,
        route: &ActionRoute,
        value: &Value,
        committed: &Committed<S>,
        factory: &ServiceFactory,
    ) {
        for watcher in self.watchers.snapshot() {
            let ctx = WatchContext {
                namespace: route.namespace.clone(),
                state: committed.state.clone(),
                global_state: committed.global_state.clone(),
            };
            let error = match catch_unwind(AssertUnwindSafe(|| watcher(ctx))) {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => err,
                Err(payload) => StoreError::from_panic(Phase::Watch, payload).into(),
            };
            report(
                &self.error_handler,
                ErrorContext {
                    error,
                    phase: Phase::Watch,
                    action: route.key.clone(),
                    namespace: route.namespace.clone(),
                    state: committed.state.clone(),
                    global_state: committed.global_state.clone(),
                    value: value.clone(),
                    context: committed.context.clone(),
                    factory: factory.clone(),
                },
            );
        }
    }
}
