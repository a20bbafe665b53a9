//! Handler registry: qualified action key → ordered callbacks.

use std::collections::HashMap;

use crate::namespace::ActionRoute;
use crate::traits::{AsyncCallback, TransformCallback};

/// Transforms and async handlers keyed by qualified action key.
///
/// Registering under an existing key appends; nothing is ever replaced.
pub struct HandlerRegistry<S> {
    transforms: HashMap<String, Vec<TransformCallback<S>>>,
    asyncs: HashMap<String, Vec<AsyncCallback<S>>>,
}

impl<S> Default for HandlerRegistry<S> {
    fn default() -> Self {
        Self {
            transforms: HashMap::new(),
            asyncs: HashMap::new(),
        }
    }
}

impl<S> HandlerRegistry<S> {
    pub fn add_transform(&mut self, key: String, callback: TransformCallback<S>) {
        self.transforms.entry(key).or_default().push(callback);
    }

    pub fn add_async(&mut self, key: String, callback: AsyncCallback<S>) {
        self.asyncs.entry(key).or_default().push(callback);
    }

    /// Transforms matching `route`: exact key, namespace wildcard, then
    /// global wildcard. A handler under several matching keys appears once
    /// per key.
    pub fn transforms_for(&self, route: &ActionRoute) -> Vec<TransformCallback<S>> {
        collect(&self.transforms, route)
    }

    pub fn asyncs_for(&self, route: &ActionRoute) -> Vec<AsyncCallback<S>> {
        collect(&self.asyncs, route)
    }

    pub fn transform_count(&self) -> usize {
        self.transforms.values().map(Vec::len).sum()
    }

    pub fn async_count(&self) -> usize {
        self.asyncs.values().map(Vec::len).sum()
    }
}

fn collect<H: Clone>(handlers: &HashMap<String, Vec<H>>, route: &ActionRoute) -> Vec<H> {
    route
        .match_keys()
        .into_iter()
        .filter_map(|key| handlers.get(key))
        .flatten()
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::context::TransformContext;
    use crate::namespace::Namespace;

    fn noop() -> TransformCallback<()> {
        Arc::new(|_: &mut TransformContext<()>| Ok(()))
    }

    fn registry(keys: &[&str]) -> HandlerRegistry<()> {
        let mut registry = HandlerRegistry::default();
        for key in keys {
            registry.add_transform(key.to_string(), noop());
        }
        registry
    }

    fn count(registry: &HandlerRegistry<()>, action: &str) -> usize {
        let route = ActionRoute::resolve(action, false).unwrap();
        registry.transforms_for(&route).len()
    }

    #[test]
    fn exact_and_global_wildcard_match_root_action() {
        let registry = registry(&["test", "*:*", "nsA:*"]);
        assert_eq!(count(&registry, "test"), 2);
    }

    #[test]
    fn namespace_wildcard_is_scoped() {
        let registry = registry(&["nsA:*"]);
        assert_eq!(count(&registry, "nsA:test"), 1);
        assert_eq!(count(&registry, "nsB:test"), 0);
        assert_eq!(count(&registry, "test"), 0);
    }

    #[test]
    fn root_wildcard_matches_root_actions_only() {
        let registry = registry(&["*"]);
        assert_eq!(count(&registry, "unknown"), 1);
        assert_eq!(count(&registry, "nsA:unknown"), 0);
    }

    #[test]
    fn registrations_accumulate() {
        let registry = registry(&["inc", "inc", "*:*"]);
        assert_eq!(count(&registry, "inc"), 3);
        assert_eq!(registry.transform_count(), 3);
    }

    #[test]
    fn qualified_keys_line_up_with_resolution() {
        let ns = Namespace::from("nsA");
        let test = ns.qualify("test");
        let global = ns.qualify("*:*");
        let registry = registry(&[test.as_str(), global.as_str()]);
        assert_eq!(count(&registry, "nsA:test"), 2);
        assert_eq!(count(&registry, "nsB:other"), 1);
    }
}
