//! Build-time service instances, looked up per dispatch namespace.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::namespace::Namespace;
use crate::traits::FactoryCallback;

/// A type-erased, shared service instance.
pub type Service = Arc<dyn Any + Send + Sync>;

/// Instances built once per key by [`instantiate`].
pub(crate) type ServiceMap = Arc<HashMap<String, Service>>;

/// Invoke every factory once against the merged configuration.
pub(crate) fn instantiate(factories: BTreeMap<String, FactoryCallback>, config: &Value) -> ServiceMap {
    let services = factories
        .into_iter()
        .map(|(key, factory)| {
            let service = factory(config);
            (key, service)
        })
        .collect();
    Arc::new(services)
}

/// Resolves services for the namespace of the current dispatch.
#[derive(Clone)]
pub struct ServiceFactory {
    namespace: Namespace,
    services: ServiceMap,
}

impl std::fmt::Debug for ServiceFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<_> = self.services.keys().collect();
        keys.sort();
        f.debug_struct("ServiceFactory")
            .field("namespace", &self.namespace)
            .field("services", &keys)
            .finish()
    }
}

impl ServiceFactory {
    pub(crate) fn new(namespace: Namespace, services: ServiceMap) -> Self {
        Self { namespace, services }
    }

    /// Look up `key` in the current namespace first, then at the root.
    pub fn create_service<T: Any + Send + Sync>(&self, key: &str) -> StoreResult<Arc<T>> {
        let service = self.lookup(key).ok_or_else(|| StoreError::ServiceNotFound {
            key: key.to_string(),
        })?;
        Arc::clone(service)
            .downcast::<T>()
            .map_err(|_| StoreError::ServiceTypeMismatch {
                key: key.to_string(),
            })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    fn lookup(&self, key: &str) -> Option<&Service> {
        if let Namespace::Named(_) = self.namespace {
            if let Some(service) = self.services.get(&self.namespace.service_key(key)) {
                return Some(service);
            }
        }
        self.services.get(key)
    }
}
