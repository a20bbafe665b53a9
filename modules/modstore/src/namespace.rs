//! Namespaces and action-key resolution.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Matches any action within the namespace it is registered under.
pub const WILDCARD: &str = "*";

/// Matches every action in every namespace. Never namespace-qualified.
pub const GLOBAL_WILDCARD: &str = "*:*";

/// Partition of state and handler registration.
///
/// The root partition is its own variant, so no user-chosen namespace
/// string can collide with it. Serializes as a plain string, the root as
/// `""`, so a [`GlobalState`](crate::GlobalState) can be a JSON object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Namespace {
    #[default]
    Root,
    Named(String),
}

impl Namespace {
    /// `None` and the empty string both address the root namespace.
    pub fn from_option(namespace: Option<&str>) -> Self {
        match namespace {
            Some(ns) if !ns.is_empty() => Namespace::Named(ns.to_string()),
            _ => Namespace::Root,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Namespace::Root => None,
            Namespace::Named(ns) => Some(ns),
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self, Namespace::Root)
    }

    /// Prefix `key` with this namespace. The global wildcard is left as-is.
    pub fn qualify(&self, key: &str) -> String {
        match self {
            Namespace::Named(ns) if key != GLOBAL_WILDCARD => format!("{ns}:{key}"),
            _ => key.to_string(),
        }
    }

    /// Prefix a service key with this namespace. Service keys have no
    /// wildcards, so every key is prefixed.
    pub fn service_key(&self, key: &str) -> String {
        match self {
            Namespace::Named(ns) => format!("{ns}:{key}"),
            Namespace::Root => key.to_string(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Namespace::Root => f.write_str("<root>"),
            Namespace::Named(ns) => f.write_str(ns),
        }
    }
}

impl From<&str> for Namespace {
    fn from(value: &str) -> Self {
        Namespace::from_option(Some(value))
    }
}

impl From<String> for Namespace {
    fn from(value: String) -> Self {
        if value.is_empty() {
            Namespace::Root
        } else {
            Namespace::Named(value)
        }
    }
}

impl From<Namespace> for String {
    fn from(value: Namespace) -> Self {
        match value {
            Namespace::Root => String::new(),
            Namespace::Named(ns) => ns,
        }
    }
}

/// The handler keys a single dispatch matches against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRoute {
    /// Canonical key, e.g. `nsA:test` or `test`.
    pub key: String,
    pub namespace: Namespace,
    /// `nsA:*` for a namespaced action, `*` at the root.
    pub wildcard: String,
}

impl ActionRoute {
    /// Resolve a dispatched action key.
    ///
    /// The first `:` separates the namespace from the action name. With
    /// `root` set the namespace prefix is stripped and the action addresses
    /// the root namespace.
    pub fn resolve(action: &str, root: bool) -> StoreResult<Self> {
        if action.is_empty() {
            return Err(StoreError::InvalidDispatch);
        }

        let route = match action.split_once(':') {
            Some((ns, name)) if root || ns.is_empty() => Self::root(name),
            Some((ns, _)) => Self {
                key: action.to_string(),
                namespace: Namespace::Named(ns.to_string()),
                wildcard: format!("{ns}:{WILDCARD}"),
            },
            None => Self::root(action),
        };

        if route.key.is_empty() {
            return Err(StoreError::InvalidDispatch);
        }
        Ok(route)
    }

    fn root(name: &str) -> Self {
        Self {
            key: name.to_string(),
            namespace: Namespace::Root,
            wildcard: WILDCARD.to_string(),
        }
    }

    /// Keys to look up, in match order.
    pub fn match_keys(&self) -> [&str; 3] {
        [self.key.as_str(), self.wildcard.as_str(), GLOBAL_WILDCARD]
    }
}
