//! State tree and the copy contract handlers rely on.
//!
//! The engine owns the only mutable tree. Everything handed to a handler or
//! watcher is an owned clone; mutating it has no effect on committed state
//! unless the engine commits that clone itself.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;
use std::ops::Deref;
use std::sync::Arc;

use serde_json::Value;

use crate::namespace::Namespace;

/// Whole state tree: one value per namespace.
pub type GlobalState<S> = BTreeMap<Namespace, S>;

/// A value that can live in a namespace slot of the state tree.
///
/// `Clone` must produce a fully independent copy.
pub trait StateValue: Clone + Default + fmt::Debug + Send + Sync + 'static {
    /// Shallow override: entries of `other` replace entries of `self`.
    fn merge(&mut self, other: Self);
}

impl StateValue for Value {
    fn merge(&mut self, other: Self) {
        match (self, other) {
            (Value::Object(current), Value::Object(incoming)) => current.extend(incoming),
            (slot, incoming) => *slot = incoming,
        }
    }
}

impl<K, V> StateValue for BTreeMap<K, V>
where
    K: Ord + Clone + fmt::Debug + Send + Sync + 'static,
    V: Clone + fmt::Debug + Send + Sync + 'static,
{
    fn merge(&mut self, other: Self) {
        self.extend(other);
    }
}

impl<K, V> StateValue for HashMap<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    V: Clone + fmt::Debug + Send + Sync + 'static,
{
    fn merge(&mut self, other: Self) {
        self.extend(other);
    }
}

/// Read-only copy of a state value.
///
/// Derefs to the value but never hands out `&mut`, so fields cannot be
/// reassigned. Cloning a `Frozen` is cheap; use [`Frozen::to_owned_value`]
/// for a mutable copy.
#[derive(Debug)]
pub struct Frozen<T>(Arc<T>);

impl<T> Frozen<T> {
    pub fn new(value: T) -> Self {
        Self(Arc::new(value))
    }
}

impl<T: Clone> Frozen<T> {
    pub fn to_owned_value(&self) -> T {
        (*self.0).clone()
    }
}

impl<T> Clone for Frozen<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> Deref for Frozen<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: PartialEq> PartialEq<T> for Frozen<T> {
    fn eq(&self, other: &T) -> bool {
        *self.0 == *other
    }
}
