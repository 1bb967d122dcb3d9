//! Identity registry shared across courses.
//!
//! A [`SharedRegistry`] holds at most one `Arc<V>` per key. Every course that
//! encounters the same key receives a clone of that `Arc`, so state attached
//! later (memberships, grades, scores) is visible through all of them.
//!
//! Lookup-or-insert takes `&mut self`; a caller that fans fetches out across
//! tasks must put the registry behind a lock and hold it for the whole call.

use std::collections::hash_map::{Entry, HashMap};
use std::hash::Hash;
use std::sync::Arc;

#[derive(Debug)]
pub struct SharedRegistry<K, V> {
    entries: HashMap<K, Arc<V>>,
}

impl<K, V> Default for SharedRegistry<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Copy, V> SharedRegistry<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the instance registered under `key`, creating it with `create`
    /// if absent. The flag is `true` when a new instance was inserted.
    pub fn get_or_insert_with(&mut self, key: K, create: impl FnOnce() -> V) -> (Arc<V>, bool) {
        match self.entries.entry(key) {
            Entry::Occupied(entry) => (Arc::clone(entry.get()), false),
            Entry::Vacant(entry) => (Arc::clone(entry.insert(Arc::new(create()))), true),
        }
    }

    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.entries.get(key).cloned()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = &Arc<V>> {
        self.entries.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &Arc<V>)> {
        self.entries.iter()
    }
}
