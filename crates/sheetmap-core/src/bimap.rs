//! Bidirectional map
//!
//! A one-to-one key/value store that answers lookups in both directions.
//! Used for header caption ↔ column index resolution. Shared strings are
//! not kept here: a loaded table may repeat a string under several indices,
//! which a one-to-one map cannot hold.

use std::fmt::Debug;
use std::hash::Hash;

use ahash::AHashMap;

use crate::error::{Error, Result};

/// One-to-one map with reverse lookup
#[derive(Debug, Clone)]
pub struct BiMap<K, V> {
    forward: AHashMap<K, V>,
    reverse: AHashMap<V, K>,
}

impl<K, V> BiMap<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Eq + Hash + Clone + Debug,
{
    /// Create an empty map
    pub fn new() -> Self {
        Self {
            forward: AHashMap::new(),
            reverse: AHashMap::new(),
        }
    }

    /// Create an empty map with room for `capacity` pairs
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            forward: AHashMap::with_capacity(capacity),
            reverse: AHashMap::with_capacity(capacity),
        }
    }

    /// Insert a pair.
    ///
    /// Fails without modifying the map if either side is already present.
    pub fn insert(&mut self, key: K, value: V) -> Result<()> {
        if self.forward.contains_key(&key) {
            return Err(Error::DuplicateKey(format!("{:?}", key)));
        }
        if self.reverse.contains_key(&value) {
            return Err(Error::DuplicateValue(format!("{:?}", value)));
        }
        self.forward.insert(key.clone(), value.clone());
        self.reverse.insert(value, key);
        Ok(())
    }

    /// Forward lookup
    pub fn get(&self, key: &K) -> Option<&V> {
        self.forward.get(key)
    }

    /// Reverse lookup: the key stored for `value`, if any
    pub fn get_key(&self, value: &V) -> Option<&K> {
        self.reverse.get(value)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.forward.contains_key(key)
    }

    pub fn contains_value(&self, value: &V) -> bool {
        self.reverse.contains_key(value)
    }

    /// Number of pairs
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Iterate over pairs in unspecified order
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.forward.iter()
    }
}

impl<K, V> Default for BiMap<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Eq + Hash + Clone + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}
