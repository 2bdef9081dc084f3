// This module provides the symbol dictionary used for every name table in the front end:
// the global table of declared forms, the per-declaration local tables of formal parameters,
// the pipeline's resource and pipe-class tables, the register tables and the preprocessor
// definitions. Keys are names interned in the session arena, so a dictionary never owns its
// keys and lookups by any &str compare by content. Insertion returns the previous value to
// let callers detect re-declaration, and iteration order is unspecified; callers that need
// declaration order keep a NameList alongside.

//! Hash dictionary keyed by interned names.

use hashbrown::HashMap;

/// Name table keyed by arena-interned strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dict<'a, V> {
    map: HashMap<&'a str, V>,
}

impl<'a, V> Dict<'a, V> {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            map: HashMap::with_capacity(capacity),
        }
    }

    /// Bind `key` to `value`, returning whatever was bound before.
    pub fn insert(&mut self, key: &'a str, value: V) -> Option<V> {
        self.map.insert(key, value)
    }

    /// Bind `key` only if it is unbound. Returns `false` on a duplicate.
    pub fn insert_new(&mut self, key: &'a str, value: V) -> bool {
        if self.map.contains_key(key) {
            return false;
        }
        self.map.insert(key, value);
        true
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.map.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.map.get_mut(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        self.map.remove(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Unordered iteration.
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &V)> + '_ {
        self.map.iter().map(|(k, v)| (*k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.map.keys().copied()
    }
}

impl<'a, V: Copy> Dict<'a, V> {
    /// Copy out the value bound to `key`.
    pub fn lookup(&self, key: &str) -> Option<V> {
        self.map.get(key).copied()
    }
}

impl<V> Default for Dict<'_, V> {
    fn default() -> Self {
        Self::new()
    }
}
