//! Insertion-ordered map with tombstoning.
//!
//! The match maps produced by the sequence dataflow are read by the
//! downstream transform in the order entries were discovered, and an entry
//! can be invalidated ("blotted") after the fact without disturbing the
//! position of the others. A blotted slot stays in the vector as `None`
//! until [`BlotMap::compact`] is called.

use std::hash::Hash;

use rustc_hash::FxHashMap;

/// Map that remembers insertion order and supports in-place removal.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "cache",
    serde(bound(
        serialize = "K: serde::Serialize + Eq + Hash, V: serde::Serialize",
        deserialize = "K: serde::Deserialize<'de> + Eq + Hash, V: serde::Deserialize<'de>"
    ))
)]
pub struct BlotMap<K, V> {
    index: FxHashMap<K, usize>,
    slots: Vec<Option<(K, V)>>,
}

impl<K, V> Default for BlotMap<K, V> {
    fn default() -> Self {
        Self {
            index: FxHashMap::default(),
            slots: Vec::new(),
        }
    }
}

impl<K: Copy + Eq + Hash, V> BlotMap<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite. An overwritten entry keeps its original slot.
    /// Returns the previous value.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        if let Some(&slot) = self.index.get(&key) {
            let old = self.slots[slot].replace((key, value));
            return old.map(|(_, v)| v);
        }
        self.index.insert(key, self.slots.len());
        self.slots.push(Some((key, value)));
        None
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        let &slot = self.index.get(key)?;
        self.slots[slot].as_ref().map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Invalidate `key`. Returns `true` if an entry was removed.
    pub fn blot(&mut self, key: &K) -> bool {
        match self.index.remove(key) {
            Some(slot) => {
                self.slots[slot] = None;
                true
            }
            None => false,
        }
    }

    /// Live entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.slots.iter().flatten().map(|(k, v)| (k, v))
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Drop blotted slots.
    pub fn compact(&mut self) {
        self.slots.retain(Option::is_some);
        self.index.clear();
        for (slot, entry) in self.slots.iter().enumerate() {
            if let Some((k, _)) = entry {
                self.index.insert(*k, slot);
            }
        }
    }

    pub fn clear(&mut self) {
        self.index.clear();
        self.slots.clear();
    }
}

impl<K: Copy + Eq + Hash, V: PartialEq> PartialEq for BlotMap<K, V> {
    /// Two maps are equal when their live entries match in order.
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<K: Copy + Eq + Hash, V: Eq> Eq for BlotMap<K, V> {}

#[cfg(test)]
mod tests;
