//! # GuardedMap: a hash map behind a single read-write lock.
//!
//! The simplest shared-map shape that the rest of the crate builds on:
//! every operation takes the lock for exactly as long as it touches the
//! map, readers run concurrently, and snapshot accessors clone their
//! results out so no lock is held while the caller iterates.
//!
//! ## Rules
//! - Lookups on absent keys return `None`/`false`; nothing panics.
//! - [`GuardedMap::get_or_insert`] is atomic against racing writers:
//!   the probe and the insert happen under one write lock, so both
//!   racers observe the single winner.
//! - Snapshot accessors (`keys`, `values`, `copy_to_map`, `translate`)
//!   see one consistent state; iteration order is unspecified.

use std::collections::HashMap;
use std::hash::Hash;

use parking_lot::RwLock;

/// A `HashMap<K, V>` guarded by a [`parking_lot::RwLock`].
///
/// Values are cloned out on read; keep `V` cheap to clone (the crate
/// itself stores `Arc`s, ids, and senders in these maps).
pub struct GuardedMap<K, V> {
    inner: RwLock<HashMap<K, V>>,
}

impl<K, V> GuardedMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Creates an empty map.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Creates an empty map with space reserved for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(HashMap::with_capacity(capacity)),
        }
    }

    /// Returns a clone of the value for `key`, if present.
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.read().get(key).cloned()
    }

    /// Returns the present value for `key`, inserting `value` first if absent.
    ///
    /// Probe and insert run under one write lock; when two callers
    /// race, one wins and both observe the winner's value.
    pub fn get_or_insert(&self, key: K, value: V) -> V {
        let mut map = self.inner.write();
        map.entry(key).or_insert(value).clone()
    }

    /// Inserts or overwrites the value for `key`, returning the
    /// previous value when one was present.
    pub fn set(&self, key: K, value: V) -> Option<V> {
        self.inner.write().insert(key, value)
    }

    /// Inserts `key` only while the map holds fewer than `capacity`
    /// entries; overwrites of a present key always succeed.
    ///
    /// Check and insert share one write lock, so concurrent callers
    /// cannot push the map past `capacity`. Returns the pair back when
    /// there is no room.
    pub fn set_if_room(&self, key: K, value: V, capacity: usize) -> Result<(), (K, V)> {
        let mut map = self.inner.write();
        if map.len() < capacity || map.contains_key(&key) {
            map.insert(key, value);
            Ok(())
        } else {
            Err((key, value))
        }
    }

    /// Removes `key`, returning the removed value if it was present.
    pub fn delete(&self, key: &K) -> Option<V> {
        self.inner.write().remove(key)
    }

    /// Removes `key` only while it still maps to `expected`.
    ///
    /// Compare and remove share one write lock, so a racing writer
    /// that re-owned the key cannot lose its entry to a stale removal.
    /// Returns true when the entry was removed.
    pub fn delete_if_eq(&self, key: &K, expected: &V) -> bool
    where
        V: PartialEq,
    {
        let mut map = self.inner.write();
        match map.get(key) {
            Some(current) if current == expected => {
                map.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Returns true if `key` is present.
    pub fn has(&self, key: &K) -> bool {
        self.inner.read().contains_key(key)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// True if the map holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Snapshot of all keys; order unspecified.
    pub fn keys(&self) -> Vec<K> {
        self.inner.read().keys().cloned().collect()
    }

    /// Snapshot of all values; order unspecified.
    pub fn values(&self) -> Vec<V> {
        self.inner.read().values().cloned().collect()
    }

    /// Calls `f` for each entry under the read lock.
    ///
    /// Returning `false` from `f` stops the iteration. `f` must not
    /// call back into this map (the read lock is held throughout).
    pub fn range<F>(&self, mut f: F)
    where
        F: FnMut(&K, &V) -> bool,
    {
        for (k, v) in self.inner.read().iter() {
            if !f(k, v) {
                break;
            }
        }
    }

    /// Returns a detached copy of the whole map.
    pub fn copy_to_map(&self) -> HashMap<K, V> {
        self.inner.read().clone()
    }

    /// Returns a detached map with every value passed through `translator`.
    pub fn translate<D, F>(&self, translator: F) -> HashMap<K, D>
    where
        F: Fn(&V) -> D,
    {
        self.inner
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), translator(v)))
            .collect()
    }

    /// Removes all entries.
    pub fn clear(&self) {
        self.inner.write().clear();
    }

    /// Removes all entries and re-reserves space for `new_capacity`.
    pub fn clear_and_resize(&self, new_capacity: usize) {
        *self.inner.write() = HashMap::with_capacity(new_capacity);
    }
}

impl<K, V> Default for GuardedMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
