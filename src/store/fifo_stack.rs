//! # FifoStack: a FIFO container addressable by assigned id.
//!
//! Each pushed value receives an id from an internal monotonic counter
//! (the first id is 1; 0 is reserved as "no id"). A binary heap keyed
//! by ascending id keeps the oldest entry at the front, so `pop`
//! always returns entries in insertion order while `peek` can still
//! reach any live entry by its id.
//!
//! ## Rules
//! - All operations are thread-safe (one internal read-write lock).
//! - `pop` on an empty stack returns `None`.
//! - `peek` on an unknown id returns [`StoreError::IdNotFound`].
//! - `values` returns a snapshot in insertion order.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use parking_lot::RwLock;

use crate::error::StoreError;

/// One stored value plus its assigned id.
struct Slot<T> {
    id: u64,
    value: T,
}

impl<T> PartialEq for Slot<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Slot<T> {}

impl<T> PartialOrd for Slot<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Slot<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

/// FIFO container with id-addressable entries.
///
/// Backed by a min-heap over assigned ids; the smallest id (oldest
/// entry) is the next popped.
pub struct FifoStack<T> {
    entries: RwLock<BinaryHeap<Reverse<Slot<T>>>>,
    next_id: AtomicU64,
}

impl<T: Clone> FifoStack<T> {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BinaryHeap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Creates an empty stack with space reserved for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(BinaryHeap::with_capacity(capacity)),
            next_id: AtomicU64::new(0),
        }
    }

    /// Pushes `value`, returning its assigned id (ids start at 1).
    pub fn push(&self, value: T) -> u64 {
        let id = self.next_id.fetch_add(1, AtomicOrdering::Relaxed) + 1;
        self.entries.write().push(Reverse(Slot { id, value }));
        id
    }

    /// Removes and returns the oldest entry, or `None` when empty.
    pub fn pop(&self) -> Option<T> {
        self.pop_entry().map(|(_, value)| value)
    }

    /// As [`pop`](Self::pop), additionally returning the entry's
    /// assigned id.
    pub fn pop_entry(&self) -> Option<(u64, T)> {
        self.entries
            .write()
            .pop()
            .map(|slot| (slot.0.id, slot.0.value))
    }

    /// Returns a clone of the entry with the given id.
    ///
    /// Linear scan; the stack is expected to stay small (the cache
    /// holds tens of partitions, not thousands).
    pub fn peek(&self, id: u64) -> Result<T, StoreError> {
        self.entries
            .read()
            .iter()
            .find(|slot| slot.0.id == id)
            .map(|slot| slot.0.value.clone())
            .ok_or(StoreError::IdNotFound { id })
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// True if no entries are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Snapshot of all values in insertion (ascending id) order.
    pub fn values(&self) -> Vec<T> {
        let entries = self.entries.read();
        let mut snapshot: Vec<(u64, T)> = entries
            .iter()
            .map(|slot| (slot.0.id, slot.0.value.clone()))
            .collect();
        drop(entries);
        snapshot.sort_by_key(|(id, _)| *id);
        snapshot.into_iter().map(|(_, v)| v).collect()
    }
}

impl<T: Clone> Default for FifoStack<T> {
    fn default() -> Self {
        Self::new()
    }
}
