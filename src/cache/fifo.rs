//! # FifoCache: bounded cache with partition-granular FIFO eviction.
//!
//! Layers three pieces from the storage primitives:
//! - a [`FifoStack`] of partitions (each an `Arc<GuardedMap<K, V>>`),
//!   oldest partition first;
//! - a key → partition-id index (`GuardedMap<K, u64>`) giving O(1)
//!   lookups;
//! - an atomic live count.
//!
//! ## Architecture
//! ```text
//! set(k, v)
//!   ├─► key owned by a live partition? ──► overwrite in place
//!   │                                      (eviction order preserved)
//!   ├─► current partition has room? ─────► append + index + count
//!   └─► else: roll fresh partition  ─────► insert, then sweep()
//!
//! sweep()                       get(k)
//!   while partitions > max:       index[k] ─► partitions.peek(id)
//!     pop oldest partition                 └─► partition.get(k)
//!     un-index keys it still owns
//!     count -= un-indexed keys
//! ```
//!
//! ## Rules
//! - Overwriting an existing key keeps it in its original partition:
//!   its eviction order does not reset, and the live count is
//!   unchanged.
//! - Only `delete` and partition eviction decrement the live count.
//! - One sweep runs at a time (sweep mutex); sweeps hold the core
//!   *read* lock, so `get`/`set` into existing partitions proceed
//!   concurrently.
//! - A background sweeper runs every configured interval until the
//!   construction-time [`CancellationToken`] is cancelled; rolling the
//!   current partition also sweeps synchronously.

use std::hash::Hash;
use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::store::{FifoStack, GuardedMap};

use super::config::{CacheBuilder, CacheConfig, GeometryFn, PartitionGeometry};

/// State replaced wholesale by `clear`/`resize`, guarded by the
/// current-partition lock.
struct CacheCore<K, V> {
    partitions: FifoStack<Arc<GuardedMap<K, V>>>,
    index: GuardedMap<K, u64>,
    current_id: u64,
    geometry: PartitionGeometry,
}

struct CacheInner<K, V> {
    /// Current-partition lock: read for lookups and in-place inserts,
    /// write for partition rollover, clear, and resize.
    core: RwLock<CacheCore<K, V>>,
    /// Live (non-evicted, non-deleted) key count.
    count: AtomicI64,
    /// Serializes sweeps.
    sweep_lock: Mutex<()>,
    /// Geometry recalculation for `resize`.
    geometry_fn: GeometryFn,
}

/// Bounded key/value cache evicting whole partitions in FIFO order.
///
/// Cheap to clone (a handle over shared state); all methods take
/// `&self` and are safe to call from any thread or task.
pub struct FifoCache<K, V> {
    inner: Arc<CacheInner<K, V>>,
}

impl<K, V> Clone for FifoCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> FifoCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates a cache with default geometry and sweep cadence.
    ///
    /// Must be called from within a tokio runtime: construction spawns
    /// the background sweeper, which stops when `token` is cancelled.
    pub fn new(token: CancellationToken, capacity: usize) -> Self {
        Self::builder(capacity).build(token)
    }

    /// Returns a builder for custom partition geometry and sweep cadence.
    pub fn builder(capacity: usize) -> CacheBuilder<K, V> {
        CacheBuilder::new(capacity)
    }

    pub(crate) fn from_config(
        capacity: usize,
        config: CacheConfig,
        token: CancellationToken,
    ) -> Self {
        let geometry = (config.geometry)(capacity);
        let inner = Arc::new(CacheInner {
            core: RwLock::new(CacheCore {
                partitions: FifoStack::with_capacity(geometry.partitions),
                index: GuardedMap::new(),
                current_id: 0,
                geometry,
            }),
            count: AtomicI64::new(0),
            sweep_lock: Mutex::new(()),
            geometry_fn: config.geometry,
        });

        let sweeper = Arc::clone(&inner);
        let interval = config.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // the first tick completes immediately; align to one full period
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => sweeper.sweep(),
                    _ = token.cancelled() => break,
                }
            }
        });

        Self { inner }
    }

    /// Effective capacity after geometry rounding
    /// (`partitions × per_partition`; may be below the requested capacity).
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.core.read().geometry.capacity()
    }

    /// The current partition geometry.
    #[must_use]
    pub fn geometry(&self) -> PartitionGeometry {
        self.inner.core.read().geometry
    }

    /// True iff `key` still resolves to a live partition holding it.
    pub fn contains(&self, key: &K) -> bool {
        let core = self.inner.core.read();
        match core.index.get(key) {
            Some(pid) => core
                .partitions
                .peek(pid)
                .map(|p| p.has(key))
                .unwrap_or(false),
            None => false,
        }
    }

    /// Returns the value for `key`, or `None` when absent or evicted.
    pub fn get(&self, key: &K) -> Option<V> {
        let core = self.inner.core.read();
        let pid = core.index.get(key)?;
        core.partitions.peek(pid).ok()?.get(key)
    }

    /// Inserts or overwrites `key`.
    ///
    /// An existing key is overwritten inside the partition that already
    /// owns it, preserving its eviction order and the live count. A new
    /// key goes into the current partition; when that partition is
    /// full, a fresh partition is rolled and a sweep runs before
    /// returning.
    pub fn set(&self, key: K, mut value: V) {
        {
            let core = self.inner.core.read();
            if let Some(pid) = core.index.get(&key) {
                if let Ok(partition) = core.partitions.peek(pid) {
                    partition.set(key, value);
                    return;
                }
            }
            if let Ok(current) = core.partitions.peek(core.current_id) {
                match current.set_if_room(key.clone(), value, core.geometry.per_partition) {
                    Ok(()) => {
                        // the index entry is the count authority: only
                        // a newly created entry counts as a new key
                        if core.index.set(key, core.current_id).is_none() {
                            self.inner.count.fetch_add(1, AtomicOrdering::Relaxed);
                        }
                        return;
                    }
                    Err((_, returned)) => value = returned,
                }
            }
        }
        if self.set_slow(key, value) {
            self.inner.sweep();
        }
    }

    /// Rollover path: insert under the core write lock. Returns true
    /// when a new partition was rolled (caller then sweeps).
    fn set_slow(&self, key: K, mut value: V) -> bool {
        let mut core = self.inner.core.write();

        // another writer may have owned, filled, or rolled meanwhile
        if let Some(pid) = core.index.get(&key) {
            if let Ok(partition) = core.partitions.peek(pid) {
                partition.set(key, value);
                return false;
            }
        }
        if let Ok(current) = core.partitions.peek(core.current_id) {
            match current.set_if_room(key.clone(), value, core.geometry.per_partition) {
                Ok(()) => {
                    if core.index.set(key, core.current_id).is_none() {
                        self.inner.count.fetch_add(1, AtomicOrdering::Relaxed);
                    }
                    return false;
                }
                Err((_, returned)) => value = returned,
            }
        }

        let fresh = Arc::new(GuardedMap::with_capacity(core.geometry.per_partition));
        let id = core.partitions.push(Arc::clone(&fresh));
        core.current_id = id;
        tracing::debug!(partition = id, "rolled new cache partition");

        fresh.set(key.clone(), value);
        if core.index.set(key, id).is_none() {
            self.inner.count.fetch_add(1, AtomicOrdering::Relaxed);
        }
        true
    }

    /// Removes `key` from its partition and the index.
    pub fn delete(&self, key: &K) {
        let core = self.inner.core.read();
        if let Some(pid) = core.index.get(key) {
            if let Ok(partition) = core.partitions.peek(pid) {
                partition.delete(key);
            }
            // removing the index entry is the count authority: exactly
            // one of a racing delete/sweep wins it
            if core.index.delete(key).is_some() {
                self.inner.count.fetch_sub(1, AtomicOrdering::Relaxed);
            }
        }
    }

    /// Number of live keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.count.load(AtomicOrdering::Relaxed).max(0) as usize
    }

    /// True if no live keys remain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of live keys across partitions; order unspecified.
    pub fn keys(&self) -> Vec<K> {
        let core = self.inner.core.read();
        let mut keys = Vec::with_capacity(self.len());
        for partition in core.partitions.values() {
            keys.extend(partition.keys());
        }
        keys
    }

    /// Snapshot of live values across partitions; order unspecified.
    pub fn values(&self) -> Vec<V> {
        let core = self.inner.core.read();
        let mut values = Vec::with_capacity(self.len());
        for partition in core.partitions.values() {
            values.extend(partition.values());
        }
        values
    }

    /// Resets to an empty cache with the same geometry.
    pub fn clear(&self) {
        let mut core = self.inner.core.write();
        core.partitions = FifoStack::with_capacity(core.geometry.partitions);
        core.index.clear();
        self.inner.count.store(0, AtomicOrdering::Relaxed);
        let fresh = Arc::new(GuardedMap::with_capacity(core.geometry.per_partition));
        core.current_id = core.partitions.push(fresh);
    }

    /// Recomputes geometry for `new_capacity` and, when it changes,
    /// migrates entries oldest-partition-first into the resized cache.
    ///
    /// Inserts racing a resize serialize on the current-partition lock;
    /// entries past the new capacity are swept during migration.
    pub fn resize(&self, new_capacity: usize) {
        let next = (self.inner.geometry_fn)(new_capacity);
        let old_partitions = {
            let mut core = self.inner.core.write();
            if next == core.geometry {
                return;
            }
            core.geometry = next;
            let old = std::mem::replace(
                &mut core.partitions,
                FifoStack::with_capacity(next.partitions),
            );
            core.index.clear();
            self.inner.count.store(0, AtomicOrdering::Relaxed);
            let fresh = Arc::new(GuardedMap::with_capacity(next.per_partition));
            core.current_id = core.partitions.push(fresh);
            old
        };

        while let Some(partition) = old_partitions.pop() {
            for (k, v) in partition.copy_to_map() {
                self.set(k, v);
            }
            self.sweep();
        }
    }

    /// Evicts oldest partitions until at most the configured number
    /// remain. Safe to call at any time; also runs on rollover and on
    /// the background cadence.
    pub fn sweep(&self) {
        self.inner.sweep();
    }
}

impl<K, V> CacheInner<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn sweep(&self) {
        let _single_flight = self.sweep_lock.lock();
        let core = self.core.read();
        while core.partitions.len() > core.geometry.partitions {
            let Some((evicted_id, evicted)) = core.partitions.pop_entry() else {
                break;
            };
            // a racing delete or re-insert may have re-owned a key's
            // index entry since the snapshot; only entries still
            // pointing at this partition are the sweep's to remove
            let mut dropped: i64 = 0;
            for key in evicted.keys() {
                if core.index.delete_if_eq(&key, &evicted_id) {
                    dropped += 1;
                }
            }
            self.count.fetch_sub(dropped, AtomicOrdering::Relaxed);
            tracing::debug!(evicted_keys = dropped, "swept oldest cache partition");
        }
    }
}
