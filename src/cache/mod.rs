//! Partitioned FIFO cache.
//!
//! A bounded key/value cache whose eviction unit is a whole
//! *partition* rather than a single key. Keys are inserted into the
//! current partition; once it fills, a fresh partition becomes
//! current; once the partition count exceeds the configured maximum,
//! the oldest partition is dropped whole, evicting every key it still
//! owns.
//!
//! This trades exact LRU-style ordering for cheap bookkeeping:
//! - O(1) insert (append to the current partition),
//! - O(1) lookup (key → partition index),
//! - O(partition) eviction, amortized over many inserts.
//!
//! Entry points: [`FifoCache::new`] for defaults, [`FifoCache::builder`]
//! for custom partition geometry and sweep cadence.

mod config;
mod fifo;

pub use config::{CacheBuilder, PartitionGeometry};
pub use fifo::FifoCache;
