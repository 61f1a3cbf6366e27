//! # Cache construction: partition geometry and sweep cadence.
//!
//! A requested capacity is turned into a *partition geometry* — how
//! many partitions to keep and how many entries each holds. The
//! effective capacity is `partitions × per_partition`, which may round
//! below the request.
//!
//! Two geometry strategies are provided:
//! - **Default (square-root balanced)**: `partitions = ⌊√capacity⌋`,
//!   each holding `⌊capacity / partitions⌋` entries. Eviction then
//!   drops roughly `√capacity` keys at a time.
//! - **Nth-root balanced** ([`CacheBuilder::with_balanced_partitions`]):
//!   `partitions = ⌊capacity^(1/n_root)⌋`, clamped up to a configured
//!   minimum. Roots below 2 mean fewer, larger partitions (coarser
//!   eviction); roots above 2 mean more, smaller partitions (finer
//!   eviction).

use std::marker::PhantomData;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::fifo::FifoCache;

/// How often the background sweeper runs unless overridden.
pub(crate) const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(20);

/// Partition count and per-partition capacity derived from a requested
/// total capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionGeometry {
    /// Maximum number of live partitions.
    pub partitions: usize,
    /// Maximum number of entries per partition.
    pub per_partition: usize,
}

impl PartitionGeometry {
    /// Effective total capacity (`partitions × per_partition`).
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.partitions * self.per_partition
    }
}

/// Maps a requested capacity to a partition geometry.
pub(crate) type GeometryFn = Box<dyn Fn(usize) -> PartitionGeometry + Send + Sync>;

/// Square-root balanced geometry: partition count and partition size
/// stay close to each other.
pub(crate) fn balanced_geometry(capacity: usize) -> PartitionGeometry {
    let partitions = ((capacity as f64).sqrt().floor() as usize).max(1);
    let per_partition = (capacity / partitions).max(1);
    PartitionGeometry {
        partitions,
        per_partition,
    }
}

/// Nth-root geometry with a lower bound on the partition count.
pub(crate) fn nth_root_geometry(n_root: f64, min_partitions: usize) -> GeometryFn {
    Box::new(move |capacity| {
        let raw = (capacity as f64).powf(1.0 / n_root).floor() as usize;
        let partitions = raw.max(min_partitions).max(1);
        let per_partition = (capacity / partitions).max(1);
        PartitionGeometry {
            partitions,
            per_partition,
        }
    })
}

/// Construction-time cache settings.
pub(crate) struct CacheConfig {
    pub geometry: GeometryFn,
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            geometry: Box::new(balanced_geometry),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

/// Builder for [`FifoCache`] with fluent configuration.
///
/// ## Example
/// ```no_run
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
/// use taskmill::FifoCache;
///
/// # async fn build() {
/// let token = CancellationToken::new();
/// let cache: FifoCache<String, u64> = FifoCache::builder(1_000)
///     .with_balanced_partitions(3.0, 4)
///     .with_sweep_interval(Duration::from_secs(5))
///     .build(token.clone());
/// # }
/// ```
pub struct CacheBuilder<K, V> {
    capacity: usize,
    config: CacheConfig,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> CacheBuilder<K, V>
where
    K: Eq + std::hash::Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            config: CacheConfig::default(),
            _marker: PhantomData,
        }
    }

    /// Uses nth-root partition geometry.
    ///
    /// `n_root` should be greater than 1. A root of 2 matches the
    /// default square-root balance; smaller roots produce fewer,
    /// larger partitions; larger roots produce more, smaller ones.
    /// When the computed count falls below `min_partitions`, the
    /// minimum is used instead.
    pub fn with_balanced_partitions(mut self, n_root: f64, min_partitions: usize) -> Self {
        self.config.geometry = nth_root_geometry(n_root, min_partitions);
        self
    }

    /// Sets how often the background sweeper runs (default 20 s).
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    /// Builds the cache and spawns its background sweeper.
    ///
    /// The sweeper runs on the current tokio runtime until `token` is
    /// cancelled.
    pub fn build(self, token: CancellationToken) -> FifoCache<K, V> {
        FifoCache::from_config(self.capacity, self.config, token)
    }
}
