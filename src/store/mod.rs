//! Storage primitives shared by the higher-level components.
//!
//! - [`GuardedMap`] — a `HashMap` behind one read-write lock, with
//!   snapshot and bulk helpers. The cache uses it for partitions and
//!   the key index; the queue uses it as the live-work registry; the
//!   publication uses it as the subscriber table.
//! - [`FifoStack`] — a FIFO container whose entries are addressable by
//!   a monotonically assigned id. The cache stores partitions in one,
//!   evicting oldest-first while still reaching any live partition by
//!   id.

mod fifo_stack;
mod guarded_map;

pub use fifo_stack::FifoStack;
pub use guarded_map::GuardedMap;
