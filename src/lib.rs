//! # taskmill
//!
//! **Taskmill** is a small library of concurrent, in-process
//! infrastructure primitives built on tokio.
//!
//! | Area            | Description                                                        | Key types                                  |
//! |-----------------|--------------------------------------------------------------------|--------------------------------------------|
//! | **Work queue**  | Bounded multi-worker scheduler with dynamic priorities.            | [`WorkQueue`], [`WorkSpec`], [`WorkId`]    |
//! | **FIFO cache**  | Bounded cache with partition-granular FIFO eviction and sweeping.  | [`FifoCache`], [`PartitionGeometry`]       |
//! | **Pub/sub**     | Typed fan-out with per-subscriber filters, buffers, and timeouts.  | [`Publication`], [`Subscriber`]            |
//! | **Storage**     | The guarded map and id-addressable FIFO the above are built from.  | [`GuardedMap`], [`FifoStack`]              |
//! | **Resolution**  | Process-wide registry mapping raw errors to domain errors.         | [`TypedResolver`], [`resolve_error`]       |
//! | **Stack traces**| Frame capture backing the resolver's call-site constraints.        | [`StackTrace`]                             |
//!
//! ## Example
//! ```no_run
//! use taskmill::{WorkError, WorkQueue, WorkSpec};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let queue = WorkQueue::builder().with_workers(2).build();
//!     let mut failures = queue.errors();
//!
//!     queue
//!         .enqueue(
//!             WorkSpec::new(|| async {
//!                 // do work...
//!                 Ok::<(), WorkError>(())
//!             })
//!             .with_name("warm-caches")
//!             .with_priority(2),
//!         )
//!         .await;
//!
//!     tokio::spawn(async move {
//!         while let Some(err) = failures.recv().await {
//!             eprintln!("work failed: {err}");
//!         }
//!     });
//!
//!     queue.stop();
//! }
//! ```
//!
//! ## Design notes
//! - Every background loop (queue dispatcher, error fan-out, cache
//!   sweeper) is terminated by a
//!   [`CancellationToken`](tokio_util::sync::CancellationToken), never
//!   aborted.
//! - Failures from units of work never surface at the enqueue site;
//!   they fan out to [`WorkQueue::errors`] subscribers.
//! - All shared state sits behind a lock, an atomic, or a channel; no
//!   API panics on absent keys or unknown ids.

mod cache;
mod error;
mod pubsub;
mod queue;
mod store;

pub mod resolve;
pub mod trace;

// ---- Public re-exports ----

pub use cache::{CacheBuilder, FifoCache, PartitionGeometry};
pub use error::{BoxError, QueueError, ResolvedError, StoreError, WorkError};
pub use pubsub::{Publication, SubscribeOptions, Subscriber};
pub use queue::{
    AdjustFn, WorkFn, WorkFuture, WorkId, WorkInfo, WorkQueue, WorkQueueBuilder, WorkSpec,
    WorkState,
};
pub use resolve::{clear_resolvers, register_resolver, resolve_error, set_default_resolver};
pub use resolve::{Resolve, TypedResolver};
pub use store::{FifoStack, GuardedMap};
pub use trace::{Frame, StackTrace};
