//! Prioritized work queue.
//!
//! Files & responsibilities:
//! - **work.rs**: the work item model — ids, states, the caller-facing
//!   [`WorkSpec`], and [`WorkInfo`] snapshots.
//! - **heap.rs**: the dispatcher's min-heap with in-item position
//!   tracking (O(log n) removal and re-sifting).
//! - **queue.rs**: the public [`WorkQueue`] — intake, dispatcher,
//!   worker pool, error fan-out, stop/break.

mod heap;
mod queue;
mod work;

pub use queue::{WorkQueue, WorkQueueBuilder};
pub use work::{AdjustFn, WorkFn, WorkFuture, WorkId, WorkInfo, WorkSpec, WorkState};
