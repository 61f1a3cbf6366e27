//! # Work item model: ids, states, specs, and snapshots.
//!
//! - **[`WorkId`]** — opaque monotonic identity assigned at enqueue.
//! - **[`WorkState`]** — `Queued` (in the heap or in flight to a
//!   worker) or `InProgress` (a worker picked it up).
//! - **[`WorkSpec`]** — what the caller hands to
//!   [`WorkQueue::enqueue`](crate::WorkQueue::enqueue): the async unit
//!   of work plus name, priority, and an optional priority adjuster.
//! - **[`WorkInfo`]** — a point-in-time snapshot of a live item, as
//!   returned by [`WorkQueue::work_items`](crate::WorkQueue::work_items).
//! - `WorkItem` (crate-private) — the shared record tracked by the
//!   registry and the priority heap.
//!
//! ## Rules
//! - Lower priority numbers are more urgent; the default is 1.
//! - A priority adjuster is called from the dispatcher between
//!   dispatches: it must be short, non-blocking, and must not touch
//!   the queue it serves.
//! - The unit of work runs at most once; the closure is consumed by
//!   the worker that executes it.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicI64, AtomicU8, Ordering as AtomicOrdering};

use parking_lot::Mutex;

use crate::error::WorkError;

/// Boxed future produced by a unit of work.
///
/// - **Boxed**: stored behind a trait object until a worker runs it
/// - **Pinned**: required for async futures
/// - **Send**: work executes on runtime worker threads
pub type WorkFuture = Pin<Box<dyn Future<Output = Result<(), WorkError>> + Send + 'static>>;

/// One-shot unit of work: invoked once by a worker, yielding a future.
pub type WorkFn = Box<dyn FnOnce() -> WorkFuture + Send + 'static>;

/// Priority adjuster: re-read between dispatches to obtain the
/// currently intended priority for a queued item.
pub type AdjustFn = Box<dyn Fn() -> i64 + Send + Sync + 'static>;

/// Opaque identity of an enqueued unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkId(pub(crate) u64);

impl fmt::Display for WorkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a live work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkState {
    /// Accepted and waiting for a worker.
    Queued = 0,
    /// Picked up by a worker; no longer removable or reprioritizable.
    InProgress = 1,
}

impl fmt::Display for WorkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkState::Queued => f.write_str("Queued"),
            WorkState::InProgress => f.write_str("In Progress"),
        }
    }
}

/// Specification of a unit of work to enqueue.
///
/// ## Example
/// ```
/// use taskmill::{WorkError, WorkSpec};
///
/// let spec = WorkSpec::new(|| async { Ok::<(), WorkError>(()) })
///     .with_name("refresh-index")
///     .with_priority(3);
/// assert_eq!(spec.name(), "refresh-index");
/// ```
pub struct WorkSpec {
    name: String,
    priority: i64,
    adjuster: Option<AdjustFn>,
    work: WorkFn,
}

impl WorkSpec {
    /// Wraps an async closure as a unit of work (priority defaults to 1).
    pub fn new<F, Fut>(work: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), WorkError>> + Send + 'static,
    {
        Self {
            name: String::new(),
            priority: 1,
            adjuster: None,
            work: Box::new(move || Box::pin(work())),
        }
    }

    /// Sets a display name used in snapshots and logs.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the scheduling priority. Lower numbers run first.
    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    /// Attaches a priority adjuster, letting the item's priority be
    /// re-read while it waits in the queue.
    pub fn with_adjuster<F>(mut self, adjuster: F) -> Self
    where
        F: Fn() -> i64 + Send + Sync + 'static,
    {
        self.adjuster = Some(Box::new(adjuster));
        self
    }

    /// The configured display name (may be empty).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The configured priority.
    pub fn priority(&self) -> i64 {
        self.priority
    }
}

/// Point-in-time snapshot of a live work item.
#[derive(Debug, Clone)]
pub struct WorkInfo {
    /// Identity assigned at enqueue.
    pub id: WorkId,
    /// Display name (may be empty).
    pub name: String,
    /// Priority at snapshot time.
    pub priority: i64,
    /// State at snapshot time.
    pub state: WorkState,
}

/// Shared record of a live work item.
///
/// Tracked by the registry from enqueue until completion, dequeue, or
/// discard; also referenced by the heap while queued. Priority and
/// heap position are atomics because the dispatcher mutates them while
/// snapshots read concurrently.
pub(crate) struct WorkItem {
    id: WorkId,
    name: String,
    priority: AtomicI64,
    /// Index within the heap; -1 while not stored there.
    position: AtomicI64,
    state: AtomicU8,
    adjuster: Option<AdjustFn>,
    work: Mutex<Option<WorkFn>>,
}

impl WorkItem {
    pub(crate) fn new(id: WorkId, spec: WorkSpec) -> Self {
        Self {
            id,
            name: spec.name,
            priority: AtomicI64::new(spec.priority),
            position: AtomicI64::new(-1),
            state: AtomicU8::new(WorkState::Queued as u8),
            adjuster: spec.adjuster,
            work: Mutex::new(Some(spec.work)),
        }
    }

    pub(crate) fn id(&self) -> WorkId {
        self.id
    }

    pub(crate) fn priority(&self) -> i64 {
        self.priority.load(AtomicOrdering::Relaxed)
    }

    pub(crate) fn set_priority(&self, priority: i64) {
        self.priority.store(priority, AtomicOrdering::Relaxed);
    }

    pub(crate) fn position(&self) -> i64 {
        self.position.load(AtomicOrdering::Relaxed)
    }

    pub(crate) fn set_position(&self, position: i64) {
        self.position.store(position, AtomicOrdering::Relaxed);
    }

    pub(crate) fn state(&self) -> WorkState {
        match self.state.load(AtomicOrdering::Relaxed) {
            0 => WorkState::Queued,
            _ => WorkState::InProgress,
        }
    }

    pub(crate) fn set_state(&self, state: WorkState) {
        self.state.store(state as u8, AtomicOrdering::Relaxed);
    }

    pub(crate) fn adjuster(&self) -> Option<&AdjustFn> {
        self.adjuster.as_ref()
    }

    /// Takes the unit of work out of the item; subsequent calls return
    /// `None`.
    pub(crate) fn take_work(&self) -> Option<WorkFn> {
        self.work.lock().take()
    }

    pub(crate) fn snapshot(&self) -> WorkInfo {
        WorkInfo {
            id: self.id,
            name: self.name.clone(),
            priority: self.priority(),
            state: self.state(),
        }
    }
}
