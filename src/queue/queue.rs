//! # WorkQueue: bounded multi-worker scheduler with priorities.
//!
//! Accepts units of work, runs them across a fixed worker pool, and
//! keeps everything waiting in a priority heap that can be reshaped
//! while items wait (dynamic re-prioritization, cancellation of queued
//! items). Failures never propagate to the enqueuer; they fan out on
//! an error channel to any number of subscribers.
//!
//! ## Architecture
//! ```text
//! enqueue(spec) ──► [intake channel] ──► dispatcher ──► [worker channel] ──► workers
//!                                            │   ▲                            │
//!                                            ▼   │ completion                 │
//!                                        WorkHeap └────────────────────◄──────┤
//!                                     (bounded by                             │ errors
//!                                      queue_length)                          ▼
//!                                                        fan-out ──► every errors() subscriber
//! ```
//!
//! ## Dispatch rules
//! - Heap empty + idle worker: incoming work goes straight to the
//!   worker channel (fast path).
//! - Heap below `queue_length`: incoming work is heap-ordered by
//!   priority (lower number first).
//! - Heap full: the dispatcher waits for a worker completion,
//!   re-adjusts priorities, hands out the minimum, then queues the
//!   newcomer — so producers feel backpressure only when both the
//!   heap and the intake channel are full.
//! - Every dispatch from the heap is preceded by an adjuster pass, so
//!   the next item handed out reflects current priorities.
//! - Handing an item toward a worker (fast path or heap pop) marks it
//!   InProgress at the handoff; from that point `dequeue` and
//!   `set_priority` refuse it. An item a dequeue reaches first never
//!   executes — taking the unit of work out of the item settles the
//!   race.
//!
//! ## Shutdown
//! - [`WorkQueue::stop`]: no new work is accepted; the dispatcher
//!   exits and everything still queued drains to the workers.
//! - [`WorkQueue::break_off`]: as `stop`, but queued work is discarded.
//! - Running work is never interrupted by either.
//! - Dropping the queue behaves like `stop`.

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;

use crate::error::{QueueError, WorkError};
use crate::store::GuardedMap;

use super::heap::WorkHeap;
use super::work::{WorkId, WorkInfo, WorkItem, WorkSpec, WorkState};

/// Buffer size of channels handed out by [`WorkQueue::errors`].
const ERROR_SUBSCRIBER_BUFFER: usize = 16;

type Registry = GuardedMap<WorkId, Arc<WorkItem>>;
type ErrorSubscribers = Mutex<Vec<mpsc::Sender<WorkError>>>;

/// Builder for [`WorkQueue`] with fluent configuration.
pub struct WorkQueueBuilder {
    workers: usize,
    queue_length: Option<usize>,
}

impl WorkQueueBuilder {
    fn new() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            workers,
            queue_length: None,
        }
    }

    /// Sets the worker pool size (default: available parallelism).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Sets how many items the priority heap may hold before producers
    /// feel backpressure (default: 2 × workers).
    pub fn with_queue_length(mut self, queue_length: usize) -> Self {
        self.queue_length = Some(queue_length);
        self
    }

    /// Builds the queue and spawns its dispatcher, workers, and error
    /// fan-out on the current tokio runtime.
    pub fn build(self) -> WorkQueue {
        let workers = self.workers;
        let queue_length = Arc::new(AtomicUsize::new(self.queue_length.unwrap_or(workers * 2)));
        let heap = Arc::new(WorkHeap::new());
        let registry: Arc<Registry> = Arc::new(GuardedMap::new());
        let error_subs: Arc<ErrorSubscribers> = Arc::new(Mutex::new(Vec::new()));
        let broken = Arc::new(AtomicBool::new(false));
        let token = CancellationToken::new();

        let (work_tx, work_rx) = mpsc::channel(1);
        let (worker_tx, worker_rx) = mpsc::channel(workers);
        let (done_tx, done_rx) = mpsc::channel(workers);
        let (err_tx, err_rx) = mpsc::channel(1);

        let shared_rx = Arc::new(AsyncMutex::new(worker_rx));
        for _ in 0..workers {
            tokio::spawn(worker_loop(
                Arc::clone(&shared_rx),
                err_tx.clone(),
                Arc::clone(&registry),
                done_tx.clone(),
            ));
        }

        tokio::spawn(fan_out_loop(err_rx, Arc::clone(&error_subs), token.clone()));

        let dispatcher = Dispatcher {
            work_rx,
            done_rx,
            worker_tx,
            heap: Arc::clone(&heap),
            registry: Arc::clone(&registry),
            queue_length: Arc::clone(&queue_length),
            broken: Arc::clone(&broken),
            token: token.clone(),
        };
        tokio::spawn(dispatcher.run());

        WorkQueue {
            worker_count: workers,
            queue_length,
            next_id: AtomicU64::new(0),
            work_tx,
            heap,
            registry,
            error_subs,
            stopped: AtomicBool::new(false),
            broken,
            token,
        }
    }
}

/// Bounded multi-worker scheduler with dynamic priorities.
///
/// ## Example
/// ```no_run
/// use taskmill::{WorkError, WorkQueue, WorkSpec};
///
/// # async fn run() {
/// let queue = WorkQueue::builder().with_workers(4).build();
/// let mut failures = queue.errors();
///
/// let id = queue
///     .enqueue(
///         WorkSpec::new(|| async { Err(WorkError::fail("boom")) })
///             .with_name("doomed")
///             .with_priority(2),
///     )
///     .await;
/// let _ = id;
///
/// if let Some(err) = failures.recv().await {
///     eprintln!("work failed: {err}");
/// }
/// queue.stop();
/// # }
/// ```
pub struct WorkQueue {
    worker_count: usize,
    queue_length: Arc<AtomicUsize>,
    next_id: AtomicU64,
    work_tx: mpsc::Sender<Arc<WorkItem>>,
    heap: Arc<WorkHeap>,
    registry: Arc<Registry>,
    error_subs: Arc<ErrorSubscribers>,
    stopped: AtomicBool,
    broken: Arc<AtomicBool>,
    token: CancellationToken,
}

impl WorkQueue {
    /// Returns a builder; [`WorkQueueBuilder::build`] must run inside a
    /// tokio runtime.
    pub fn builder() -> WorkQueueBuilder {
        WorkQueueBuilder::new()
    }

    /// Queue with default configuration.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Submits a unit of work; never fails.
    ///
    /// Returns the assigned [`WorkId`] (also when the queue is stopped,
    /// in which case the work is silently rejected). Suspends while the
    /// intake channel is full — the backpressure point when both the
    /// heap and the workers are saturated.
    pub async fn enqueue(&self, spec: WorkSpec) -> WorkId {
        let id = WorkId(self.next_id.fetch_add(1, AtomicOrdering::Relaxed) + 1);
        if self.stopped.load(AtomicOrdering::Relaxed) {
            return id;
        }

        let item = Arc::new(WorkItem::new(id, spec));
        self.registry.set(id, Arc::clone(&item));
        if self.work_tx.send(item).await.is_err() {
            // dispatcher already gone; the item will never run
            self.registry.delete(&id);
        }
        id
    }

    /// Removes a queued item so it never runs.
    ///
    /// Succeeds only while the item can still be withdrawn: waiting in
    /// the priority heap, or still in flight to the dispatcher. An
    /// `Ok` return means the work will not execute. Once the item has
    /// been committed toward a worker the call fails with
    /// [`QueueError::DequeueInProgress`]. Unknown ids are a no-op.
    pub fn dequeue(&self, id: WorkId) -> Result<(), QueueError> {
        let Some(item) = self.registry.get(&id) else {
            return Ok(());
        };
        match item.state() {
            WorkState::Queued => {
                if self.heap.remove_item(&item) {
                    self.heap.adjust_priorities();
                    self.registry.delete(&id);
                    return Ok(());
                }
                // not in the heap: in flight between the intake and a
                // worker; taking the unit of work decides the race —
                // whoever takes it owns the item's fate
                if item.take_work().is_some() {
                    self.registry.delete(&id);
                    Ok(())
                } else {
                    Err(QueueError::DequeueInProgress { id })
                }
            }
            WorkState::InProgress => Err(QueueError::DequeueInProgress { id }),
        }
    }

    /// Rewrites the priority of a queued item and re-heapifies.
    ///
    /// Fails with [`QueueError::ReprioritizeInProgress`] once a worker
    /// has picked the item up. Unknown ids are a no-op.
    pub fn set_priority(&self, id: WorkId, priority: i64) -> Result<(), QueueError> {
        let Some(item) = self.registry.get(&id) else {
            return Ok(());
        };
        match item.state() {
            WorkState::Queued => {
                item.set_priority(priority);
                self.heap.fix_item(&item);
                self.heap.adjust_priorities();
                Ok(())
            }
            WorkState::InProgress => Err(QueueError::ReprioritizeInProgress { id }),
        }
    }

    /// Snapshot of every live item (queued or in progress).
    pub fn work_items(&self) -> Vec<WorkInfo> {
        self.registry.values().iter().map(|i| i.snapshot()).collect()
    }

    /// Returns a fresh channel receiving every future work error.
    ///
    /// Each call allocates an independent subscription; all
    /// subscribers receive every error. With no subscribers, errors
    /// are dropped.
    pub fn errors(&self) -> mpsc::Receiver<WorkError> {
        let (tx, rx) = mpsc::channel(ERROR_SUBSCRIBER_BUFFER);
        self.error_subs.lock().push(tx);
        rx
    }

    /// Stops accepting work; everything already queued still runs.
    pub fn stop(&self) {
        self.stopped.store(true, AtomicOrdering::Relaxed);
        self.token.cancel();
    }

    /// Stops accepting work and discards everything still queued.
    pub fn break_off(&self) {
        self.broken.store(true, AtomicOrdering::Relaxed);
        self.stop();
    }

    /// Changes the heap bound; takes effect on the next insertion
    /// decision.
    pub fn resize_queue_length(&self, queue_length: usize) {
        self.queue_length
            .store(queue_length, AtomicOrdering::Relaxed);
    }

    /// Size of the worker pool.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Current heap bound.
    #[must_use]
    pub fn queue_length(&self) -> usize {
        self.queue_length.load(AtomicOrdering::Relaxed)
    }

    /// True once [`stop`](Self::stop) or [`break_off`](Self::break_off)
    /// has been called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(AtomicOrdering::Relaxed)
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WorkQueue {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Single task deciding what runs next.
struct Dispatcher {
    work_rx: mpsc::Receiver<Arc<WorkItem>>,
    done_rx: mpsc::Receiver<()>,
    worker_tx: mpsc::Sender<Arc<WorkItem>>,
    heap: Arc<WorkHeap>,
    registry: Arc<Registry>,
    queue_length: Arc<AtomicUsize>,
    broken: Arc<AtomicBool>,
    token: CancellationToken,
}

impl Dispatcher {
    async fn run(mut self) {
        loop {
            tokio::select! {
                incoming = self.work_rx.recv() => match incoming {
                    Some(item) => self.on_incoming(item).await,
                    None => break,
                },
                completion = self.done_rx.recv() => {
                    if completion.is_some() && !self.heap.is_empty() {
                        self.dispatch_next().await;
                    }
                }
                _ = self.token.cancelled() => break,
            }
        }
        self.drain().await;
    }

    async fn on_incoming(&mut self, mut item: Arc<WorkItem>) {
        // fast path: nothing queued ahead and a worker slot is free;
        // the state flips before the send so a racing dequeue never
        // treats a committed item as withdrawable
        if self.heap.is_empty() {
            item.set_state(WorkState::InProgress);
            match self.worker_tx.try_send(item) {
                Ok(()) => return,
                Err(mpsc::error::TrySendError::Full(back))
                | Err(mpsc::error::TrySendError::Closed(back)) => {
                    back.set_state(WorkState::Queued);
                    item = back;
                }
            }
        }

        if self.heap.len() < self.queue_length.load(AtomicOrdering::Relaxed) {
            self.heap.push(item);
            return;
        }

        // heap full: free a slot by waiting out one completion, hand
        // the current minimum to a worker, then queue the newcomer
        tracing::trace!("work heap full; waiting for a free worker");
        tokio::select! {
            completion = self.done_rx.recv() => {
                if completion.is_some() {
                    self.dispatch_next().await;
                }
            }
            _ = self.token.cancelled() => {}
        }
        self.heap.push(item);
    }

    /// Adjusts priorities, pops the minimum, hands it to a worker.
    async fn dispatch_next(&mut self) {
        self.heap.adjust_priorities();
        if let Some(next) = self.heap.pop() {
            let _ = self.worker_tx.send(next).await;
        }
    }

    /// Post-loop cleanup: flush the intake, then either deliver or
    /// discard whatever the heap still holds.
    async fn drain(mut self) {
        while let Ok(item) = self.work_rx.try_recv() {
            if self.broken.load(AtomicOrdering::Relaxed) {
                self.registry.delete(&item.id());
            } else {
                self.heap.push(item);
            }
        }

        if self.broken.load(AtomicOrdering::Relaxed) {
            let mut discarded = 0usize;
            while let Some(item) = self.heap.pop() {
                self.registry.delete(&item.id());
                discarded += 1;
            }
            if discarded > 0 {
                tracing::debug!(discarded, "queue broken; dropped queued work");
            }
            return;
        }

        self.heap.adjust_priorities();
        while let Some(item) = self.heap.pop() {
            let _ = self.worker_tx.send(item).await;
        }
    }
}

/// One of `worker_count` identical loops pulling from the shared
/// worker channel until it closes.
async fn worker_loop(
    shared_rx: Arc<AsyncMutex<mpsc::Receiver<Arc<WorkItem>>>>,
    err_tx: mpsc::Sender<WorkError>,
    registry: Arc<Registry>,
    done_tx: mpsc::Sender<()>,
) {
    loop {
        let item = { shared_rx.lock().await.recv().await };
        let Some(item) = item else { break };

        item.set_state(WorkState::InProgress);
        // a dequeue may have neutralized the item while it was in
        // flight; an empty slot means there is nothing left to run
        if let Some(work) = item.take_work() {
            match std::panic::AssertUnwindSafe(work()).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    let _ = err_tx.send(err).await;
                }
                Err(payload) => {
                    let reason = panic_reason(payload.as_ref());
                    tracing::warn!(id = %item.id(), %reason, "unit of work panicked");
                    let _ = err_tx.send(WorkError::Panicked { reason }).await;
                }
            }
        }
        registry.delete(&item.id());
        let _ = done_tx.send(()).await;
    }
}

/// Forwards each work error to every subscriber; exits on cancellation
/// or when the last worker hangs up.
async fn fan_out_loop(
    mut err_rx: mpsc::Receiver<WorkError>,
    subscribers: Arc<ErrorSubscribers>,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            received = err_rx.recv() => match received {
                Some(err) => {
                    let targets: Vec<mpsc::Sender<WorkError>> = subscribers.lock().clone();
                    for tx in targets {
                        let _ = tx.send(err.clone()).await;
                    }
                }
                None => break,
            },
            _ = token.cancelled() => break,
        }
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use tokio::sync::Notify;
    use tokio::time::timeout;

    use super::*;

    async fn wait_until<F: Fn() -> bool>(cond: F) {
        timeout(Duration::from_secs(5), async {
            while !cond() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn performs_all_enqueued_work() {
        let queue = WorkQueue::builder().with_workers(4).build();
        let completed = Arc::new(AtomicUsize::new(0));

        for i in 0..100 {
            let completed = Arc::clone(&completed);
            queue
                .enqueue(
                    WorkSpec::new(move || async move {
                        completed.fetch_add(1, AtomicOrdering::Relaxed);
                        Ok(())
                    })
                    .with_priority((i % 2) as i64),
                )
                .await;
        }

        wait_until(|| completed.load(AtomicOrdering::Relaxed) == 100).await;
        wait_until(|| queue.work_items().is_empty()).await;
    }

    #[tokio::test]
    async fn errors_fan_out_to_every_subscriber() {
        let queue = WorkQueue::builder().with_workers(2).build();
        let mut sub_a = queue.errors();
        let mut sub_b = queue.errors();

        for i in 1..=100u32 {
            queue
                .enqueue(WorkSpec::new(move || async move {
                    if i % 20 == 0 {
                        Err(WorkError::fail(format!("call {i}")))
                    } else {
                        Ok(())
                    }
                }))
                .await;
        }

        for _ in 0..5 {
            assert!(timeout(Duration::from_secs(5), sub_a.recv())
                .await
                .expect("subscriber a starved")
                .is_some());
            assert!(timeout(Duration::from_secs(5), sub_b.recv())
                .await
                .expect("subscriber b starved")
                .is_some());
        }
    }

    #[tokio::test]
    async fn panicking_work_is_reported_not_fatal() {
        let queue = WorkQueue::builder().with_workers(1).build();
        let mut errors = queue.errors();
        let completed = Arc::new(AtomicUsize::new(0));

        queue
            .enqueue(WorkSpec::new(|| async { panic!("kaboom") }))
            .await;
        let done = Arc::clone(&completed);
        queue
            .enqueue(WorkSpec::new(move || async move {
                done.fetch_add(1, AtomicOrdering::Relaxed);
                Ok(())
            }))
            .await;

        let err = timeout(Duration::from_secs(5), errors.recv())
            .await
            .expect("no error delivered")
            .expect("channel closed");
        assert!(matches!(err, WorkError::Panicked { .. }));
        assert!(err.to_string().contains("kaboom"));

        // the worker survived the panic and ran the next item
        wait_until(|| completed.load(AtomicOrdering::Relaxed) == 1).await;
    }

    #[tokio::test]
    async fn dequeue_in_progress_fails() {
        let queue = WorkQueue::builder().with_workers(1).build();
        let gate = Arc::new(Notify::new());
        let started = Arc::new(Notify::new());

        let g = Arc::clone(&gate);
        let s = Arc::clone(&started);
        let id = queue
            .enqueue(WorkSpec::new(move || async move {
                s.notify_one();
                g.notified().await;
                Ok(())
            }))
            .await;

        started.notified().await;
        let err = queue.dequeue(id).expect_err("in-progress dequeue must fail");
        assert_eq!(err, QueueError::DequeueInProgress { id });
        assert_eq!(err.as_label(), "queue_dequeue_in_progress");

        let err = queue
            .set_priority(id, 0)
            .expect_err("in-progress reprioritize must fail");
        assert_eq!(err, QueueError::ReprioritizeInProgress { id });

        gate.notify_one();
        wait_until(|| queue.work_items().is_empty()).await;
    }

    #[tokio::test]
    async fn dequeued_work_never_runs() {
        let queue = WorkQueue::builder()
            .with_workers(1)
            .with_queue_length(8)
            .build();
        let gate = Arc::new(Notify::new());
        let started = Arc::new(Notify::new());
        let ran = Arc::new(AtomicUsize::new(0));

        // occupy the single worker, then the channel slot
        let g = Arc::clone(&gate);
        let s = Arc::clone(&started);
        queue
            .enqueue(WorkSpec::new(move || async move {
                s.notify_one();
                g.notified().await;
                Ok(())
            }))
            .await;
        started.notified().await;
        let r = Arc::clone(&ran);
        let buffered = queue
            .enqueue(WorkSpec::new(move || async move {
                r.fetch_add(1, AtomicOrdering::Relaxed);
                Ok(())
            }))
            .await;

        // this one lands in the heap and gets cancelled there
        let r = Arc::clone(&ran);
        let doomed = queue
            .enqueue(WorkSpec::new(move || async move {
                r.fetch_add(100, AtomicOrdering::Relaxed);
                Ok(())
            }))
            .await;
        wait_until(|| queue.work_items().len() == 3).await;

        queue.dequeue(doomed).expect("queued dequeue must succeed");
        assert!(!queue.work_items().iter().any(|w| w.id == doomed));

        // the buffered item was committed at the fast-path handoff;
        // once marked it can no longer be withdrawn
        wait_until(|| {
            queue
                .work_items()
                .iter()
                .any(|w| w.id == buffered && w.state == WorkState::InProgress)
        })
        .await;
        let err = queue
            .dequeue(buffered)
            .expect_err("committed work cannot be withdrawn");
        assert_eq!(err, QueueError::DequeueInProgress { id: buffered });

        gate.notify_one();
        wait_until(|| queue.work_items().is_empty()).await;
        assert_eq!(ran.load(AtomicOrdering::Relaxed), 1);
    }

    #[tokio::test]
    async fn stop_rejects_new_work_but_drains_queued() {
        let queue = WorkQueue::builder().with_workers(1).build();
        let gate = Arc::new(Notify::new());
        let started = Arc::new(Notify::new());
        let ran = Arc::new(AtomicUsize::new(0));

        let g = Arc::clone(&gate);
        let s = Arc::clone(&started);
        queue
            .enqueue(WorkSpec::new(move || async move {
                s.notify_one();
                g.notified().await;
                Ok(())
            }))
            .await;
        started.notified().await;

        for _ in 0..3 {
            let r = Arc::clone(&ran);
            queue
                .enqueue(WorkSpec::new(move || async move {
                    r.fetch_add(1, AtomicOrdering::Relaxed);
                    Ok(())
                }))
                .await;
        }
        wait_until(|| queue.work_items().len() == 4).await;

        queue.stop();
        assert!(queue.is_stopped());

        // rejected silently; never registered
        let r = Arc::clone(&ran);
        queue
            .enqueue(WorkSpec::new(move || async move {
                r.fetch_add(1000, AtomicOrdering::Relaxed);
                Ok(())
            }))
            .await;

        gate.notify_one();
        wait_until(|| ran.load(AtomicOrdering::Relaxed) == 3).await;
        wait_until(|| queue.work_items().is_empty()).await;
    }

    #[tokio::test]
    async fn break_off_discards_queued_work() {
        let queue = WorkQueue::builder()
            .with_workers(1)
            .with_queue_length(16)
            .build();
        let gate = Arc::new(Notify::new());
        let started = Arc::new(Notify::new());
        let ran = Arc::new(AtomicUsize::new(0));

        let g = Arc::clone(&gate);
        let s = Arc::clone(&started);
        queue
            .enqueue(WorkSpec::new(move || async move {
                s.notify_one();
                g.notified().await;
                Ok(())
            }))
            .await;
        started.notified().await;

        // one rides the worker channel buffer; the rest wait in the heap
        for _ in 0..5 {
            let r = Arc::clone(&ran);
            queue
                .enqueue(WorkSpec::new(move || async move {
                    r.fetch_add(1, AtomicOrdering::Relaxed);
                    Ok(())
                }))
                .await;
        }
        wait_until(|| queue.work_items().len() == 6).await;

        queue.break_off();
        gate.notify_one();

        wait_until(|| queue.work_items().is_empty()).await;
        // only the buffered item may still run; heap items must not
        assert!(ran.load(AtomicOrdering::Relaxed) <= 1);
    }

    #[tokio::test]
    async fn resize_queue_length_is_observed() {
        let queue = WorkQueue::builder()
            .with_workers(2)
            .with_queue_length(4)
            .build();
        assert_eq!(queue.queue_length(), 4);
        queue.resize_queue_length(64);
        assert_eq!(queue.queue_length(), 64);
    }
}
