//! # Publication: one producer, many filtered subscribers.
//!
//! Each subscriber owns a bounded buffer; `publish` clones the message
//! per accepting subscriber and spawns one delivery task each, racing
//! the buffered send against the subscriber's timeout.
//!
//! ## What it guarantees
//! - `publish` returns immediately; deliveries run concurrently.
//! - Per-subscriber FIFO up to the point of a timeout drop.
//! - A slow subscriber only loses its own messages.
//!
//! ## What it does **not** guarantee
//! - No ordering across subscribers or across overlapping publishes.
//! - No retries: a timed-out delivery drops the message for that
//!   subscriber (observable via its `on_timeout` callback).
//!
//! ## Diagram
//! ```text
//! publish(msg)
//!   ├── filter S1? ──reject──► on_filtered(msg)
//!   ├── accept ────────────────► task: send_timeout ─► [buffer S1] ─► recv()
//!   ├── accept ────────────────► task: send_timeout ─► [buffer S2] ─► recv()
//!   │                                  └─ elapsed ──► on_timeout(msg), drop
//!   └── (closed buffer: delivery discarded silently)
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;

use crate::store::GuardedMap;

use super::subscriber::{Callback, Predicate, SubscribeOptions, Subscriber};

/// Publisher-side record of one subscription.
pub(crate) struct SubscriberEntry<T> {
    tx: mpsc::Sender<T>,
    filter: Option<Predicate<T>>,
    timeout: Duration,
    on_timeout: Option<Callback<T>>,
    on_filtered: Option<Callback<T>>,
}

// manual impl: cloning shares the sender and callbacks, regardless of T
impl<T> Clone for SubscriberEntry<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            filter: self.filter.clone(),
            timeout: self.timeout,
            on_timeout: self.on_timeout.clone(),
            on_filtered: self.on_filtered.clone(),
        }
    }
}

/// Shared state owned by the publication, weakly referenced by
/// subscribers for self-unsubscription.
pub(crate) struct PubInner<T> {
    subscribers: GuardedMap<u64, SubscriberEntry<T>>,
    next_id: AtomicU64,
}

impl<T> PubInner<T> {
    pub(crate) fn unsubscribe(&self, id: u64) {
        // dropping the stored sender closes the buffer once in-flight
        // deliveries settle
        self.subscribers.delete(&id);
    }
}

/// Typed one-to-many message distributor with per-subscriber filters.
///
/// Cheap to clone (a handle over shared state).
///
/// ## Example
/// ```no_run
/// use taskmill::{Publication, SubscribeOptions};
///
/// # async fn run() {
/// let numbers: Publication<i64> = Publication::new();
/// let mut evens = numbers.subscribe_with(8, SubscribeOptions::new().with_filter(|n| n % 2 == 0));
///
/// numbers.publish(2);
/// numbers.publish(3);
///
/// assert_eq!(evens.recv().await, Some(2));
/// numbers.close();
/// # }
/// ```
pub struct Publication<T> {
    inner: Arc<PubInner<T>>,
}

impl<T> Clone for Publication<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Publication<T>
where
    T: Clone + Send + 'static,
{
    /// Creates a publication with no subscribers.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(PubInner {
                subscribers: GuardedMap::new(),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Subscribes with default options (no filter, 10 s timeout).
    ///
    /// `buffer` is the subscriber's receive capacity, clamped to at
    /// least 1.
    pub fn subscribe(&self, buffer: usize) -> Subscriber<T> {
        self.subscribe_with(buffer, SubscribeOptions::new())
    }

    /// Subscribes with explicit options.
    pub fn subscribe_with(&self, buffer: usize, options: SubscribeOptions<T>) -> Subscriber<T> {
        let id = self.inner.next_id.fetch_add(1, AtomicOrdering::Relaxed) + 1;
        let (tx, rx) = mpsc::channel(buffer.max(1));

        self.inner.subscribers.set(
            id,
            SubscriberEntry {
                tx,
                filter: options.filter,
                timeout: options.timeout,
                on_timeout: options.on_timeout,
                on_filtered: options.on_filtered,
            },
        );
        Subscriber::new(id, rx, Arc::downgrade(&self.inner))
    }

    /// Publishes `message` to every subscriber whose filter accepts it.
    ///
    /// Returns immediately; one delivery task per accepting subscriber
    /// races the buffered send against that subscriber's timeout. Note
    /// the in-flight task count is bounded only by subscribers ×
    /// publish rate within the timeout window.
    pub fn publish(&self, message: T) {
        for entry in self.inner.subscribers.values() {
            if let Some(filter) = &entry.filter {
                if !filter.as_ref()(&message) {
                    if let Some(on_filtered) = &entry.on_filtered {
                        on_filtered.as_ref()(message.clone());
                    }
                    continue;
                }
            }

            let msg = message.clone();
            tokio::spawn(async move {
                match entry.tx.send_timeout(msg, entry.timeout).await {
                    Ok(()) => {}
                    Err(SendTimeoutError::Timeout(undelivered)) => {
                        tracing::warn!(
                            timeout = ?entry.timeout,
                            "dropped message: subscriber buffer full past deadline"
                        );
                        if let Some(on_timeout) = &entry.on_timeout {
                            on_timeout.as_ref()(undelivered);
                        }
                    }
                    // subscriber went away mid-flight
                    Err(SendTimeoutError::Closed(_)) => {}
                }
            });
        }
    }

    /// Closes every subscriber's buffer and empties the table.
    ///
    /// Subscribers still drain already-buffered messages, then observe
    /// `None`.
    pub fn close(&self) {
        self.inner.subscribers.clear();
    }

    /// Number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }
}

impl<T> Default for Publication<T>
where
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
