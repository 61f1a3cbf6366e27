//! # Subscriber handle and subscription options.
//!
//! A [`Subscriber`] is the consuming end of one subscription: a
//! bounded receive buffer plus a weak back-reference to its
//! publication, used only for self-unsubscription. Holding a
//! subscriber does not keep the publication alive.
//!
//! [`SubscribeOptions`] configures the subscription:
//! - **filter** — predicate deciding which messages are delivered;
//! - **timeout** — how long a delivery may wait on a full buffer
//!   before the message is dropped for this subscriber (default 10 s);
//! - **on_timeout** / **on_filtered** — observability callbacks fired
//!   with the undelivered message.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::mpsc;

use super::publication::PubInner;

/// Default per-delivery timeout.
pub(crate) const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Message predicate: `true` keeps the message for this subscriber.
pub(crate) type Predicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync + 'static>;

/// Callback receiving a message that was not delivered.
pub(crate) type Callback<T> = Arc<dyn Fn(T) + Send + Sync + 'static>;

/// Options applied at subscription time.
///
/// ## Example
/// ```
/// use std::time::Duration;
/// use taskmill::SubscribeOptions;
///
/// let opts: SubscribeOptions<i64> = SubscribeOptions::new()
///     .with_filter(|v| v % 2 == 0)
///     .with_timeout(Duration::from_millis(250))
///     .on_filtered(|v| println!("skipped {v}"));
/// # let _ = opts;
/// ```
pub struct SubscribeOptions<T> {
    pub(crate) filter: Option<Predicate<T>>,
    pub(crate) timeout: Duration,
    pub(crate) on_timeout: Option<Callback<T>>,
    pub(crate) on_filtered: Option<Callback<T>>,
}

impl<T> SubscribeOptions<T> {
    /// Default options: no filter, 10 s delivery timeout, no callbacks.
    pub fn new() -> Self {
        Self {
            filter: None,
            timeout: DEFAULT_DELIVERY_TIMEOUT,
            on_timeout: None,
            on_filtered: None,
        }
    }

    /// Delivers only messages for which `filter` returns true.
    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Sets the per-delivery timeout for this subscriber.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Called with the message when a delivery times out and is dropped.
    pub fn on_timeout<F>(mut self, callback: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        self.on_timeout = Some(Arc::new(callback));
        self
    }

    /// Called with the message when the filter rejects it.
    pub fn on_filtered<F>(mut self, callback: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        self.on_filtered = Some(Arc::new(callback));
        self
    }
}

impl<T> Default for SubscribeOptions<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Consuming end of one subscription.
pub struct Subscriber<T> {
    id: u64,
    rx: mpsc::Receiver<T>,
    publication: Weak<PubInner<T>>,
}

impl<T> Subscriber<T> {
    pub(crate) fn new(id: u64, rx: mpsc::Receiver<T>, publication: Weak<PubInner<T>>) -> Self {
        Self {
            id,
            rx,
            publication,
        }
    }

    /// The subscriber's id within its publication.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Receives the next message; `None` once the buffer is closed and
    /// drained (publication closed or this subscriber unsubscribed).
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Non-blocking receive; `None` when nothing is buffered.
    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Unsubscribes from the publication and closes the buffer.
    ///
    /// Deliveries already in flight are discarded silently. A no-op
    /// when the publication is already gone.
    pub fn close(self) {
        if let Some(publication) = self.publication.upgrade() {
            publication.unsubscribe(self.id);
        }
    }
}
