//! Filtered publish/subscribe.
//!
//! A [`Publication`] distributes each published message to every
//! subscriber whose filter accepts it. Subscribers own bounded
//! buffers; deliveries race a per-subscriber timeout so one slow
//! consumer never wedges the publisher or its peers.
//!
//! - **publication.rs**: the publisher side — subscriber table,
//!   `publish`, `close`.
//! - **subscriber.rs**: the consumer handle and per-subscriber options
//!   (filter, timeout, callbacks).

mod publication;
mod subscriber;

pub use publication::Publication;
pub use subscriber::{SubscribeOptions, Subscriber};
