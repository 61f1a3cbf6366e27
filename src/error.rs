//! # Error types used across the taskmill primitives.
//!
//! This module defines the error surface of the crate:
//!
//! - [`StoreError`] — lookup failures in the storage primitives.
//! - [`QueueError`] — illegal state transitions on the work queue.
//! - [`WorkError`] — failures raised *by* units of work, fanned out to
//!   error subscribers. Cloneable so one failure can reach N subscribers.
//! - [`ResolvedError`] — a domain error produced by the resolver
//!   pipeline, preserving the original error as its source.
//!
//! All types provide `as_label()` returning a short stable snake_case
//! label for logs and metrics.

use thiserror::Error;

/// Boxed dynamic error used at the resolver boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// # Errors produced by the storage primitives.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No entry carries the requested id (0 is reserved and never assigned).
    #[error("no entry with id {id}")]
    IdNotFound {
        /// The id that was looked up.
        id: u64,
    },
}

impl StoreError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            StoreError::IdNotFound { .. } => "store_id_not_found",
        }
    }
}

/// # Errors produced by work queue control operations.
///
/// Raised when a caller acts on a work item that has already been
/// handed to a worker. Queued items can be removed or reprioritized
/// freely; in-progress items cannot.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// The item has started executing and can no longer be removed.
    #[error("work item {id} is in progress and cannot be removed")]
    DequeueInProgress {
        /// Id of the running work item.
        id: crate::queue::WorkId,
    },
    /// The item has started executing and its priority is now meaningless.
    #[error("work item {id} is in progress and cannot be reprioritized")]
    ReprioritizeInProgress {
        /// Id of the running work item.
        id: crate::queue::WorkId,
    },
}

impl QueueError {
    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            QueueError::DequeueInProgress { .. } => "queue_dequeue_in_progress",
            QueueError::ReprioritizeInProgress { .. } => "queue_reprioritize_in_progress",
        }
    }
}

/// # Errors raised by units of work.
///
/// Returned from a unit of work (or synthesized from a caught panic)
/// and delivered on the queue's error channel to every subscriber.
/// Cloneable by design: fan-out hands each subscriber its own copy.
///
/// Errors are never thrown back at the enqueuer; with no subscribers
/// they are dropped.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkError {
    /// The work ran to completion and reported a failure.
    #[error("work failed: {reason}")]
    Fail {
        /// Human-readable failure description.
        reason: String,
    },
    /// The work panicked; the panic was caught and the worker survived.
    #[error("work panicked: {reason}")]
    Panicked {
        /// Stringified panic payload.
        reason: String,
    },
}

impl WorkError {
    /// Convenience constructor for the common failure case.
    pub fn fail(reason: impl Into<String>) -> Self {
        WorkError::Fail {
            reason: reason.into(),
        }
    }

    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkError::Fail { .. } => "work_failed",
            WorkError::Panicked { .. } => "work_panicked",
        }
    }
}

/// # A domain error produced by the resolver pipeline.
///
/// Wraps a lower-level error with a domain message while keeping the
/// original reachable through [`std::error::Error::source`].
#[derive(Error, Debug)]
#[error("{message}")]
pub struct ResolvedError {
    message: String,
    #[source]
    source: BoxError,
}

impl ResolvedError {
    /// Wraps `source` with a domain-level `message`.
    pub fn new(message: impl Into<String>, source: BoxError) -> Self {
        Self {
            message: message.into(),
            source,
        }
    }

    /// The domain-level message.
    pub fn message(&self) -> &str {
        &self.message
    }
}
