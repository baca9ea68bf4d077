//! # Events emitted by the pool and its workers.
//!
//! The [`EventKind`] enum classifies events across two categories:
//! - **Lifecycle events**: pool and worker start/stop
//! - **Update events**: one node update attempt and its outcome
//!
//! The [`Event`] struct carries the metadata (node, worker, attempt, delay, reason).
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use nodevisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::UpdateFailed)
//!     .with_node("worker-1")
//!     .with_reason("conflict")
//!     .with_attempt(2)
//!     .with_delay(Duration::from_millis(10));
//!
//! assert_eq!(ev.kind, EventKind::UpdateFailed);
//! assert_eq!(ev.node.as_deref(), Some("worker-1"));
//! assert_eq!(ev.delay_ms, Some(10));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of pool events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Pool lifecycle ===
    /// A new queue generation was created and workers were launched.
    ///
    /// Sets:
    /// - `workers`: number of workers launched
    PoolStarted,

    /// `stop()` shut the queue down; workers are draining.
    PoolStopping,

    /// Every worker of the stopped generation has exited.
    PoolStopped,

    /// Stop grace period elapsed with workers still in flight.
    ///
    /// Sets:
    /// - `workers`: workers still running
    GraceExceeded,

    // === Worker lifecycle ===
    /// A worker entered its loop.
    ///
    /// Sets:
    /// - `worker`: worker index (0-based)
    WorkerStarted,

    /// A worker observed shutdown and left its loop.
    ///
    /// Sets:
    /// - `worker`: worker index
    WorkerExited,

    // === Node updates ===
    /// A worker is about to update a node.
    ///
    /// Sets:
    /// - `node`, `worker`
    /// - `attempt`: 1-based attempt number for this node since it was last forgotten
    UpdateStarting,

    /// The node update succeeded.
    ///
    /// Sets:
    /// - `node`, `worker`, `attempt`
    UpdateSucceeded,

    /// The attempt failed and the node was requeued.
    ///
    /// Sets:
    /// - `node`, `worker`, `attempt`
    /// - `delay_ms`: delay before the node is handed out again
    /// - `reason`: failure message
    UpdateFailed,

    /// The node failed permanently and was dropped.
    ///
    /// Sets:
    /// - `node`, `worker`, `attempt`
    /// - `reason`: last failure message
    UpdateDropped,

    /// The attempt exceeded the configured update timeout (followed by `UpdateFailed`
    /// or `UpdateDropped`).
    ///
    /// Sets:
    /// - `node`, `worker`, `attempt`
    /// - `timeout_ms`: configured timeout
    TimeoutHit,
}

/// Pool event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Node name, if applicable.
    pub node: Option<Arc<str>>,
    /// Worker index, if applicable.
    pub worker: Option<u32>,
    /// Worker count (pool events).
    pub workers: Option<u32>,
    /// Attempt count (starting from 1).
    pub attempt: Option<u32>,
    /// Requeue delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Update timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Human-readable reason (usually the update error).
    pub reason: Option<Arc<str>>,
}

fn compact_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            node: None,
            worker: None,
            workers: None,
            attempt: None,
            delay_ms: None,
            timeout_ms: None,
            reason: None,
        }
    }

    /// Attaches a node name.
    #[inline]
    pub fn with_node(mut self, node: impl Into<Arc<str>>) -> Self {
        self.node = Some(node.into());
        self
    }

    /// Attaches a worker index.
    #[inline]
    pub fn with_worker(mut self, worker: u32) -> Self {
        self.worker = Some(worker);
        self
    }

    /// Attaches a worker count.
    #[inline]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(u32::try_from(workers).unwrap_or(u32::MAX));
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a requeue delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(compact_ms(d));
        self
    }

    /// Attaches an update timeout (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(compact_ms(d));
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// True for the outcome of an update attempt (succeeded, requeued or dropped).
    #[inline]
    pub fn is_update_outcome(&self) -> bool {
        matches!(
            self.kind,
            EventKind::UpdateSucceeded | EventKind::UpdateFailed | EventKind::UpdateDropped
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_is_monotonic() {
        let a = Event::new(EventKind::PoolStarted);
        let b = Event::new(EventKind::PoolStopping);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_durations_saturate() {
        let ev = Event::new(EventKind::UpdateFailed).with_delay(Duration::from_secs(u64::MAX));
        assert_eq!(ev.delay_ms, Some(u32::MAX));
    }

    #[test]
    fn test_outcome_classification() {
        assert!(Event::new(EventKind::UpdateDropped).is_update_outcome());
        assert!(!Event::new(EventKind::UpdateStarting).is_update_outcome());
        assert!(!Event::new(EventKind::TimeoutHit).is_update_outcome());
    }
}
