//! # UpdateStats: in-process update counters
//!
//! A stateful subscriber that counts update attempts and their outcomes. Export
//! the snapshot to whatever metrics system the embedding controller uses.
//!
//! ```text
//! UpdateStarting  ─► requests  += 1
//! UpdateSucceeded ─► succeeded += 1
//! UpdateFailed    ─► retried   += 1
//! UpdateDropped   ─► failures  += 1
//! TimeoutHit      ─► timeouts  += 1
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Point-in-time copy of the counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Update attempts started.
    pub requests: u64,
    /// Attempts that succeeded.
    pub succeeded: u64,
    /// Attempts that failed and were requeued.
    pub retried: u64,
    /// Nodes dropped after a permanent failure.
    pub failures: u64,
    /// Attempts that hit the update timeout.
    pub timeouts: u64,
}

/// Counting subscriber.
#[derive(Default)]
pub struct UpdateStats {
    requests: AtomicU64,
    succeeded: AtomicU64,
    retried: AtomicU64,
    failures: AtomicU64,
    timeouts: AtomicU64,
}

impl UpdateStats {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current counter values.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
        }
    }

    fn record(&self, kind: EventKind) {
        let counter = match kind {
            EventKind::UpdateStarting => &self.requests,
            EventKind::UpdateSucceeded => &self.succeeded,
            EventKind::UpdateFailed => &self.retried,
            EventKind::UpdateDropped => &self.failures,
            EventKind::TimeoutHit => &self.timeouts,
            _ => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

#[async_trait]
impl Subscribe for UpdateStats {
    async fn on_event(&self, e: &Event) {
        self.record(e.kind);
    }

    fn name(&self) -> &'static str {
        "update-stats"
    }

    fn queue_capacity(&self) -> usize {
        4096
    }
}
