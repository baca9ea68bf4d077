//! # LogWriter: pool events as tracing records
//!
//! Turns every [`Event`] into a `tracing` record under the `nodevisor` target.
//! Install any `tracing` subscriber (e.g. `tracing_subscriber::fmt`) to see them.
//!
//! ## Levels
//! - `error`: node dropped after its last retry, grace exceeded
//! - `warn`: update failed and was requeued, update timed out
//! - `info`: pool started / stopping / stopped
//! - `debug`: worker start/exit, update starting / succeeded

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let node = e.node.as_deref().unwrap_or("");
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::PoolStarted => {
                info!(target: "nodevisor", workers = ?e.workers, "starting the node updater pool");
            }
            EventKind::PoolStopping => {
                info!(target: "nodevisor", "stopping the node updater pool");
            }
            EventKind::PoolStopped => {
                info!(target: "nodevisor", "node updater pool stopped");
            }
            EventKind::GraceExceeded => {
                error!(target: "nodevisor", stuck = ?e.workers, "node updater workers did not exit within grace");
            }
            EventKind::WorkerStarted => {
                debug!(target: "nodevisor", worker = ?e.worker, "node updater worker started");
            }
            EventKind::WorkerExited => {
                debug!(target: "nodevisor", worker = ?e.worker, "node updater worker exited");
            }
            EventKind::UpdateStarting => {
                debug!(target: "nodevisor", node, worker = ?e.worker, attempt = ?e.attempt, "updating node");
            }
            EventKind::UpdateSucceeded => {
                debug!(target: "nodevisor", node, attempt = ?e.attempt, "node updated");
            }
            EventKind::UpdateFailed => {
                warn!(
                    target: "nodevisor",
                    node,
                    attempt = ?e.attempt,
                    delay_ms = ?e.delay_ms,
                    error = reason,
                    "retrying node update"
                );
            }
            EventKind::UpdateDropped => {
                error!(target: "nodevisor", node, attempt = ?e.attempt, error = reason, "failed to update node");
            }
            EventKind::TimeoutHit => {
                warn!(target: "nodevisor", node, timeout_ms = ?e.timeout_ms, "node update timed out");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
