//! # Retry ceiling for failed node updates.
//!
//! [`RetryPolicy`] decides, after a failed attempt, whether the node goes back to
//! the queue (with backoff) or is dropped.
//!
//! ```text
//! Err(e) ──► e.is_retryable()? ──no──► Drop
//!                 │
//!                yes
//!                 ▼
//!        requeues < max_retries? ──no──► Drop
//!                 │
//!                yes ──► Requeue
//! ```

use crate::error::UpdateError;

/// Outcome of [`RetryPolicy::decide`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Put the node back with a rate-limited delay.
    Requeue,
    /// Give up on the node and report a permanent failure.
    Drop,
}

/// How many times a failing node is requeued before it is dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Requeues allowed per node before it is dropped. `0` drops on first failure.
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    /// Five requeues, like the upstream controller.
    fn default() -> Self {
        Self { max_retries: 5 }
    }
}

impl RetryPolicy {
    /// Creates a policy with the given ceiling.
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Decides what to do with a node that failed after `requeues` previous requeues.
    pub fn decide(&self, requeues: u32, err: &UpdateError) -> RetryDecision {
        if err.is_retryable() && requeues < self.max_retries {
            RetryDecision::Requeue
        } else {
            RetryDecision::Drop
        }
    }
}
