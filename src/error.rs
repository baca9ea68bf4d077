//! Error types used by the node updater pool and by update operations.
//!
//! This module defines two main error enums:
//!
//! - [`PoolError`] - errors raised by the pool lifecycle itself.
//! - [`UpdateError`] - errors raised by a single node update attempt.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging/metrics
//! and [`UpdateError::is_retryable`] drives the worker retry decision.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the pool lifecycle.
///
/// These represent failures of the pool itself, never of an individual node update.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum PoolError {
    /// Workers were still busy when the grace period ran out.
    #[error("stop grace {grace:?} exceeded; {stuck} worker(s) still in flight")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Number of workers that had not exited yet.
        stuck: usize,
    },

    /// Registering the OS termination signal handlers failed.
    #[error("failed to listen for shutdown signal: {0}")]
    Signal(#[from] std::io::Error),
}

impl PoolError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use nodevisor::PoolError;
    /// use std::time::Duration;
    ///
    /// let err = PoolError::GraceExceeded { grace: Duration::from_secs(5), stuck: 2 };
    /// assert_eq!(err.as_label(), "pool_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            PoolError::GraceExceeded { .. } => "pool_grace_exceeded",
            PoolError::Signal(_) => "pool_signal_failed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            PoolError::GraceExceeded { grace, stuck } => {
                format!("grace exceeded after {grace:?}; stuck workers={stuck}")
            }
            PoolError::Signal(err) => format!("signal: {err}"),
        }
    }
}

/// # Errors produced by a node update attempt.
///
/// Returned by [`NodeUpdater::update_node`](crate::NodeUpdater::update_node).
/// Everything except [`UpdateError::Fatal`] is treated as transient and requeued
/// with backoff until the retry ceiling is reached.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum UpdateError {
    /// The node object changed underneath the update (optimistic concurrency).
    #[error("conflict updating node: {error}")]
    Conflict {
        /// The underlying error message.
        error: String,
    },

    /// The attempt exceeded the configured update timeout.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// The attempt failed but may succeed if retried.
    #[error("update failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Non-recoverable error; the node is dropped without retry.
    #[error("fatal error (no retry): {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },
}

impl UpdateError {
    /// Shorthand for [`UpdateError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        UpdateError::Fail {
            error: error.into(),
        }
    }

    /// Shorthand for [`UpdateError::Conflict`].
    pub fn conflict(error: impl Into<String>) -> Self {
        UpdateError::Conflict {
            error: error.into(),
        }
    }

    /// Shorthand for [`UpdateError::Fatal`].
    pub fn fatal(error: impl Into<String>) -> Self {
        UpdateError::Fatal {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use nodevisor::UpdateError;
    /// use std::time::Duration;
    ///
    /// let err = UpdateError::Timeout { timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "update_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            UpdateError::Conflict { .. } => "update_conflict",
            UpdateError::Timeout { .. } => "update_timeout",
            UpdateError::Fail { .. } => "update_failed",
            UpdateError::Fatal { .. } => "update_fatal",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            UpdateError::Conflict { error } => format!("conflict: {error}"),
            UpdateError::Timeout { timeout } => format!("timeout: {timeout:?}"),
            UpdateError::Fail { error } => format!("error: {error}"),
            UpdateError::Fatal { error } => format!("fatal: {error}"),
        }
    }

    /// Indicates whether the node should be requeued after this error.
    ///
    /// Returns `false` only for [`UpdateError::Fatal`].
    ///
    /// # Example
    /// ```
    /// use nodevisor::UpdateError;
    ///
    /// assert!(UpdateError::conflict("resourceVersion changed").is_retryable());
    /// assert!(!UpdateError::fatal("node has no name").is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        !matches!(self, UpdateError::Fatal { .. })
    }
}
