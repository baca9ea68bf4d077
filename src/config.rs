//! # Pool configuration.
//!
//! Provides [`PoolConfig`] centralized settings for the node updater pool.
//!
//! ## Sentinel values
//! - `update_timeout = 0s` → no timeout per update attempt
//! - `bus_capacity = 0` → clamped to 1

use std::hash::Hash;
use std::time::Duration;

use crate::policies::{BackoffPolicy, BucketPolicy, RetryPolicy};
use crate::queue::{MaxOfLimiter, default_controller_limiter};

/// Configuration for [`NodeUpdaterPool`](crate::NodeUpdaterPool).
///
/// ## Field semantics
/// - `workers`: workers started by [`run_until_signal`](crate::NodeUpdaterPool::run_until_signal)
/// - `retry`: requeues per node before it is dropped
/// - `backoff`: per-node requeue delay curve
/// - `bucket`: overall requeue rate across all nodes
/// - `update_timeout`: bound on a single update attempt (`0s` = none)
/// - `grace`: how long `stop` callers wait for workers before reporting them stuck
/// - `bus_capacity`: event bus ring buffer size
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Default number of workers.
    pub workers: usize,

    /// Retry ceiling.
    pub retry: RetryPolicy,

    /// Per-node exponential backoff.
    pub backoff: BackoffPolicy,

    /// Overall requeue token bucket.
    pub bucket: BucketPolicy,

    /// Maximum duration of one update attempt.
    ///
    /// An attempt that runs longer is abandoned and counts as a retryable
    /// [`UpdateError::Timeout`](crate::UpdateError::Timeout).
    pub update_timeout: Duration,

    /// Maximum time to wait for workers after `stop`.
    pub grace: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` events skip older items.
    pub bus_capacity: usize,
}

impl PoolConfig {
    /// Returns the per-attempt timeout as an `Option`.
    #[inline]
    pub fn update_timeout(&self) -> Option<Duration> {
        if self.update_timeout.is_zero() {
            None
        } else {
            Some(self.update_timeout)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Builds the queue rate limiter described by `backoff` and `bucket`.
    pub fn rate_limiter<K>(&self) -> MaxOfLimiter<K>
    where
        K: Clone + Eq + Hash + Send + Sync + 'static,
    {
        default_controller_limiter(self.backoff, self.bucket)
    }
}

impl Default for PoolConfig {
    /// Default configuration:
    ///
    /// - `workers = 10`
    /// - `retry = 5 requeues`
    /// - `backoff = 5ms × 2^n, max 1000s`
    /// - `bucket = 10 qps, burst 100`
    /// - `update_timeout = 0s` (none)
    /// - `grace = 30s`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            workers: 10,
            retry: RetryPolicy::default(),
            backoff: BackoffPolicy::default(),
            bucket: BucketPolicy::default(),
            update_timeout: Duration::ZERO,
            grace: Duration::from_secs(30),
            bus_capacity: 1024,
        }
    }
}
