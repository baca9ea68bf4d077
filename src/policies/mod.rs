//! Retry, backoff and rate policies.
//!
//! This module groups the knobs that control **whether** a failed node update is
//! retried and **how long** it waits before the next attempt.
//!
//! ## Contents
//! - [`RetryPolicy`]  requeue or drop after a failure (ceiling per node)
//! - [`BackoffPolicy`] per-node delay growth (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization to avoid synchronized retries
//! - [`BucketPolicy`]  overall requeue rate shared by all nodes
//!
//! ## Quick wiring
//! ```text
//! PoolConfig { retry, backoff, bucket }
//!      ├─► core::worker uses retry.decide(num_requeues, &err)
//!      └─► queue::default_controller_limiter(backoff, bucket)
//!               └─► WorkQueue::add_rate_limited(node)
//! ```
//!
//! ## Defaults
//! - `RetryPolicy::default()` → 5 requeues.
//! - `BackoffPolicy::default()` → first=5ms, factor=2.0, max=1000s, jitter=None.
//! - `BucketPolicy::default()` → 10 qps, burst 100.

mod backoff;
mod bucket;
mod jitter;
mod retry;

pub use backoff::BackoffPolicy;
pub use bucket::BucketPolicy;
pub use jitter::JitterPolicy;
pub use retry::{RetryDecision, RetryPolicy};
