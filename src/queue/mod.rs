//! Deduplicating, rate-limited work queue.
//!
//! ## Contents
//! - [`WorkQueue`]   set-semantics queue with pending / processing / dirty tracking
//! - [`RateLimiter`] source of requeue delays and per-key failure counts
//! - [`ItemBackoffLimiter`], [`BucketLimiter`], [`MaxOfLimiter`] built-in limiters
//!
//! The queue is generic over its key; the pool uses node names (`String`).

mod rate_limiter;
mod work_queue;

pub use rate_limiter::{
    BucketLimiter, ItemBackoffLimiter, MaxOfLimiter, RateLimiter, default_controller_limiter,
};
pub use work_queue::WorkQueue;
