//! # nodevisor
//!
//! **Nodevisor** applies node label/annotation updates for a cluster node-feature
//! controller through a bounded pool of async workers.
//!
//! Update requests for a node are coalesced while pending, one node is never updated
//! by two workers at once, and failed updates are retried with per-node exponential
//! backoff under an overall rate limit until a retry ceiling is reached.
//!
//! ## Architecture
//! ```text
//!   event handlers ── enqueue(node) ──┐
//!                                     ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  NodeUpdaterPool                                                  │
//! │  - WorkQueue<String> (pending / dirty / processing, delay timers) │
//! │  - RateLimiter (max of per-node backoff and token bucket)         │
//! │  - TaskTracker (worker barrier)                                   │
//! │  - Bus (broadcast events)                                         │
//! └──────┬──────────────────┬──────────────────┬───────────────┬──────┘
//!        ▼                  ▼                  ▼               │
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   │
//!     │   Worker 0   │   │   Worker 1   │   │   Worker N   │   │
//!     │ get → update │   │ get → update │   │ get → update │   │
//!     │ → decide     │   │ → decide     │   │ → decide     │   │
//!     └┬─────────────┘   └┬─────────────┘   └┬─────────────┘   │
//!      │ UpdateStarting   │ UpdateFailed     │ TimeoutHit      │ PoolStarted
//!      │ UpdateSucceeded  │ UpdateDropped    │ ...             │ PoolStopped
//!      ▼                  ▼                  ▼                 ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       subscriber_listener ──► SubscriberSet
//!                                                ├─► LogWriter
//!                                                ├─► UpdateStats
//!                                                └─► custom
//! ```
//!
//! ### Per-node processing
//! ```text
//! loop {
//!   ├─► node = queue.get()          (None once shut down and drained → exit)
//!   ├─► run_once(updater, node, timeout)
//!   │       ├─ Ok  ──► forget(node)
//!   │       └─ Err ──► retryable and num_requeues < ceiling?
//!   │                    ├─ yes ─► add_rate_limited(node)
//!   │                    └─ no  ─► forget(node), dropped
//!   └─► done(node)                  (replays a re-add that arrived meanwhile)
//! }
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                        |
//! |-------------------|--------------------------------------------------------------|-------------------------------------------|
//! | **Pool**          | Start/stop workers, enqueue node updates.                    | [`NodeUpdaterPool`], [`PoolBuilder`]      |
//! | **Queue**         | Deduplicating work queue with delayed and rate-limited adds. | [`WorkQueue`], [`RateLimiter`]            |
//! | **Policies**      | Retry ceiling, backoff curve, overall requeue rate.          | [`RetryPolicy`], [`BackoffPolicy`], [`BucketPolicy`] |
//! | **Subscriber API**| Hook into pool events (logging, counters, custom).           | [`Subscribe`], [`UpdateStats`]            |
//! | **Errors**        | Typed errors for updates and pool lifecycle.                 | [`UpdateError`], [`PoolError`]            |
//! | **Configuration** | Centralize pool settings.                                    | [`PoolConfig`]                            |
//!
//! ## Optional features
//! - `logging` (default): exports the [`LogWriter`] subscriber that maps events to `tracing`.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use nodevisor::{NodeUpdaterPool, PoolConfig, Subscribe, UpdateError, UpdateFn, UpdateStats};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let stats = Arc::new(UpdateStats::new());
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![stats.clone()];
//!
//!     let updater = UpdateFn::arc(|node: String| async move {
//!         if node.is_empty() {
//!             return Err(UpdateError::fatal("empty node name"));
//!         }
//!         Ok(())
//!     });
//!
//!     let pool = NodeUpdaterPool::builder(PoolConfig::default(), updater)
//!         .with_subscribers(subs)
//!         .build();
//!
//!     pool.start(4);
//!     pool.enqueue("worker-1");
//!     pool.enqueue("worker-2");
//!
//!     tokio::time::sleep(Duration::from_millis(50)).await;
//!     pool.stop();
//!     pool.wait_stopped(Duration::from_secs(5)).await?;
//!     Ok(())
//! }
//! ```
mod config;
mod core;
mod error;
mod events;
mod policies;
mod queue;
mod subscribers;
mod updater;

// ---- Public re-exports ----

pub use config::PoolConfig;
pub use core::{NodeUpdaterPool, PoolBuilder};
pub use error::{PoolError, UpdateError};
pub use events::{Bus, Event, EventKind};
pub use policies::{BackoffPolicy, BucketPolicy, JitterPolicy, RetryDecision, RetryPolicy};
pub use queue::{
    BucketLimiter, ItemBackoffLimiter, MaxOfLimiter, RateLimiter, WorkQueue,
    default_controller_limiter,
};
pub use subscribers::{StatsSnapshot, Subscribe, SubscriberSet, UpdateStats};
pub use updater::{NodeUpdater, UpdateFn, UpdaterRef};

// Optional: expose the tracing-backed logger subscriber.
// Enabled by default; disable with `default-features = false`.
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
