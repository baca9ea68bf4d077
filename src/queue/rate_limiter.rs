//! # Requeue rate limiters.
//!
//! A [`RateLimiter`] answers "how long until this key may be processed again?"
//! every time a worker gives up on an attempt and requeues the key. It also keeps
//! the per-key failure count the retry ceiling is checked against.
//!
//! ```text
//! MaxOfLimiter ──┬─► ItemBackoffLimiter   (per key: first × factor^failures)
//!                └─► BucketLimiter        (all keys: qps / burst token bucket)
//!                         │
//!                         ▼
//!                  max(delay_1, delay_2)
//! ```
//!
//! [`default_controller_limiter`] builds exactly that pair.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::policies::{BackoffPolicy, BucketPolicy};

/// Source of requeue delays and per-key failure counts.
///
/// Implementations are shared by every worker of a queue, so all methods take `&self`
/// and must be cheap: they are called with no `.await` in between.
pub trait RateLimiter<K>: Send + Sync + 'static {
    /// Records one more failure for `key` and returns how long it should wait.
    fn when(&self, key: &K) -> Duration;

    /// Clears the failure history of `key`.
    fn forget(&self, key: &K);

    /// Number of failures recorded for `key` since the last [`forget`](Self::forget).
    fn num_requeues(&self, key: &K) -> u32;
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Per-key exponential backoff.
pub struct ItemBackoffLimiter<K> {
    policy: BackoffPolicy,
    failures: Mutex<HashMap<K, u32>>,
}

impl<K> ItemBackoffLimiter<K> {
    /// Creates a limiter following `policy`.
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            failures: Mutex::new(HashMap::new()),
        }
    }
}

impl<K> RateLimiter<K> for ItemBackoffLimiter<K>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
{
    fn when(&self, key: &K) -> Duration {
        let prev = {
            let mut failures = lock(&self.failures);
            let count = failures.entry(key.clone()).or_insert(0);
            let prev = *count;
            *count = count.saturating_add(1);
            prev
        };
        self.policy.next(prev)
    }

    fn forget(&self, key: &K) {
        lock(&self.failures).remove(key);
    }

    fn num_requeues(&self, key: &K) -> u32 {
        lock(&self.failures).get(key).copied().unwrap_or(0)
    }
}

struct Bucket {
    tokens: f64,
    last: Instant,
}

/// Token bucket shared by all keys.
///
/// Each call to [`when`](RateLimiter::when) reserves one token; once the burst is
/// spent the reservation is delayed until the bucket has refilled far enough.
/// An invalid [`BucketPolicy`] disables limiting.
pub struct BucketLimiter {
    policy: BucketPolicy,
    bucket: Mutex<Bucket>,
}

impl BucketLimiter {
    /// Creates a full bucket.
    pub fn new(policy: BucketPolicy) -> Self {
        Self {
            policy,
            bucket: Mutex::new(Bucket {
                tokens: f64::from(policy.burst),
                last: Instant::now(),
            }),
        }
    }

    fn reserve(&self) -> Duration {
        if !self.policy.is_valid() {
            return Duration::ZERO;
        }
        let now = Instant::now();
        let mut bucket = lock(&self.bucket);
        let elapsed = now.saturating_duration_since(bucket.last).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.policy.qps).min(f64::from(self.policy.burst));
        bucket.last = now;
        bucket.tokens -= 1.0;

        if bucket.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(-bucket.tokens / self.policy.qps)
        }
    }
}

impl<K> RateLimiter<K> for BucketLimiter {
    fn when(&self, _key: &K) -> Duration {
        self.reserve()
    }

    fn forget(&self, _key: &K) {}

    fn num_requeues(&self, _key: &K) -> u32 {
        0
    }
}

/// Combines limiters by taking the longest delay.
pub struct MaxOfLimiter<K> {
    limiters: Vec<Box<dyn RateLimiter<K>>>,
}

impl<K> MaxOfLimiter<K> {
    /// Creates a combined limiter. An empty list never delays.
    pub fn new(limiters: Vec<Box<dyn RateLimiter<K>>>) -> Self {
        Self { limiters }
    }
}

impl<K: 'static> RateLimiter<K> for MaxOfLimiter<K> {
    fn when(&self, key: &K) -> Duration {
        // Every child must observe the failure, so no short-circuit.
        self.limiters
            .iter()
            .map(|l| l.when(key))
            .fold(Duration::ZERO, Duration::max)
    }

    fn forget(&self, key: &K) {
        for l in &self.limiters {
            l.forget(key);
        }
    }

    fn num_requeues(&self, key: &K) -> u32 {
        self.limiters
            .iter()
            .map(|l| l.num_requeues(key))
            .max()
            .unwrap_or(0)
    }
}

/// The controller limiter: per-key `backoff` combined with an overall `bucket`.
pub fn default_controller_limiter<K>(backoff: BackoffPolicy, bucket: BucketPolicy) -> MaxOfLimiter<K>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
{
    MaxOfLimiter::new(vec![
        Box::new(ItemBackoffLimiter::new(backoff)),
        Box::new(BucketLimiter::new(bucket)),
    ])
}
