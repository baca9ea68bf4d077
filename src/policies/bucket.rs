//! # Overall requeue rate.
//!
//! [`BucketPolicy`] configures the token bucket that caps how fast *all* nodes
//! together are requeued, independent of each node's own backoff. Tokens refill
//! at `qps` per second up to `burst`.

/// Token bucket parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BucketPolicy {
    /// Sustained requeues per second.
    pub qps: f64,
    /// Requeues allowed back to back before `qps` applies.
    pub burst: u32,
}

impl Default for BucketPolicy {
    /// `qps = 10`, `burst = 100`.
    fn default() -> Self {
        Self {
            qps: 10.0,
            burst: 100,
        }
    }
}

impl BucketPolicy {
    /// Returns `false` when the bucket can never hand out a token.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.qps.is_finite() && self.qps > 0.0 && self.burst > 0
    }
}
