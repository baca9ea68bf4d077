//! # Deduplicating work queue.
//!
//! [`WorkQueue`] hands keys (node names) to workers with set semantics:
//!
//! ```text
//!            add(k)                         get()                      done(k)
//!   ┌────────────────────┐        ┌────────────────────┐       ┌────────────────────┐
//!   │ k in dirty? → skip │        │ pop pending front  │       │ processing -= k    │
//!   │ dirty += k         │ ─────► │ dirty -= k         │ ────► │ k in dirty?        │
//!   │ k processing? skip │        │ processing += k    │       │   → pending += k   │
//!   │ pending += k       │        └────────────────────┘       └────────────────────┘
//!   └────────────────────┘
//! ```
//!
//! ## Rules
//! - A key is never in `pending` while it is in `processing`.
//! - Re-adding a key that is being processed marks it dirty; it is replayed once on `done`.
//! - After [`WorkQueue::shut_down`] nothing new is accepted and pending delay timers
//!   are cancelled. Keys already pending (or dirty) are still handed out; `get`
//!   returns `None` only once the queue is also drained.
//! - Requeue delays run on timer tasks owned by the queue; workers never sleep.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use super::rate_limiter::RateLimiter;

struct State<K> {
    pending: VecDeque<K>,
    dirty: HashSet<K>,
    processing: HashSet<K>,
    shutting_down: bool,
}

/// Thread-safe, deduplicating, rate-limited queue of keys.
pub struct WorkQueue<K> {
    state: Mutex<State<K>>,
    notify: Notify,
    limiter: Box<dyn RateLimiter<K>>,
    timers: CancellationToken,
}

impl<K> WorkQueue<K>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
{
    /// Creates an empty queue that uses `limiter` for [`add_rate_limited`](Self::add_rate_limited).
    pub fn new(limiter: impl RateLimiter<K>) -> Arc<Self> {
        Self::with_boxed_limiter(Box::new(limiter))
    }

    /// Same as [`new`](Self::new) for an already boxed limiter.
    pub fn with_boxed_limiter(limiter: Box<dyn RateLimiter<K>>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                pending: VecDeque::new(),
                dirty: HashSet::new(),
                processing: HashSet::new(),
                shutting_down: false,
            }),
            notify: Notify::new(),
            limiter,
            timers: CancellationToken::new(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, State<K>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks `key` as needing processing.
    ///
    /// No-op if the key is already pending or the queue is shutting down. If the key
    /// is being processed it is only marked dirty and comes back on [`done`](Self::done).
    pub fn add(&self, key: K) {
        let mut st = self.lock();
        if st.shutting_down || st.dirty.contains(&key) {
            return;
        }
        st.dirty.insert(key.clone());
        if st.processing.contains(&key) {
            return;
        }
        st.pending.push_back(key);
        drop(st);
        self.notify.notify_one();
    }

    /// Adds `key` once `delay` has elapsed.
    ///
    /// The timer is dropped if the queue shuts down first. Must be called from
    /// within a tokio runtime unless `delay` is zero.
    pub fn add_after(self: &Arc<Self>, key: K, delay: Duration) {
        if self.is_shutting_down() {
            return;
        }
        if delay.is_zero() {
            self.add(key);
            return;
        }

        let queue = Arc::clone(self);
        let cancelled = self.timers.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep(delay) => queue.add(key),
            }
        });
    }

    /// Records a failure of `key` with the rate limiter and requeues it after the
    /// returned delay.
    pub fn add_rate_limited(self: &Arc<Self>, key: K) -> Duration {
        let delay = self.limiter.when(&key);
        self.add_after(key, delay);
        delay
    }

    /// Clears the failure history of `key` (after success or after dropping it).
    pub fn forget(&self, key: &K) {
        self.limiter.forget(key);
    }

    /// Failures recorded for `key` since it was last forgotten.
    pub fn num_requeues(&self, key: &K) -> u32 {
        self.limiter.num_requeues(key)
    }

    /// Waits for the next key.
    ///
    /// Keys added before [`shut_down`](Self::shut_down) are still handed out; `None`
    /// means the queue is shutting down and drained, and the caller must stop asking.
    /// The returned key is in `processing` until [`done`](Self::done) is called.
    pub async fn get(&self) -> Option<K> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut st = self.lock();
                if let Some(key) = st.pending.pop_front() {
                    st.dirty.remove(&key);
                    st.processing.insert(key.clone());
                    let more = !st.pending.is_empty();
                    drop(st);
                    if more {
                        self.notify.notify_one();
                    }
                    return Some(key);
                }
                if st.shutting_down {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Marks processing of `key` finished, replaying it once if it was re-added meanwhile.
    ///
    /// The replay also happens during shutdown, since the re-add was accepted before it.
    pub fn done(&self, key: &K) {
        let mut st = self.lock();
        st.processing.remove(key);
        if !st.dirty.contains(key) {
            return;
        }
        st.pending.push_back(key.clone());
        drop(st);
        self.notify.notify_one();
    }

    /// Stops accepting keys, cancels delayed adds and wakes every worker parked in
    /// [`get`](Self::get). Pending keys remain available for draining. Idempotent.
    pub fn shut_down(&self) {
        {
            let mut st = self.lock();
            if st.shutting_down {
                return;
            }
            st.shutting_down = true;
        }
        self.timers.cancel();
        self.notify.notify_waiters();
    }

    /// True once [`shut_down`](Self::shut_down) has been called.
    pub fn is_shutting_down(&self) -> bool {
        self.lock().shutting_down
    }

    /// Number of pending keys (in-flight keys are not counted).
    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    /// True if no key is pending.
    pub fn is_empty(&self) -> bool {
        self.lock().pending.is_empty()
    }

    /// Number of keys currently handed out to workers.
    pub fn in_flight(&self) -> usize {
        self.lock().processing.len()
    }
}

impl<K> fmt::Debug for WorkQueue<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let st = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("WorkQueue")
            .field("pending", &st.pending.len())
            .field("processing", &st.processing.len())
            .field("shutting_down", &st.shutting_down)
            .finish()
    }
}
