//! # Worker: one consumer of the node queue.
//!
//! ```text
//! loop {
//!   ├─► queue.get()            ── None ─► WorkerExited, return
//!   ├─► publish UpdateStarting
//!   ├─► run_once(updater, node)
//!   │       ├─ Ok   ─► forget(node)                    ─► UpdateSucceeded
//!   │       └─ Err  ─► retry.decide(num_requeues, &err)
//!   │                    ├─ Requeue ─► add_rate_limited ─► UpdateFailed{delay}
//!   │                    ├─ Requeue, queue shutting down ─► forget ─► UpdateDropped
//!   │                    └─ Drop    ─► forget(node)     ─► UpdateDropped
//!   └─► queue.done(node)
//! }
//! ```
//!
//! ## Rules
//! - `done` is always called for a dequeued node, after the requeue decision.
//! - The attempt number is `num_requeues + 1` and resets once the node is forgotten.
//! - Backoff waits happen in queue timers; the worker immediately takes the next node.

use std::sync::Arc;
use std::time::Duration;

use crate::{
    core::runner::{Attempt, run_once},
    events::{Bus, Event, EventKind},
    policies::{RetryDecision, RetryPolicy},
    queue::WorkQueue,
    updater::UpdaterRef,
};

/// Parameters shared by all workers of one generation.
#[derive(Clone)]
pub(crate) struct WorkerParams {
    pub retry: RetryPolicy,
    pub timeout: Option<Duration>,
}

pub(crate) struct Worker {
    id: u32,
    queue: Arc<WorkQueue<String>>,
    updater: UpdaterRef,
    params: WorkerParams,
    bus: Bus,
}

impl Worker {
    pub(crate) fn new(
        id: u32,
        queue: Arc<WorkQueue<String>>,
        updater: UpdaterRef,
        params: WorkerParams,
        bus: Bus,
    ) -> Self {
        Self {
            id,
            queue,
            updater,
            params,
            bus,
        }
    }

    /// Runs until the queue shuts down.
    pub(crate) async fn run(self) {
        self.bus
            .publish(Event::new(EventKind::WorkerStarted).with_worker(self.id));
        while self.process_next().await {}
        self.bus
            .publish(Event::new(EventKind::WorkerExited).with_worker(self.id));
    }

    /// Handles one node; `false` once the queue reports shutdown.
    async fn process_next(&self) -> bool {
        let Some(node) = self.queue.get().await else {
            return false;
        };

        let attempt = Attempt {
            node: &node,
            worker: self.id,
            number: self.queue.num_requeues(&node).saturating_add(1),
        };
        self.publish(EventKind::UpdateStarting, &attempt);

        let res = run_once(
            self.updater.as_ref(),
            &attempt,
            self.params.timeout,
            &self.bus,
        )
        .await;

        match res {
            Ok(()) => {
                self.queue.forget(&node);
                self.publish(EventKind::UpdateSucceeded, &attempt);
            }
            Err(err) => match self.params.retry.decide(self.queue.num_requeues(&node), &err) {
                RetryDecision::Requeue if !self.queue.is_shutting_down() => {
                    let delay = self.queue.add_rate_limited(node.clone());
                    self.bus.publish(
                        self.event(EventKind::UpdateFailed, &attempt)
                            .with_delay(delay)
                            .with_reason(err.to_string()),
                    );
                }
                RetryDecision::Requeue => {
                    self.queue.forget(&node);
                    self.bus.publish(
                        self.event(EventKind::UpdateDropped, &attempt)
                            .with_reason(format!("queue shutting down, retry skipped: {err}")),
                    );
                }
                RetryDecision::Drop => {
                    self.queue.forget(&node);
                    self.bus.publish(
                        self.event(EventKind::UpdateDropped, &attempt)
                            .with_reason(err.to_string()),
                    );
                }
            },
        }

        self.queue.done(&node);
        true
    }

    fn event(&self, kind: EventKind, attempt: &Attempt<'_>) -> Event {
        Event::new(kind)
            .with_node(attempt.node)
            .with_worker(self.id)
            .with_attempt(attempt.number)
    }

    fn publish(&self, kind: EventKind, attempt: &Attempt<'_>) {
        self.bus.publish(self.event(kind, attempt));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::{BackoffPolicy, JitterPolicy};
    use crate::queue::ItemBackoffLimiter;
    use crate::error::UpdateError;
    use crate::updater::UpdateFn;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_queue() -> Arc<WorkQueue<String>> {
        WorkQueue::new(ItemBackoffLimiter::new(BackoffPolicy {
            first: Duration::from_millis(1),
            max: Duration::from_millis(1),
            factor: 1.0,
            jitter: JitterPolicy::None,
        }))
    }

    fn params(max_retries: u32) -> WorkerParams {
        WorkerParams {
            retry: RetryPolicy::new(max_retries),
            timeout: None,
        }
    }

    /// Collects update outcomes until `n` outcome events were seen.
    async fn outcomes(rx: &mut tokio::sync::broadcast::Receiver<Event>, n: usize) -> Vec<Event> {
        let mut seen = Vec::new();
        while seen.len() < n {
            let ev = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .expect("timed out waiting for outcome")
                .unwrap();
            if ev.is_update_outcome() {
                seen.push(ev);
            }
        }
        seen
    }

    #[tokio::test]
    async fn test_success_forgets_and_marks_done() {
        let queue = fast_queue();
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let updater: UpdaterRef = UpdateFn::arc(|_node: String| async { Ok::<_, UpdateError>(()) });

        let worker = tokio::spawn(
            Worker::new(0, queue.clone(), updater, params(5), bus.clone()).run(),
        );
        queue.add("node-a".into());

        let got = outcomes(&mut rx, 1).await;
        assert_eq!(got[0].kind, EventKind::UpdateSucceeded);
        assert_eq!(got[0].attempt, Some(1));
        assert_eq!(queue.num_requeues(&"node-a".to_string()), 0);

        queue.shut_down();
        worker.await.unwrap();
        assert_eq!(queue.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_retries_up_to_ceiling_then_drops() {
        let queue = fast_queue();
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let updater: UpdaterRef = UpdateFn::arc(move |_node: String| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(UpdateError::conflict("the object has been modified"))
            }
        });

        let worker = tokio::spawn(
            Worker::new(0, queue.clone(), updater, params(2), bus.clone()).run(),
        );
        queue.add("node-a".into());

        let got = outcomes(&mut rx, 3).await;
        let kinds: Vec<_> = got.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::UpdateFailed,
                EventKind::UpdateFailed,
                EventKind::UpdateDropped
            ]
        );
        let attempts: Vec<_> = got.iter().map(|e| e.attempt).collect();
        assert_eq!(attempts, vec![Some(1), Some(2), Some(3)]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(queue.num_requeues(&"node-a".to_string()), 0);

        queue.shut_down();
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn test_fatal_error_is_not_retried() {
        let queue = fast_queue();
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let updater: UpdaterRef =
            UpdateFn::arc(|_node: String| async { Err(UpdateError::fatal("node not found")) });

        let worker = tokio::spawn(
            Worker::new(3, queue.clone(), updater, params(5), bus.clone()).run(),
        );
        queue.add("gone".into());

        let got = outcomes(&mut rx, 1).await;
        assert_eq!(got[0].kind, EventKind::UpdateDropped);
        assert_eq!(got[0].worker, Some(3));
        assert!(got[0].reason.as_deref().unwrap().contains("node not found"));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(queue.is_empty());

        queue.shut_down();
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn test_failure_during_shutdown_is_reported_as_dropped() {
        let queue = fast_queue();
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let q = queue.clone();
        let updater: UpdaterRef = UpdateFn::arc(move |_node: String| {
            let q = q.clone();
            async move {
                q.shut_down();
                Err(UpdateError::conflict("the object has been modified"))
            }
        });

        let worker = tokio::spawn(
            Worker::new(0, queue.clone(), updater, params(5), bus.clone()).run(),
        );
        queue.add("node-a".into());

        let got = outcomes(&mut rx, 1).await;
        assert_eq!(got[0].kind, EventKind::UpdateDropped);
        assert!(got[0].reason.as_deref().unwrap().contains("shutting down"));
        assert_eq!(queue.num_requeues(&"node-a".to_string()), 0);

        worker.await.unwrap();
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_counts_as_retryable_failure() {
        let queue = fast_queue();
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let updater: UpdaterRef = UpdateFn::arc(|_node: String| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, UpdateError>(())
        });
        let params = WorkerParams {
            retry: RetryPolicy::new(0),
            timeout: Some(Duration::from_millis(10)),
        };

        let worker = tokio::spawn(Worker::new(0, queue.clone(), updater, params, bus.clone()).run());
        queue.add("slow".into());

        let got = outcomes(&mut rx, 1).await;
        assert_eq!(got[0].kind, EventKind::UpdateDropped);
        assert!(got[0].reason.as_deref().unwrap().contains("timed out"));

        queue.shut_down();
        worker.await.unwrap();
    }
}
