//! # NodeUpdaterPool: queue ownership, worker fan-out and lifecycle.
//!
//! The [`NodeUpdaterPool`] owns the current [`WorkQueue`] generation, the worker
//! barrier and the event bus. Upstream event handlers call [`enqueue`](NodeUpdaterPool::enqueue);
//! the owning controller calls [`start`](NodeUpdaterPool::start) and
//! [`stop`](NodeUpdaterPool::stop).
//!
//! ## Lifecycle
//! ```text
//!            start(n)                              stop()
//!   ┌──────────────────────────┐        ┌───────────────────────────────┐
//!   │ lock                     │        │ lock                          │
//!   │ queue live? → no-op      │        │ no live queue? → no-op        │
//!   │ queue   = WorkQueue::new │        │ queue.shut_down()             │
//!   │ tracker = TaskTracker    │        │ tracker.close()               │
//!   │ n × tracker.spawn(worker)│        │ stopped.spawn(waiter)         │
//!   │ unlock                   │        │ unlock                        │
//!   │ publish PoolStarted      │        │ waiter: tracker.wait()        │
//!   └──────────────────────────┘        │   → publish PoolStopped       │
//!                                       └───────────────────────────────┘
//! ```
//!
//! ## Rules
//! - The "already running" check and the queue swap happen under one lock.
//! - The lock is never held across an `.await`.
//! - The barrier is incremented only at spawn time under the lock and decremented
//!   only by each worker's own exit.
//! - `stop` never waits; use [`wait_stopped`](NodeUpdaterPool::wait_stopped) to await the drain.
//!   Nodes enqueued before `stop` are still updated during the drain.
//! - Dropping the pool shuts the live queue down, so workers never outlive it.
//! - After `stop` the shut-down queue stays visible through [`queue`](NodeUpdaterPool::queue)
//!   until the next `start` replaces it.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use nodevisor::{NodeUpdaterPool, PoolConfig, UpdateError, UpdateFn};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let updater = UpdateFn::arc(|_node: String| async { Ok::<_, UpdateError>(()) });
//!     let pool = NodeUpdaterPool::builder(PoolConfig::default(), updater).build();
//!
//!     pool.start(4);
//!     pool.enqueue("worker-1");
//!     pool.enqueue("worker-1"); // coalesced
//!
//!     pool.stop();
//!     pool.wait_stopped(Duration::from_secs(5)).await?;
//!     Ok(())
//! }
//! ```

use std::future::Future;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio_util::task::TaskTracker;
use tracing::debug;

use crate::{
    config::PoolConfig,
    core::{
        builder::PoolBuilder,
        shutdown,
        worker::{Worker, WorkerParams},
    },
    error::PoolError,
    events::{Bus, Event, EventKind},
    queue::WorkQueue,
    updater::UpdaterRef,
};

/// One queue plus the barrier of the workers consuming it.
struct Generation {
    queue: Arc<WorkQueue<String>>,
    workers: TaskTracker,
    // Holds the task that publishes PoolStopped.
    stopped: TaskTracker,
}

/// Applies node updates with a configurable number of workers.
pub struct NodeUpdaterPool {
    cfg: PoolConfig,
    updater: UpdaterRef,
    bus: Bus,
    flush: Option<mpsc::Sender<oneshot::Sender<()>>>,
    current: Mutex<Option<Generation>>,
}

impl NodeUpdaterPool {
    /// Returns a [`PoolBuilder`] for `cfg` and `updater`.
    pub fn builder(cfg: PoolConfig, updater: UpdaterRef) -> PoolBuilder {
        PoolBuilder::new(cfg, updater)
    }

    /// Builds a pool without subscribers.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(cfg: PoolConfig, updater: UpdaterRef) -> Arc<Self> {
        PoolBuilder::new(cfg, updater).build()
    }

    pub(crate) fn new_internal(
        cfg: PoolConfig,
        updater: UpdaterRef,
        bus: Bus,
        flush: Option<mpsc::Sender<oneshot::Sender<()>>>,
    ) -> Self {
        Self {
            cfg,
            updater,
            bus,
            flush,
            current: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Generation>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts `workers` workers on a fresh queue. No-op while a live queue exists.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, workers: usize) {
        {
            let mut current = self.lock();
            if current
                .as_ref()
                .is_some_and(|g| !g.queue.is_shutting_down())
            {
                debug!(workers, "node updater pool already running");
                return;
            }

            let queue = WorkQueue::new(self.cfg.rate_limiter::<String>());
            let tracker = TaskTracker::new();
            let params = WorkerParams {
                retry: self.cfg.retry,
                timeout: self.cfg.update_timeout(),
            };
            for id in 0..workers {
                let worker = Worker::new(
                    u32::try_from(id).unwrap_or(u32::MAX),
                    Arc::clone(&queue),
                    Arc::clone(&self.updater),
                    params.clone(),
                    self.bus.clone(),
                );
                tracker.spawn(worker.run());
            }

            *current = Some(Generation {
                queue,
                workers: tracker,
                stopped: TaskTracker::new(),
            });
        }

        self.bus
            .publish(Event::new(EventKind::PoolStarted).with_workers(workers));
    }

    /// Shuts the queue down and lets workers drain in the background.
    ///
    /// New requests are refused; nodes already queued (or re-added while in flight)
    /// are still updated before the workers exit. No-op when the pool is not running.
    /// Must be called from within a tokio runtime.
    pub fn stop(&self) {
        {
            let current = self.lock();
            let Some(generation) = current
                .as_ref()
                .filter(|g| !g.queue.is_shutting_down())
            else {
                debug!("node updater pool not running");
                return;
            };
            generation.queue.shut_down();
            generation.workers.close();

            self.bus.publish(Event::new(EventKind::PoolStopping));

            let workers = generation.workers.clone();
            let bus = self.bus.clone();
            generation.stopped.spawn(async move {
                workers.wait().await;
                bus.publish(Event::new(EventKind::PoolStopped));
            });
            generation.stopped.close();
        }
    }

    /// Requests an update of `node`. Ignored when the pool is not running.
    pub fn enqueue(&self, node: impl Into<String>) {
        let node = node.into();
        match self.queue() {
            Some(queue) if !queue.is_shutting_down() => queue.add(node),
            _ => debug!(%node, "node updater pool not running, update request ignored"),
        }
    }

    /// Current queue generation, if the pool was ever started.
    pub fn queue(&self) -> Option<Arc<WorkQueue<String>>> {
        self.lock().as_ref().map(|g| Arc::clone(&g.queue))
    }

    /// True if started and not stopped.
    pub fn is_running(&self) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|g| !g.queue.is_shutting_down())
    }

    /// Workers of the current generation that have not exited yet.
    pub fn active_workers(&self) -> usize {
        self.lock().as_ref().map_or(0, |g| g.workers.len())
    }

    /// Pool configuration.
    pub fn config(&self) -> &PoolConfig {
        &self.cfg
    }

    /// Event bus; subscribe to observe pool events directly.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Waits up to `grace` for the current generation's workers to exit and for
    /// `PoolStopped` to be published.
    ///
    /// Returns immediately if the pool was never started. While the pool is still
    /// running this waits for somebody else to call [`stop`](Self::stop).
    pub async fn wait_stopped(&self, grace: Duration) -> Result<(), PoolError> {
        let Some((workers, stopped)) = self.current_trackers() else {
            return Ok(());
        };

        let drained = async {
            workers.wait().await;
            stopped.wait().await;
        };
        match tokio::time::timeout(grace, drained).await {
            Ok(()) => Ok(()),
            Err(_elapsed) => {
                let stuck = workers.len();
                self.bus
                    .publish(Event::new(EventKind::GraceExceeded).with_workers(stuck));
                Err(PoolError::GraceExceeded { grace, stuck })
            }
        }
    }

    /// Waits until every subscriber has handled the events published so far.
    pub async fn flush_events(&self) {
        let Some(flush) = &self.flush else {
            return;
        };
        let (ack, done) = oneshot::channel();
        if flush.send(ack).await.is_ok() {
            let _ = done.await;
        }
    }

    /// Runs [`PoolConfig::workers`] workers until SIGINT/SIGTERM/SIGQUIT (Ctrl-C on
    /// other platforms), then stops, waits up to [`PoolConfig::grace`] and flushes
    /// subscribers.
    pub async fn run_until_signal(&self) -> Result<(), PoolError> {
        self.run_until(shutdown::wait_for_shutdown_signal()).await
    }

    pub(crate) async fn run_until<F>(&self, signal: F) -> Result<(), PoolError>
    where
        F: Future<Output = io::Result<()>>,
    {
        self.start(self.cfg.workers);
        let signal = signal.await;
        self.stop();
        let res = match signal {
            Ok(()) => self.wait_stopped(self.cfg.grace).await,
            Err(e) => Err(PoolError::from(e)),
        };
        self.flush_events().await;
        res
    }

    fn current_trackers(&self) -> Option<(TaskTracker, TaskTracker)> {
        self.lock()
            .as_ref()
            .map(|g| (g.workers.clone(), g.stopped.clone()))
    }
}

impl Drop for NodeUpdaterPool {
    fn drop(&mut self) {
        let current = self
            .current
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(generation) = current.as_ref() {
            generation.queue.shut_down();
            generation.workers.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UpdateError;
    use crate::subscribers::{Subscribe, UpdateStats};
    use crate::updater::UpdateFn;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ok_pool() -> Arc<NodeUpdaterPool> {
        let updater = UpdateFn::arc(|_node: String| async { Ok::<_, UpdateError>(()) });
        NodeUpdaterPool::builder(PoolConfig::default(), updater).build()
    }

    async fn eventually(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while tokio::time::Instant::now() < deadline {
            if cond() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        cond()
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let pool = ok_pool();
        pool.start(10);
        let q = pool.queue().unwrap();
        assert!(!q.is_shutting_down());

        pool.start(10);
        assert!(Arc::ptr_eq(&q, &pool.queue().unwrap()));
        assert_eq!(pool.active_workers(), 10);
    }

    #[tokio::test]
    async fn test_stop_before_start_is_noop() {
        let pool = ok_pool();
        pool.stop();
        assert!(pool.queue().is_none());
        assert!(!pool.is_running());
        pool.wait_stopped(Duration::from_millis(10)).await.unwrap();
    }

    #[tokio::test]
    async fn test_enqueue_when_stopped_is_ignored() {
        let pool = ok_pool();
        pool.enqueue("worker-1");
        assert!(pool.queue().is_none());

        pool.start(0);
        pool.stop();
        pool.enqueue("worker-1");
        assert_eq!(pool.queue().unwrap().len(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_stop_drains_workers_and_restart_creates_new_queue() {
        let pool = ok_pool();
        pool.start(4);
        let first = pool.queue().unwrap();

        pool.stop();
        pool.stop();
        assert!(first.is_shutting_down());
        pool.wait_stopped(Duration::from_secs(2)).await.unwrap();
        assert_eq!(pool.active_workers(), 0);

        pool.start(2);
        let second = pool.queue().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(!second.is_shutting_down());
        assert_eq!(pool.active_workers(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_stop_waits_for_in_flight_update() {
        let updater = UpdateFn::arc(|_node: String| async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, UpdateError>(())
        });
        let pool = NodeUpdaterPool::builder(PoolConfig::default(), updater).build();
        pool.start(1);
        pool.enqueue("slow-node");
        let queue = pool.queue().unwrap();
        assert!(eventually(|| queue.in_flight() == 1).await);

        pool.stop();
        let err = pool
            .wait_stopped(Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, PoolError::GraceExceeded { stuck: 1, .. }));

        pool.wait_stopped(Duration::from_secs(2)).await.unwrap();
        assert_eq!(queue.in_flight(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_stop_drains_queued_and_readded_nodes() {
        let processed = Arc::new(Mutex::new(Vec::new()));
        let seen = processed.clone();
        let updater = UpdateFn::arc(move |node: String| {
            let seen = seen.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                seen.lock().unwrap().push(node);
                Ok::<_, UpdateError>(())
            }
        });
        let pool = NodeUpdaterPool::builder(PoolConfig::default(), updater).build();
        pool.start(1);

        pool.enqueue("node-a");
        let queue = pool.queue().unwrap();
        assert!(eventually(|| queue.in_flight() == 1).await);
        pool.enqueue("node-b");
        pool.enqueue("node-a");

        pool.stop();
        pool.enqueue("node-c");
        pool.wait_stopped(Duration::from_secs(2)).await.unwrap();

        assert_eq!(
            *processed.lock().unwrap(),
            vec!["node-a".to_string(), "node-b".into(), "node-a".into()]
        );
        assert!(queue.is_empty());
        assert_eq!(queue.in_flight(), 0);
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<EventKind>>);

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, ev: &Event) {
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.0.lock().unwrap().push(ev.kind);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_run_until_uses_configured_workers_and_flushes_subscribers() {
        let mut cfg = PoolConfig::default();
        cfg.workers = 3;
        let recorder = Arc::new(Recorder::default());
        let updater = UpdateFn::arc(|_node: String| async { Ok::<_, UpdateError>(()) });
        let pool = NodeUpdaterPool::builder(cfg, updater)
            .with_subscribers(vec![recorder.clone() as Arc<dyn Subscribe>])
            .build();

        let (signal_tx, signal_rx) = oneshot::channel::<()>();
        let running = Arc::clone(&pool);
        let run = tokio::spawn(async move {
            running
                .run_until(async {
                    let _ = signal_rx.await;
                    Ok::<_, io::Error>(())
                })
                .await
        });

        assert!(eventually(|| pool.active_workers() == 3).await);
        pool.enqueue("node-a");
        let queue = pool.queue().unwrap();
        assert!(eventually(|| queue.is_empty() && queue.in_flight() == 0).await);

        signal_tx.send(()).unwrap();
        run.await.unwrap().unwrap();

        let kinds = recorder.0.lock().unwrap().clone();
        assert!(kinds.contains(&EventKind::PoolStarted));
        assert!(kinds.contains(&EventKind::UpdateSucceeded));
        assert_eq!(kinds.last(), Some(&EventKind::PoolStopped));
        assert_eq!(
            kinds.iter().filter(|k| **k == EventKind::WorkerExited).count(),
            3
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_drop_shuts_down_live_queue() {
        let pool = ok_pool();
        pool.start(2);
        let queue = pool.queue().unwrap();

        drop(pool);
        assert!(queue.is_shutting_down());
        assert!(eventually(|| Arc::strong_count(&queue) == 1).await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_one_node_never_updated_concurrently() {
        let running = Arc::new(AtomicUsize::new(0));
        let overlap = Arc::new(AtomicUsize::new(0));
        let calls = Arc::new(AtomicUsize::new(0));
        let (r, o, c) = (running.clone(), overlap.clone(), calls.clone());
        let updater = UpdateFn::arc(move |_node: String| {
            let (r, o, c) = (r.clone(), o.clone(), c.clone());
            async move {
                if r.fetch_add(1, Ordering::SeqCst) > 0 {
                    o.fetch_add(1, Ordering::SeqCst);
                }
                tokio::time::sleep(Duration::from_millis(30)).await;
                r.fetch_sub(1, Ordering::SeqCst);
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<_, UpdateError>(())
            }
        });
        let pool = NodeUpdaterPool::builder(PoolConfig::default(), updater).build();
        pool.start(8);

        pool.enqueue("worker-1");
        let queue = pool.queue().unwrap();
        assert!(eventually(|| queue.in_flight() == 1).await);
        for _ in 0..20 {
            pool.enqueue("worker-1");
        }

        assert!(eventually(|| calls.load(Ordering::SeqCst) == 2 && queue.in_flight() == 0).await);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2, "re-adds collapse into one follow-up");
        assert_eq!(overlap.load(Ordering::SeqCst), 0);
        pool.stop();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_lifecycle_events_reach_subscribers() {
        let stats = Arc::new(UpdateStats::new());
        let updater = UpdateFn::arc(|node: String| async move {
            if node == "broken" {
                Err(UpdateError::fatal("invalid label"))
            } else {
                Ok(())
            }
        });
        let pool = NodeUpdaterPool::builder(PoolConfig::default(), updater)
            .with_subscribers(vec![stats.clone() as Arc<dyn Subscribe>])
            .build();

        let mut rx = pool.bus().subscribe();
        pool.start(2);
        pool.enqueue("healthy");
        pool.enqueue("broken");

        assert!(eventually(|| {
            let s = stats.snapshot();
            s.succeeded == 1 && s.failures == 1
        })
        .await);
        assert_eq!(stats.snapshot().requests, 2);

        pool.stop();
        let mut saw_stopped = false;
        while let Ok(Ok(ev)) = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await {
            if ev.kind == EventKind::PoolStopped {
                saw_stopped = true;
                break;
            }
        }
        assert!(saw_stopped);
    }
}
