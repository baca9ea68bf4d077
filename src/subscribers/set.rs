//! # SubscriberSet: non-blocking fan-out over multiple subscribers
//!
//! [`SubscriberSet`] distributes each [`Event`] to multiple subscribers
//! **without awaiting** their processing.
//!
//! ## What it guarantees
//! - `emit(&Event)` returns immediately.
//! - Per-subscriber FIFO (queue order).
//! - Panics inside subscribers are caught and logged (isolation).
//! - `flush().await` returns once every event emitted before it was handled.
//!
//! ## What it does **not** guarantee
//! - No global ordering across different subscribers.
//! - No retries on per-subscriber queue overflow (events are dropped for that
//!   subscriber).
//!
//! ```text
//!    emit(&Event)
//!        │                        (Arc-clone per subscriber)
//!        ├────────────────► [queue S1] ─► worker S1 ─► on_event()
//!        ├────────────────► [queue S2] ─► worker S2 ─► on_event()
//!        └────────────────► [queue SN] ─► worker SN ─► on_event()
//!
//!    flush()  ─► Flush(ack) behind queued events in every queue ─► await all acks
//! ```

use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use crate::events::Event;

use super::Subscribe;

enum Envelope {
    Event(Arc<Event>),
    Flush(oneshot::Sender<()>),
}

struct SubscriberChannel {
    name: &'static str,
    sender: mpsc::Sender<Envelope>,
}

/// Composite fan-out with per-subscriber bounded queues and worker tasks.
///
/// Workers exit once the set is dropped and their queues are empty.
pub struct SubscriberSet {
    channels: Vec<SubscriberChannel>,
}

impl SubscriberSet {
    /// Creates a new set and spawns one worker per subscriber.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>) -> Self {
        let mut channels = Vec::with_capacity(subs.len());

        for sub in subs {
            let name = sub.name();
            let (tx, mut rx) = mpsc::channel::<Envelope>(sub.queue_capacity().max(1));

            tokio::spawn(async move {
                while let Some(envelope) = rx.recv().await {
                    match envelope {
                        Envelope::Event(ev) => {
                            let fut = sub.on_event(ev.as_ref());
                            if let Err(panic_err) =
                                std::panic::AssertUnwindSafe(fut).catch_unwind().await
                            {
                                warn!(subscriber = name, panic = ?panic_err, "subscriber panicked");
                            }
                        }
                        Envelope::Flush(ack) => {
                            let _ = ack.send(());
                        }
                    }
                }
            });

            channels.push(SubscriberChannel { name, sender: tx });
        }

        Self { channels }
    }

    /// Fan-out one event to all subscribers (non-blocking).
    ///
    /// If a subscriber's queue is **full** or **closed**, the event is dropped for it.
    pub fn emit(&self, event: &Event) {
        let ev = Arc::new(event.clone());
        for channel in &self.channels {
            match channel.sender.try_send(Envelope::Event(Arc::clone(&ev))) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(subscriber = channel.name, kind = ?event.kind, "subscriber queue full, event dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    warn!(subscriber = channel.name, kind = ?event.kind, "subscriber worker closed, event dropped");
                }
            }
        }
    }

    /// Waits until every subscriber has handled the events emitted before this call.
    ///
    /// Unlike `emit`, this waits for queue space instead of dropping the marker.
    pub async fn flush(&self) {
        let mut acks = Vec::with_capacity(self.channels.len());
        for channel in &self.channels {
            let (tx, rx) = oneshot::channel();
            if channel.sender.send(Envelope::Flush(tx)).await.is_ok() {
                acks.push(rx);
            }
        }
        for ack in acks {
            let _ = ack.await;
        }
    }

    /// True if there are no subscribers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Number of subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counter(AtomicUsize);

    #[async_trait]
    impl Subscribe for Counter {
        async fn on_event(&self, _ev: &Event) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Panicker;

    #[async_trait]
    impl Subscribe for Panicker {
        async fn on_event(&self, _ev: &Event) {
            panic!("subscriber bug");
        }

        fn name(&self) -> &'static str {
            "panicker"
        }
    }

    #[tokio::test]
    async fn test_panicking_subscriber_does_not_affect_others() {
        let counter = Arc::new(Counter::default());
        let set = SubscriberSet::new(vec![Arc::new(Panicker), counter.clone()]);
        assert_eq!(set.len(), 2);

        set.emit(&Event::new(EventKind::PoolStarted));
        set.emit(&Event::new(EventKind::PoolStopping));
        set.flush().await;

        assert_eq!(counter.0.load(Ordering::SeqCst), 2);
    }

    struct Slow(AtomicUsize);

    #[async_trait]
    impl Subscribe for Slow {
        async fn on_event(&self, _ev: &Event) {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_flush_waits_for_queued_events() {
        let slow = Arc::new(Slow(AtomicUsize::new(0)));
        let set = SubscriberSet::new(vec![slow.clone()]);

        for _ in 0..3 {
            set.emit(&Event::new(EventKind::UpdateSucceeded));
        }
        assert!(slow.0.load(Ordering::SeqCst) < 3);

        set.flush().await;
        assert_eq!(slow.0.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_empty_set_accepts_events() {
        let set = SubscriberSet::new(Vec::new());
        assert!(set.is_empty());
        set.emit(&Event::new(EventKind::PoolStarted));
        set.flush().await;
    }
}
