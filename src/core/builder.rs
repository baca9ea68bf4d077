use std::sync::Arc;

use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use crate::{
    config::PoolConfig,
    events::Bus,
    subscribers::{Subscribe, SubscriberSet},
    updater::UpdaterRef,
};

use super::pool::NodeUpdaterPool;

/// Builder for constructing a [`NodeUpdaterPool`] with optional subscribers.
pub struct PoolBuilder {
    cfg: PoolConfig,
    updater: UpdaterRef,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl PoolBuilder {
    /// Creates a new builder with the given configuration and update operation.
    pub fn new(cfg: PoolConfig, updater: UpdaterRef) -> Self {
        Self {
            cfg,
            updater,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive pool events (worker lifecycle, update outcomes, etc.)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the pool and starts forwarding bus events to the subscribers.
    ///
    /// Workers are not started; call [`NodeUpdaterPool::start`].
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> Arc<NodeUpdaterPool> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let flush = if self.subscribers.is_empty() {
            None
        } else {
            let (tx, rx) = mpsc::channel(1);
            subscriber_listener(&bus, SubscriberSet::new(self.subscribers), rx);
            Some(tx)
        };

        Arc::new(NodeUpdaterPool::new_internal(
            self.cfg,
            self.updater,
            bus,
            flush,
        ))
    }
}

/// Forwards bus events to the subscriber set until every publisher is gone.
///
/// A flush request first forwards everything already on the bus, then waits for
/// the subscribers to handle it before acknowledging.
fn subscriber_listener(
    bus: &Bus,
    set: SubscriberSet,
    mut flush: mpsc::Receiver<oneshot::Sender<()>>,
) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                res = rx.recv() => match res {
                    Ok(ev) => set.emit(&ev),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "subscriber listener lagged behind the event bus");
                    }
                    Err(RecvError::Closed) => break,
                },
                Some(ack) = flush.recv() => {
                    loop {
                        match rx.try_recv() {
                            Ok(ev) => set.emit(&ev),
                            Err(TryRecvError::Lagged(skipped)) => {
                                warn!(skipped, "subscriber listener lagged behind the event bus");
                            }
                            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
                        }
                    }
                    set.flush().await;
                    let _ = ack.send(());
                }
            }
        }
    });
}
