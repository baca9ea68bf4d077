//! # Event bus for pool events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`]: workers and the pool
//! publish without blocking, and the pool's listener fans events out to subscribers.
//!
//! ```text
//! Publishers (many):                 Subscriber (one):
//!   Worker 0 ──┐
//!   Worker 1 ──┼──────► Bus ───────► subscriber_listener ────► SubscriberSet
//!   Worker N ──┤  (broadcast chan)     (in NodeUpdaterPool)
//!   Pool     ──┘
//! ```
//!
//! ## Rules
//! - `publish()` never blocks.
//! - A single bounded ring buffer is shared by all receivers.
//! - Slow receivers get `RecvError::Lagged(n)` and skip `n` oldest items.
//! - Events published with no receiver are lost.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for pool events. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all active receivers; dropped if there are none.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a receiver that observes events sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn test_receivers_see_events_after_subscribe() {
        let bus = Bus::new(0);
        bus.publish(Event::new(EventKind::PoolStarted));

        let mut rx = bus.subscribe();
        bus.publish(Event::new(EventKind::PoolStopping).with_workers(3));

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::PoolStopping);
        assert_eq!(ev.workers, Some(3));
    }
}
