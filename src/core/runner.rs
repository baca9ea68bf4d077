//! # Run a single update attempt.
//!
//! Executes one call of [`NodeUpdater::update_node`] for one node, with an
//! optional timeout and panic isolation.
//!
//! ```text
//! Success:  update_node() → Ok(())
//! Failure:  update_node() → Err(e)                       → Err(e)
//! Timeout:  timeout exceeded → publish TimeoutHit         → Err(Timeout)
//! Panic:    update_node() panics → caught                 → Err(Fatal)
//! ```
//!
//! ## Rules
//! - The attempt is never interrupted by pool shutdown; only the timeout abandons it.
//! - A panicking updater costs one attempt, never the worker.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tokio::time;

use crate::{
    error::UpdateError,
    events::{Bus, Event, EventKind},
    updater::NodeUpdater,
};

/// Identifies the attempt for event publishing.
pub(crate) struct Attempt<'a> {
    pub node: &'a str,
    pub worker: u32,
    pub number: u32,
}

/// Executes a single attempt of `updater` against `attempt.node`.
pub(crate) async fn run_once<U: NodeUpdater + ?Sized>(
    updater: &U,
    attempt: &Attempt<'_>,
    timeout: Option<Duration>,
    bus: &Bus,
) -> Result<(), UpdateError> {
    let call = AssertUnwindSafe(updater.update_node(attempt.node)).catch_unwind();

    let caught = match timeout.filter(|d| !d.is_zero()) {
        Some(dur) => match time::timeout(dur, call).await {
            Ok(r) => r,
            Err(_elapsed) => {
                publish_timeout(bus, attempt, dur);
                return Err(UpdateError::Timeout { timeout: dur });
            }
        },
        None => call.await,
    };

    caught.unwrap_or_else(|panic| {
        Err(UpdateError::Fatal {
            error: format!("updater panicked: {}", panic_message(panic.as_ref())),
        })
    })
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

fn publish_timeout(bus: &Bus, attempt: &Attempt<'_>, dur: Duration) {
    bus.publish(
        Event::new(EventKind::TimeoutHit)
            .with_node(attempt.node)
            .with_worker(attempt.worker)
            .with_attempt(attempt.number)
            .with_timeout(dur),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::updater::UpdateFn;

    fn attempt(node: &str) -> Attempt<'_> {
        Attempt {
            node,
            worker: 0,
            number: 1,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_publishes_and_fails() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let slow = UpdateFn::new(|_node: String| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, UpdateError>(())
        });

        let res = run_once(&slow, &attempt("n1"), Some(Duration::from_secs(1)), &bus).await;
        assert!(matches!(res, Err(UpdateError::Timeout { .. })));

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::TimeoutHit);
        assert_eq!(ev.timeout_ms, Some(1000));
        assert_eq!(ev.node.as_deref(), Some("n1"));
    }

    #[tokio::test]
    async fn test_zero_timeout_means_none() {
        let bus = Bus::new(16);
        let ok = UpdateFn::new(|_node: String| async { Ok::<_, UpdateError>(()) });
        assert!(run_once(&ok, &attempt("n1"), Some(Duration::ZERO), &bus).await.is_ok());
    }

    #[tokio::test]
    async fn test_panic_becomes_fatal() {
        let bus = Bus::new(16);
        let boom = UpdateFn::new(|node: String| async move {
            if !node.is_empty() {
                panic!("label map corrupted");
            }
            Ok::<_, UpdateError>(())
        });

        match run_once(&boom, &attempt("n1"), None, &bus).await {
            Err(UpdateError::Fatal { error }) => assert!(error.contains("label map corrupted")),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
