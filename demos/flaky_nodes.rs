//! # Example: flaky_nodes
//!
//! Runs a node updater pool against a simulated API server that rejects the
//! first writes to some nodes with a conflict and refuses one node outright.
//!
//! ## Flow
//! ```text
//! enqueue(worker-0..worker-4, control-plane)
//!   ├─► worker-N: Conflict, Conflict, Ok   (requeued with 5ms, 10ms backoff)
//!   ├─► control-plane: Fatal               (dropped immediately)
//!   └─► others: Ok on the first attempt
//! stop() ─► wait_stopped(grace)
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=nodevisor=debug cargo run --example flaky_nodes
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use nodevisor::{
    JitterPolicy, LogWriter, NodeUpdaterPool, PoolConfig, Subscribe, UpdateError, UpdateFn,
    UpdateStats, UpdaterRef,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nodevisor=info")),
        )
        .init();

    // 1. Configure the pool (small retry ceiling, jittered backoff, 5s grace)
    let mut cfg = PoolConfig::default();
    cfg.retry = nodevisor::RetryPolicy::new(3);
    cfg.backoff.jitter = JitterPolicy::Equal;
    cfg.update_timeout = Duration::from_secs(2);
    cfg.grace = Duration::from_secs(5);

    // 2. Subscribers: tracing output and counters
    let stats = Arc::new(UpdateStats::new());
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new()), stats.clone()];

    // 3. Simulated API server: odd nodes conflict twice before accepting writes
    let writes: Arc<Mutex<HashMap<String, u32>>> = Arc::default();
    let updater: UpdaterRef = UpdateFn::arc(move |node: String| {
        let writes = Arc::clone(&writes);
        async move {
            if node == "control-plane" {
                return Err(UpdateError::fatal("node is not managed by this controller"));
            }
            let attempt = {
                let mut w = writes.lock().unwrap_or_else(PoisonError::into_inner);
                let n = w.entry(node.clone()).or_insert(0);
                *n += 1;
                *n
            };
            tokio::time::sleep(Duration::from_millis(20)).await;

            let flaky = node.ends_with('1') || node.ends_with('3');
            if flaky && attempt <= 2 {
                Err(UpdateError::conflict(format!(
                    "operation cannot be fulfilled on nodes \"{node}\": the object has been modified"
                )))
            } else {
                Ok(())
            }
        }
    });

    // 4. Build and start
    let pool = NodeUpdaterPool::builder(cfg, updater)
        .with_subscribers(subs)
        .build();
    pool.start(4);

    for i in 0..5 {
        pool.enqueue(format!("worker-{i}"));
    }
    pool.enqueue("control-plane");
    pool.enqueue("worker-0"); // coalesced while still pending

    // 5. Give retries time to settle, then stop and wait for the drain
    tokio::time::sleep(Duration::from_secs(1)).await;
    pool.stop();
    pool.wait_stopped(pool.config().grace).await?;

    let s = stats.snapshot();
    println!(
        "[main] requests={} succeeded={} retried={} dropped={} timeouts={}",
        s.requests, s.succeeded, s.retried, s.failures, s.timeouts
    );
    Ok(())
}
