//! Pool core: workers and lifecycle.
//!
//! The public API from this module is [`NodeUpdaterPool`] and its [`PoolBuilder`].
//!
//! Internal modules:
//! - [`runner`]: executes one update attempt with timeout, panic isolation and event publishing;
//! - [`worker`]: one queue consumer applying the retry decision after each attempt;
//! - [`pool`]: owns the queue generation and the worker barrier, start/stop;
//! - [`shutdown`]: cross-platform shutdown signal handling.

mod builder;
mod pool;
mod runner;
mod shutdown;
mod worker;

pub use builder::PoolBuilder;
pub use pool::NodeUpdaterPool;
