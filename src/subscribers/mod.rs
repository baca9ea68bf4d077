//! # Event subscribers for the node updater pool.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out and
//! built-in subscribers for events broadcast through the [`Bus`](crate::events::Bus).
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   Worker ── publish(Event) ──► Bus ──► pool listener ──► SubscriberSet::emit
//!                                                               │
//!                                               ┌───────────────┼───────────────┐
//!                                               ▼               ▼               ▼
//!                                           LogWriter      UpdateStats        Custom
//! ```
//!
//! ## Subscriber types
//! - **Passive subscribers** - observe and react to events (logging, alerts)
//! - **Stateful subscribers** - maintain internal state based on events ([`UpdateStats`])

#[cfg(feature = "logging")]
mod log;
mod set;
mod stats;
mod subscriber;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use stats::{StatsSnapshot, UpdateStats};
pub use subscriber::Subscribe;
