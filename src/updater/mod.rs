//! # Node update operation.
//!
//! - [`NodeUpdater`] - trait implemented by the cluster API client adapter
//! - [`UpdateFn`] - closure-backed implementation
//! - [`UpdaterRef`] - shared handle (`Arc<dyn NodeUpdater>`)

mod update_fn;
#[allow(clippy::module_inception)]
mod updater;

pub use update_fn::UpdateFn;
pub use updater::{NodeUpdater, UpdaterRef};
