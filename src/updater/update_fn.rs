//! # Function-backed updater (`UpdateFn`)
//!
//! [`UpdateFn`] wraps a closure `F: Fn(String) -> Fut`, producing a fresh future
//! per attempt. Shared state goes in an explicit `Arc<...>` captured by the closure.
//!
//! ## Example
//! ```rust
//! use nodevisor::{UpdateError, UpdateFn, UpdaterRef};
//!
//! let updater: UpdaterRef = UpdateFn::arc(|node: String| async move {
//!     if node.starts_with("control-plane") {
//!         return Err(UpdateError::fatal("refusing to relabel control plane"));
//!     }
//!     Ok(())
//! });
//! # let _ = updater;
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::UpdateError;
use crate::updater::updater::NodeUpdater;

/// Closure-backed [`NodeUpdater`].
#[derive(Debug)]
pub struct UpdateFn<F> {
    f: F,
}

impl<F> UpdateFn<F> {
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Wraps `f` and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<F, Fut> NodeUpdater for UpdateFn<F>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), UpdateError>> + Send + 'static,
{
    async fn update_node(&self, node: &str) -> Result<(), UpdateError> {
        (self.f)(node.to_string()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_closure_receives_node_name() {
        let updater = UpdateFn::new(|node: String| async move {
            if node == "bad" {
                Err(UpdateError::fail("nope"))
            } else {
                Ok(())
            }
        });
        assert!(updater.update_node("good").await.is_ok());
        assert!(updater.update_node("bad").await.is_err());
    }
}
