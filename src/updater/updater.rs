//! # The node update operation.
//!
//! [`NodeUpdater`] is the seam to the cluster API client: "apply the computed
//! labels/annotations to node X". The pool calls it once per dequeued node per
//! attempt and never concurrently for the same node.

use async_trait::async_trait;

use crate::error::UpdateError;

/// # Applies the desired labels/annotations to one node.
///
/// Implementations read the current node object, merge the desired state and write
/// it back. Return a retryable [`UpdateError`] for transient API failures
/// (conflicts, timeouts, unavailability) and [`UpdateError::Fatal`] when retrying
/// cannot help.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use nodevisor::{NodeUpdater, UpdateError};
///
/// struct Labeler;
///
/// #[async_trait]
/// impl NodeUpdater for Labeler {
///     async fn update_node(&self, node: &str) -> Result<(), UpdateError> {
///         if node.is_empty() {
///             return Err(UpdateError::fatal("empty node name"));
///         }
///         // PATCH /api/v1/nodes/{node} ...
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait NodeUpdater: Send + Sync + 'static {
    /// Applies the desired state to `node`.
    async fn update_node(&self, node: &str) -> Result<(), UpdateError>;
}

/// Shared handle to an updater.
pub type UpdaterRef = std::sync::Arc<dyn NodeUpdater>;
