//! Task Dispatcher
//!
//! Pure node selection: given the cluster's current resource view, decide
//! which node id should execute a job. Picks the alive node with the most
//! free memory, breaking ties by node id ordering so the choice is
//! deterministic. No capacity is reserved here; admission on the chosen node
//! is the circuit breaker's job.

use std::sync::Arc;

use crate::cluster::service::ClusterService;
use crate::cluster::types::NodeId;
use crate::error::MlError;

pub struct TaskDispatcher {
    cluster: Arc<ClusterService>,
}

impl TaskDispatcher {
    pub fn new(cluster: Arc<ClusterService>) -> Self {
        Self { cluster }
    }

    /// Resolves the node that should execute the next job.
    ///
    /// The local node is always a member of its own cluster view, so under
    /// normal operation this cannot fail; an empty view is a terminal
    /// dispatch error rather than a silent drop.
    pub async fn dispatch(&self) -> Result<NodeId, MlError> {
        let mut candidates = self.cluster.alive_members();
        if candidates.is_empty() {
            return Err(MlError::DispatchFailed(
                "no alive nodes to dispatch to".to_string(),
            ));
        }

        candidates.sort_by(|a, b| {
            b.mem_free_bytes
                .cmp(&a.mem_free_bytes)
                .then_with(|| a.id.cmp(&b.id))
        });

        let chosen = candidates[0].id.clone();
        tracing::debug!(
            "Dispatch resolved node {:?} (free={}B, {} candidates)",
            chosen,
            candidates[0].mem_free_bytes,
            candidates.len()
        );
        Ok(chosen)
    }
}
