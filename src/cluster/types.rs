use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

/// Unique identifier for a cluster node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NodeState {
    Alive,
    Dead,
}

/// A cluster member as seen by the local node.
///
/// Resource fields are refreshed on every heartbeat; the dispatcher uses
/// `mem_free_bytes` to pick the least loaded node for a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInfo {
    pub id: NodeId,
    pub http_addr: SocketAddr,
    pub state: NodeState,
    pub mem_free_bytes: u64,
    pub mem_total_bytes: u64,
    /// Wall-clock ms of the last heartbeat observed from this node.
    pub last_heartbeat_ms: u64,
}

/// Current system time in milliseconds.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
