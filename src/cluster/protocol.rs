//! Cluster Protocol Definitions
//!
//! DTOs and endpoint constants for the HTTP membership exchange. Joining and
//! heartbeating share a shape: a node announces itself (with fresh resource
//! telemetry) and receives the receiver's full member list back, so views
//! converge without a separate sync round.

use serde::{Deserialize, Serialize};

use super::types::NodeInfo;

pub const ENDPOINT_CLUSTER_JOIN: &str = "/internal/cluster/join";
pub const ENDPOINT_CLUSTER_HEARTBEAT: &str = "/internal/cluster/heartbeat";

#[derive(Debug, Serialize, Deserialize)]
pub struct JoinRequest {
    pub node: NodeInfo,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JoinResponse {
    pub members: Vec<NodeInfo>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub node: NodeInfo,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub members: Vec<NodeInfo>,
}
