use std::sync::Arc;

use axum::{http::StatusCode, Extension, Json};

use super::protocol::*;
use super::service::ClusterService;

pub async fn handle_cluster_join(
    Extension(cluster): Extension<Arc<ClusterService>>,
    Json(req): Json<JoinRequest>,
) -> (StatusCode, Json<JoinResponse>) {
    tracing::info!("Node {:?} joining from {}", req.node.id, req.node.http_addr);
    cluster.observe(req.node);

    (
        StatusCode::OK,
        Json(JoinResponse {
            members: cluster.members_snapshot(),
        }),
    )
}

pub async fn handle_cluster_heartbeat(
    Extension(cluster): Extension<Arc<ClusterService>>,
    Json(req): Json<HeartbeatRequest>,
) -> (StatusCode, Json<HeartbeatResponse>) {
    cluster.observe(req.node);

    (
        StatusCode::OK,
        Json(HeartbeatResponse {
            members: cluster.members_snapshot(),
        }),
    )
}
