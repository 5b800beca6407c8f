//! Node Assembly
//!
//! Wires the subsystems into a runnable node and builds the axum router they
//! hang off. `main.rs` serves the router on the configured address;
//! integration tests build a `Node` directly and serve the same router on an
//! ephemeral listener.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Extension, Router};

use crate::breaker::{CircuitBreakerService, MemoryCircuitBreaker, DEFAULT_MEMORY_THRESHOLD};
use crate::cluster::handlers::{handle_cluster_heartbeat, handle_cluster_join};
use crate::cluster::protocol::{ENDPOINT_CLUSTER_HEARTBEAT, ENDPOINT_CLUSTER_JOIN};
use crate::cluster::service::ClusterService;
use crate::dataset::resolver::{DocumentStoreResolver, InputResolver};
use crate::engine::MlEngine;
use crate::stats::MlStats;
use crate::store::{DocumentStore, MemoryStore};
use crate::task::handlers::{
    handle_execute, handle_get_task, handle_internal_execute, handle_internal_predict,
    handle_internal_train, handle_predict, handle_stats, handle_train,
};
use crate::task::manager::TaskManager;
use crate::task::protocol::{
    ENDPOINT_EXECUTE, ENDPOINT_INTERNAL_EXECUTE, ENDPOINT_INTERNAL_PREDICT,
    ENDPOINT_INTERNAL_TRAIN, ENDPOINT_PREDICT, ENDPOINT_TRAIN,
};
use crate::task::runner::TaskRunner;

pub struct Node {
    pub cluster: Arc<ClusterService>,
    pub stats: Arc<MlStats>,
    pub store: Arc<dyn DocumentStore>,
    pub manager: Arc<TaskManager>,
    pub runner: Arc<TaskRunner>,
}

impl Node {
    pub fn new(http_addr: SocketAddr, seed_nodes: Vec<SocketAddr>) -> Self {
        let cluster = ClusterService::new(http_addr, seed_nodes);
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let manager = TaskManager::new(store.clone());
        let stats = MlStats::new();
        let resolver: Arc<dyn InputResolver> =
            Arc::new(DocumentStoreResolver::new(store.clone()));

        let mut breakers = CircuitBreakerService::new();
        breakers.register(Box::new(MemoryCircuitBreaker::new(DEFAULT_MEMORY_THRESHOLD)));

        let runner = TaskRunner::new(
            cluster.clone(),
            manager.clone(),
            stats.clone(),
            Arc::new(breakers),
            store.clone(),
            MlEngine::with_builtins(),
            resolver,
        );

        Self {
            cluster,
            stats,
            store,
            manager,
            runner,
        }
    }

    /// Joins the cluster and spawns the membership loops.
    pub async fn start(&self) -> anyhow::Result<()> {
        self.cluster.clone().start().await
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route(ENDPOINT_TRAIN, post(handle_train))
            .route(ENDPOINT_PREDICT, post(handle_predict))
            .route(ENDPOINT_EXECUTE, post(handle_execute))
            .route(ENDPOINT_INTERNAL_TRAIN, post(handle_internal_train))
            .route(ENDPOINT_INTERNAL_PREDICT, post(handle_internal_predict))
            .route(ENDPOINT_INTERNAL_EXECUTE, post(handle_internal_execute))
            .route("/ml/task/:task_id", get(handle_get_task))
            .route("/ml/stats", get(handle_stats))
            .route(ENDPOINT_CLUSTER_JOIN, post(handle_cluster_join))
            .route(ENDPOINT_CLUSTER_HEARTBEAT, post(handle_cluster_heartbeat))
            .layer(Extension(self.cluster.clone()))
            .layer(Extension(self.stats.clone()))
            .layer(Extension(self.runner.clone()))
    }
}
