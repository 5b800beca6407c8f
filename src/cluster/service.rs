//! Cluster Membership Service
//!
//! Tracks which nodes are part of the cluster and how much memory each one
//! has free. Nodes join through a seed node, then exchange periodic HTTP
//! heartbeats carrying fresh resource telemetry. A node that misses
//! heartbeats long enough is marked dead and drops out of dispatch.
//!
//! Construction is side-effect free; `start` spawns the background loops.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use dashmap::DashMap;
use sysinfo::{System, SystemExt};

use super::protocol::{
    HeartbeatRequest, HeartbeatResponse, JoinRequest, JoinResponse, ENDPOINT_CLUSTER_HEARTBEAT,
    ENDPOINT_CLUSTER_JOIN,
};
use super::types::{now_ms, NodeId, NodeInfo, NodeState};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(2);
const FAILURE_DETECTION_INTERVAL: Duration = Duration::from_secs(2);
const DEAD_TIMEOUT_MS: u64 = 10_000;

pub struct ClusterService {
    pub local_node_id: NodeId,
    pub http_addr: SocketAddr,
    members: DashMap<NodeId, NodeInfo>,
    seed_nodes: Vec<SocketAddr>,
    system: Mutex<System>,
    http_client: reqwest::Client,
}

impl ClusterService {
    pub fn new(http_addr: SocketAddr, seed_nodes: Vec<SocketAddr>) -> Arc<Self> {
        let local_node_id = NodeId::new();
        let service = Self {
            local_node_id: local_node_id.clone(),
            http_addr,
            members: DashMap::new(),
            seed_nodes,
            system: Mutex::new(System::new()),
            http_client: reqwest::Client::new(),
        };

        service.members.insert(
            local_node_id.clone(),
            NodeInfo {
                id: local_node_id,
                http_addr,
                state: NodeState::Alive,
                mem_free_bytes: 0,
                mem_total_bytes: 0,
                last_heartbeat_ms: now_ms(),
            },
        );
        let service = Arc::new(service);
        service.refresh_local_resources();
        service
    }

    /// Joins via the seed nodes, then spawns the heartbeat and failure
    /// detection loops.
    pub async fn start(self: Arc<Self>) -> Result<()> {
        if self.seed_nodes.is_empty() {
            tracing::info!("Starting as seed node (founder)");
        } else {
            self.join_via_seeds().await;
        }

        let service = self.clone();
        tokio::spawn(async move {
            service.heartbeat_loop().await;
        });

        let service = self.clone();
        tokio::spawn(async move {
            service.failure_detection_loop().await;
        });

        tracing::info!("Cluster service started, node id {:?}", self.local_node_id);
        Ok(())
    }

    pub fn local_node(&self) -> NodeInfo {
        self.members
            .get(&self.local_node_id)
            .map(|entry| entry.value().clone())
            .expect("local node missing from member table")
    }

    pub fn get_member(&self, id: &NodeId) -> Option<NodeInfo> {
        self.members.get(id).map(|entry| entry.value().clone())
    }

    pub fn alive_members(&self) -> Vec<NodeInfo> {
        self.members
            .iter()
            .filter(|entry| entry.value().state == NodeState::Alive)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn members_snapshot(&self) -> Vec<NodeInfo> {
        self.members
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Merges a remote node's self-announcement into the member table.
    /// The local node's own entry is never overwritten by remote views.
    pub fn observe(&self, node: NodeInfo) {
        if node.id == self.local_node_id {
            return;
        }
        let mut node = node;
        node.last_heartbeat_ms = now_ms();
        node.state = NodeState::Alive;
        self.members.insert(node.id.clone(), node);
    }

    /// Merges a peer's full member list. Entries for nodes we already track
    /// keep the most recent heartbeat timestamp.
    pub fn merge_members(&self, members: Vec<NodeInfo>) {
        for member in members {
            if member.id == self.local_node_id {
                continue;
            }
            match self.members.get_mut(&member.id) {
                Some(mut existing) => {
                    if member.last_heartbeat_ms > existing.last_heartbeat_ms {
                        *existing = member;
                    }
                }
                None => {
                    tracing::info!("Discovered node {:?} at {}", member.id, member.http_addr);
                    self.members.insert(member.id.clone(), member);
                }
            }
        }
    }

    /// Samples local memory via sysinfo and updates our own member entry.
    pub fn refresh_local_resources(&self) {
        let (free, total) = {
            let mut system = self.system.lock().expect("sysinfo lock poisoned");
            system.refresh_memory();
            // sysinfo reports KB
            (
                system.available_memory() * 1024,
                system.total_memory() * 1024,
            )
        };
        self.set_local_resources(free, total);
    }

    /// Direct resource override, used by tests and by the sampler.
    pub fn set_local_resources(&self, mem_free_bytes: u64, mem_total_bytes: u64) {
        if let Some(mut local) = self.members.get_mut(&self.local_node_id) {
            local.mem_free_bytes = mem_free_bytes;
            local.mem_total_bytes = mem_total_bytes;
            local.last_heartbeat_ms = now_ms();
        }
    }

    async fn join_via_seeds(&self) {
        for seed in &self.seed_nodes {
            let url = format!("http://{}{}", seed, ENDPOINT_CLUSTER_JOIN);
            let request = JoinRequest {
                node: self.local_node(),
            };
            match self
                .http_client
                .post(&url)
                .json(&request)
                .timeout(Duration::from_secs(2))
                .send()
                .await
            {
                Ok(response) => match response.json::<JoinResponse>().await {
                    Ok(body) => {
                        tracing::info!("Joined cluster via seed {}", seed);
                        self.merge_members(body.members);
                    }
                    Err(e) => tracing::warn!("Bad join response from {}: {}", seed, e),
                },
                Err(e) => tracing::warn!("Failed to join via seed {}: {}", seed, e),
            }
        }
    }

    async fn heartbeat_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(HEARTBEAT_INTERVAL);
        loop {
            interval.tick().await;
            self.refresh_local_resources();

            let peers: Vec<NodeInfo> = self
                .members
                .iter()
                .filter(|entry| entry.value().id != self.local_node_id)
                .map(|entry| entry.value().clone())
                .collect();

            for peer in peers {
                let url = format!("http://{}{}", peer.http_addr, ENDPOINT_CLUSTER_HEARTBEAT);
                let request = HeartbeatRequest {
                    node: self.local_node(),
                };
                match self
                    .http_client
                    .post(&url)
                    .json(&request)
                    .timeout(Duration::from_secs(1))
                    .send()
                    .await
                {
                    Ok(response) => {
                        if let Ok(body) = response.json::<HeartbeatResponse>().await {
                            if let Some(mut member) = self.members.get_mut(&peer.id) {
                                member.last_heartbeat_ms = now_ms();
                                member.state = NodeState::Alive;
                            }
                            self.merge_members(body.members);
                        }
                    }
                    Err(e) => {
                        tracing::debug!("Heartbeat to {:?} failed: {}", peer.id, e);
                    }
                }
            }
        }
    }

    async fn failure_detection_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(FAILURE_DETECTION_INTERVAL);
        loop {
            interval.tick().await;
            let now = now_ms();
            for mut entry in self.members.iter_mut() {
                if entry.value().id == self.local_node_id {
                    continue;
                }
                let silent_for = now.saturating_sub(entry.value().last_heartbeat_ms);
                if entry.value().state == NodeState::Alive && silent_for > DEAD_TIMEOUT_MS {
                    tracing::warn!(
                        "Node {:?} silent for {}ms, marking dead",
                        entry.value().id,
                        silent_for
                    );
                    entry.value_mut().state = NodeState::Dead;
                }
            }
        }
    }
}
