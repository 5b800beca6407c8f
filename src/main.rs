use std::net::SocketAddr;

use ml_cluster::server::Node;
use ml_cluster::stats::{ML_EXECUTING_TASK_COUNT, ML_TOTAL_REQUEST_COUNT};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 {
        eprintln!("Usage: {} --bind <addr:port> [--seed <addr:port>]", args[0]);
        eprintln!("Example: {} --bind 127.0.0.1:6000", args[0]);
        eprintln!(
            "Example: {} --bind 127.0.0.1:6001 --seed 127.0.0.1:6000",
            args[0]
        );

        std::process::exit(1);
    }

    let mut bind_addr: Option<SocketAddr> = None;
    let mut seed_nodes: Vec<SocketAddr> = vec![];

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" => {
                bind_addr = Some(args[i + 1].parse()?);
                i += 2;
            }
            "--seed" => {
                seed_nodes.push(args[i + 1].parse()?);
                i += 2;
            }
            _ => {
                i += 1;
            }
        }
    }

    let bind_addr = match bind_addr {
        Some(addr) => addr,
        None => anyhow::bail!("--bind is required"),
    };

    tracing::info!("Starting ML node on {}", bind_addr);
    if !seed_nodes.is_empty() {
        tracing::info!("Seed nodes: {:?}", seed_nodes);
    }

    let node = Node::new(bind_addr, seed_nodes);
    tracing::info!("Node ID: {:?}", node.cluster.local_node_id);

    let app = node.router();
    node.start().await?;

    // Periodic operational report: cluster view plus the hot counters.
    let cluster = node.cluster.clone();
    let stats = node.stats.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(5));

        loop {
            interval.tick().await;
            let alive = cluster.alive_members();
            let snapshot = stats.snapshot();
            tracing::info!(
                "Cluster: {} alive nodes, {} requests, {} tasks executed",
                alive.len(),
                snapshot.get(ML_TOTAL_REQUEST_COUNT).copied().unwrap_or(0),
                snapshot.get(ML_EXECUTING_TASK_COUNT).copied().unwrap_or(0)
            );
            for member in alive {
                tracing::info!(
                    "  - {:?} http={} free={}MB",
                    member.id,
                    member.http_addr,
                    member.mem_free_bytes / (1024 * 1024)
                );
            }
        }
    });

    tracing::info!("HTTP server listening on {}", bind_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
