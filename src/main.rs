//! CabinetKV -- replicated key-value store server.
//!
//! Startup order: configuration, logging, metrics, storage, consensus
//! engine, HTTP listener.  The engine keeps no on-disk log, so a
//! restart rebuilds liveness and weight state from the next heartbeat
//! cycle or committed proposal; only the key-value table persists.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use cabinetkv::consensus::engine::ConsensusMode;
use cabinetkv::consensus::registry::PeerRegistry;
use cabinetkv::consensus::ConsensusEngine;
use cabinetkv::replication::HttpReplicator;
use cabinetkv::store::KvStore;

/// Per-request timeout for client-facing forwards to the leader.
const FORWARD_TIMEOUT: Duration = Duration::from_secs(3);

/// Command-line arguments for the CabinetKV server.
#[derive(Parser, Debug)]
#[command(
    name = "cabinetkv",
    version,
    about = "Replicated key-value store with weighted-quorum consensus"
)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "cabinetkv.example.yaml")]
    config: String,

    /// Override the bind address (host:port); defaults to this peer's
    /// cluster endpoint.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cabinetkv::config::load_config(&cli.config)?;

    // Initialize tracing / logging; RUST_LOG wins over the config level.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.logging.level.clone()));
    if config.logging.format == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("Loaded configuration from {}", cli.config);

    // Cluster membership and own identity.
    let cluster = cabinetkv::config::load_cluster(&config.consensus.cluster_file)?;
    if cluster.is_empty() {
        anyhow::bail!(
            "cluster file {} lists no peers",
            config.consensus.cluster_file
        );
    }
    let server_id = cabinetkv::config::resolve_server_id(cluster.len())?;
    let endpoints: Vec<String> = cluster.iter().map(|row| row.endpoint()).collect();
    let my_endpoint = endpoints[server_id].clone();
    let bind_addr = cli.bind.unwrap_or_else(|| my_endpoint.clone());

    // Initialize Prometheus metrics recorder and register descriptions.
    cabinetkv::metrics::init_metrics();
    cabinetkv::metrics::describe_metrics();
    info!("Prometheus metrics initialized");

    // Initialize the key-value table (SQLite).
    let db_path = &config.storage.sqlite.path;
    if let Some(parent) = std::path::Path::new(db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store = Arc::new(KvStore::new(db_path)?);
    info!("SQLite key-value store initialized at {}", db_path);

    // Initialize the consensus engine and its background loops.
    let mode = ConsensusMode::parse(&config.consensus.mode)?;
    let rpc_timeout = Duration::from_millis(config.consensus.rpc_timeout_ms);
    let heartbeat_interval = Duration::from_millis(config.consensus.heartbeat_interval_ms);
    let replicator = Arc::new(HttpReplicator::new(rpc_timeout)?);
    let engine = Arc::new(ConsensusEngine::new(
        &my_endpoint,
        PeerRegistry::new(endpoints),
        mode,
        replicator,
        heartbeat_interval,
        rpc_timeout,
    )?);
    Arc::clone(&engine).start();
    info!(
        "Consensus engine started: mode={} server_id={} endpoint={}",
        mode, server_id, my_endpoint
    );

    // Build AppState and the router.
    let forwarder = reqwest::Client::builder().timeout(FORWARD_TIMEOUT).build()?;
    let state = Arc::new(cabinetkv::AppState {
        config,
        store,
        engine,
        forwarder,
    });
    let app = cabinetkv::server::app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("CabinetKV listening on {}", bind_addr);

    // Graceful shutdown: on SIGTERM/SIGINT stop accepting connections
    // and let in-flight requests finish.  Background loops die with the
    // process; the engine keeps no state worth flushing.
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("CabinetKV shut down");

    Ok(())
}

/// Wait for SIGTERM or SIGINT (Ctrl+C), then return to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, shutting down");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        },
    }
}
