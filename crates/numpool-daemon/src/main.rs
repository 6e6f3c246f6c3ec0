//! numpool-daemon: phone-number inventory service.
//!
//! Single OS process running a Tokio async runtime. Clients talk to the
//! daemon via JSON-RPC over a Unix socket. Allocation and database work runs
//! on the blocking pool; the SQLite sale ledger is the only synchronization
//! point between concurrent requests.

mod commands;
mod config;
mod rpc;

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{error, info};

use numpool_alloc::{Allocator, SqliteStore};

use crate::config::DaemonConfig;
use crate::rpc::RpcServer;

/// Daemon-wide shared state.
pub struct DaemonState {
    /// Raw Pool and sale ledger.
    pub store: Arc<SqliteStore>,
    /// Allocator over `store`.
    pub allocator: Arc<Allocator>,
    /// Configuration.
    pub config: DaemonConfig,
    /// Shutdown signal sender.
    pub shutdown_tx: broadcast::Sender<()>,
}

impl DaemonState {
    /// Wire the allocator to `store` with the configured windows.
    pub fn new(store: SqliteStore, config: DaemonConfig) -> Self {
        let store = Arc::new(store);
        let allocator = Allocator::new(store.clone(), store.clone())
            .with_windows(config.allocation.windows());
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            store,
            allocator: Arc::new(allocator),
            config,
            shutdown_tx,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load config
    let config = DaemonConfig::load()?;

    // 2. Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("numpool={}", config.logging.log_level).parse()?),
        )
        .init();

    info!("numpool daemon starting");

    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir)?;

    // 3. Open database
    let db_path = config.database_path();
    let store = SqliteStore::open(&db_path, config.database.connections)?;
    info!(
        path = %db_path.display(),
        connections = config.database.connections,
        "database ready"
    );

    // 4. Build daemon state
    let socket_path = config.socket_path();
    let state = Arc::new(DaemonState::new(store, config));

    // 5. Start IPC server
    let rpc_server = RpcServer::new(state.clone(), socket_path.clone());
    info!("Starting JSON-RPC server on {:?}", socket_path);

    // 6. Run the RPC server until shutdown
    let mut shutdown_rx = state.shutdown_tx.subscribe();
    tokio::select! {
        result = rpc_server.run() => {
            if let Err(e) = result {
                error!("RPC server error: {}", e);
            }
        }
        _ = shutdown_rx.recv() => {
            info!("Shutdown requested");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
        }
    }

    // Clean up socket file
    let _ = std::fs::remove_file(&socket_path);

    info!("Daemon stopped");
    Ok(())
}

/// State over a fresh in-memory database.
#[cfg(test)]
pub(crate) fn test_state() -> Arc<DaemonState> {
    let store = SqliteStore::memory().expect("in-memory store");
    Arc::new(DaemonState::new(store, DaemonConfig::default()))
}
