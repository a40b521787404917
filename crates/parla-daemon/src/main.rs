//! parla-daemon: the ledger and payout service.
//!
//! Single OS process running a Tokio async runtime. Clients talk to it with
//! newline-delimited JSON-RPC over a Unix socket. One SQLite connection,
//! guarded by an async mutex, serializes every handler.

mod commands;
mod config;
mod events;
mod rpc;
mod schedule;

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info};

use parla_types::events::EventType;
use parla_workflow::WorkflowConfig;

use crate::config::DaemonConfig;
use crate::events::EventBus;
use crate::rpc::RpcServer;

/// Events kept for `get_recent_events`.
const EVENT_BACKLOG: usize = 1000;

/// Daemon-wide shared state.
pub struct DaemonState {
    /// Database connection.
    pub db: Arc<Mutex<rusqlite::Connection>>,
    /// Configuration.
    pub config: DaemonConfig,
    /// Derived from `config` once at startup.
    pub workflow: WorkflowConfig,
    /// Event bus for pushing events to subscribers.
    pub event_bus: EventBus,
}

impl DaemonState {
    pub fn new(conn: rusqlite::Connection, config: DaemonConfig) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
            workflow: config.workflow(),
            config,
            event_bus: EventBus::new(EVENT_BACKLOG),
        }
    }
}

/// Seconds since the UNIX epoch.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load config
    let config = DaemonConfig::load()?;

    // 2. Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("parla={}", config.advanced.log_level).parse()?),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "Parla daemon starting");

    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir)?;

    // 3. Open database
    let conn = parla_db::open(&config.db_path())?;
    let socket_path = config.socket_path();

    // 4. Build daemon state
    let state = Arc::new(DaemonState::new(conn, config));

    // 5. Start IPC server
    let rpc_server = RpcServer::new(state.clone(), socket_path.clone());
    info!(socket = ?socket_path, "starting JSON-RPC server");

    // 6. Run until the server fails or Ctrl-C
    tokio::select! {
        result = rpc_server.run() => {
            if let Err(e) = result {
                error!(error = %e, "RPC server error");
            }
        }
        _ = schedule::run(state.clone()) => {
            error!("scheduler exited");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
        }
    }

    info!(events = state.event_bus.sequence(), "daemon shutting down");
    let _ = std::fs::remove_file(&socket_path);
    info!("daemon stopped");
    Ok(())
}

/// Emit `event_type` with a serialized payload.
pub(crate) fn emit<T: serde::Serialize>(state: &DaemonState, event_type: EventType, payload: &T) {
    match serde_json::to_value(payload) {
        Ok(value) => {
            state.event_bus.emit(event_type, value);
        }
        Err(e) => error!(event = %event_type, error = %e, "event payload not serializable"),
    }
}
