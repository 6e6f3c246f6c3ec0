//! JSON-RPC server over Unix socket.
//!
//! Listens on a Unix domain socket, accepts connections, and dispatches
//! newline-delimited JSON-RPC 2.0 calls to the command handlers.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tracing::{debug, error, info, warn};

use numpool_alloc::AllocError;

use crate::commands;
use crate::DaemonState;

/// JSON-RPC request.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    /// JSON-RPC version (must be "2.0").
    pub jsonrpc: String,
    /// Request ID.
    pub id: serde_json::Value,
    /// Method name.
    pub method: String,
    /// Parameters.
    #[serde(default)]
    pub params: serde_json::Value,
}

/// JSON-RPC response.
#[derive(Debug, Serialize)]
pub struct RpcResponse {
    /// JSON-RPC version.
    pub jsonrpc: String,
    /// Request ID.
    pub id: serde_json::Value,
    /// Result or error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RpcError {
    /// Error code.
    pub code: i32,
    /// Error name.
    pub message: String,
    /// Optional structured data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcResponse {
    /// Create a success response.
    pub fn success(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: serde_json::Value, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

impl RpcError {
    // Standard JSON-RPC errors

    /// Parse error (-32700).
    pub fn parse_error() -> Self {
        Self {
            code: -32700,
            message: "PARSE_ERROR".to_string(),
            data: None,
        }
    }

    /// Invalid request (-32600).
    pub fn invalid_request() -> Self {
        Self {
            code: -32600,
            message: "INVALID_REQUEST".to_string(),
            data: None,
        }
    }

    /// Method not found (-32601).
    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: "METHOD_NOT_FOUND".to_string(),
            data: Some(serde_json::json!({"method": method})),
        }
    }

    /// Invalid params (-32602).
    pub fn invalid_params(detail: &str) -> Self {
        Self {
            code: -32602,
            message: "INVALID_PARAMS".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }

    /// Internal error (-32603).
    pub fn internal_error(detail: &str) -> Self {
        Self {
            code: -32603,
            message: "INTERNAL_ERROR".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }

    // Application errors

    /// Storage unavailable (-32050). The call may be retried.
    pub fn storage_unavailable(detail: &str) -> Self {
        Self {
            code: -32050,
            message: "STORAGE_UNAVAILABLE".to_string(),
            data: Some(serde_json::json!({"detail": detail, "retryable": true})),
        }
    }

    /// Invalid demand (-32051).
    pub fn invalid_demand(detail: &str) -> Self {
        Self {
            code: -32051,
            message: "INVALID_DEMAND".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }
}

impl From<AllocError> for RpcError {
    fn from(err: AllocError) -> Self {
        match &err {
            AllocError::StorageUnavailable { .. } => {
                RpcError::storage_unavailable(&err.to_string())
            }
            AllocError::InvalidDemand(detail) => RpcError::invalid_demand(detail),
        }
    }
}

/// The RPC server.
pub struct RpcServer {
    state: Arc<DaemonState>,
    socket_path: PathBuf,
}

impl RpcServer {
    /// Create a new RPC server.
    pub fn new(state: Arc<DaemonState>, socket_path: PathBuf) -> Self {
        Self { state, socket_path }
    }

    /// Run the server, accepting connections.
    pub async fn run(&self) -> anyhow::Result<()> {
        // Remove stale socket file
        let _ = std::fs::remove_file(&self.socket_path);

        let listener = UnixListener::bind(&self.socket_path)?;
        info!("IPC server listening on {:?}", self.socket_path);

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let state = self.state.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(state, stream).await {
                            warn!("Connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }
    }
}

/// Handle a single client connection.
async fn handle_connection(
    state: Arc<DaemonState>,
    stream: tokio::net::UnixStream,
) -> anyhow::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            break; // EOF
        }
        if line.trim().is_empty() {
            continue;
        }

        let response = handle_line(state.clone(), &line).await;

        let mut response_json = serde_json::to_string(&response)?;
        response_json.push('\n');
        writer.write_all(response_json.as_bytes()).await?;
        writer.flush().await?;
    }

    Ok(())
}

/// Parse one request line and dispatch it.
pub async fn handle_line(state: Arc<DaemonState>, line: &str) -> RpcResponse {
    match serde_json::from_str::<RpcRequest>(line) {
        Ok(request) if request.jsonrpc != "2.0" => {
            RpcResponse::error(request.id, RpcError::invalid_request())
        }
        Ok(request) => dispatch_request(state, request).await,
        Err(_) => RpcResponse::error(serde_json::Value::Null, RpcError::parse_error()),
    }
}

/// Dispatch a JSON-RPC request to the appropriate command handler.
async fn dispatch_request(state: Arc<DaemonState>, request: RpcRequest) -> RpcResponse {
    let id = request.id.clone();
    let method = request.method.as_str();

    debug!("Dispatching RPC method: {}", method);

    let result = match method {
        // Allocation
        "allocate" => commands::allocation::allocate(&state, &request.params).await,
        "process_order" => commands::allocation::process_order(&state, &request.params).await,

        // Raw Pool
        "ingest_records" => commands::pool::ingest_records(&state, &request.params).await,
        "pool_stats" => commands::pool::pool_stats(&state, &request.params).await,
        "prune_pool" => commands::pool::prune_pool(&state, &request.params).await,

        // Sales
        "recent_sales" => commands::sales::recent_sales(&state, &request.params).await,
        "get_transaction" => commands::sales::get_transaction(&state, &request.params).await,

        // Diagnostics
        "health" => commands::diagnostics::health(&state).await,
        "shutdown" => commands::diagnostics::shutdown(&state).await,

        _ => Err(RpcError::method_not_found(method)),
    };

    match result {
        Ok(value) => RpcResponse::success(id, value),
        Err(err) => RpcResponse::error(id, err),
    }
}
