//! Diagnostics command handlers.

use std::sync::Arc;

use serde_json::Value;

use super::Result;
use crate::DaemonState;

/// Liveness and effective configuration.
pub async fn health(state: &Arc<DaemonState>) -> Result {
    let windows = state.allocator.windows();
    Ok(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "database": state.config.database_path(),
        "connections": state.store.pool().size(),
        "pool_window_days": windows.pool_days,
        "blacklist_window_days": windows.blacklist_days,
    }))
}

/// Ask the daemon to stop after answering.
pub async fn shutdown(state: &Arc<DaemonState>) -> Result {
    // No receiver only means the main loop already exited.
    let _ = state.shutdown_tx.send(());
    Ok(Value::Bool(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health() {
        let state = crate::test_state();
        let result = health(&state).await.expect("health");
        assert_eq!(result["status"], "ok");
        assert_eq!(result["connections"], 1);
        assert_eq!(result["blacklist_window_days"], 30);
    }

    #[tokio::test]
    async fn test_shutdown_signals() {
        let state = crate::test_state();
        let mut rx = state.shutdown_tx.subscribe();
        shutdown(&state).await.expect("shutdown");
        assert!(rx.recv().await.is_ok());
    }
}
