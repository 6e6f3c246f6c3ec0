//! Sales-history command handlers.

use std::sync::Arc;

use serde_json::Value;

use numpool_db::queries::sales;

use super::{blocking, db_error, u32_param, Result};
use crate::rpc::RpcError;
use crate::DaemonState;

/// Default page size for `recent_sales`.
const DEFAULT_LIMIT: u32 = 100;

/// Most recent sales, newest first.
pub async fn recent_sales(state: &Arc<DaemonState>, params: &Value) -> Result {
    let limit = u32_param(params, "limit")?.unwrap_or(DEFAULT_LIMIT);

    let store = state.store.clone();
    let rows = blocking(move || -> numpool_db::Result<_> {
        let conn = store.pool().get()?;
        sales::recent(&conn, limit)
    })
    .await?
    .map_err(db_error)?;

    Ok(serde_json::json!(rows))
}

/// Every sale written by one allocation.
pub async fn get_transaction(state: &Arc<DaemonState>, params: &Value) -> Result {
    let transaction_id = params
        .get("transaction_id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| RpcError::invalid_params("transaction_id required"))?
        .to_string();

    let store = state.store.clone();
    let rows = blocking(move || -> numpool_db::Result<_> {
        let conn = store.pool().get()?;
        sales::for_transaction(&conn, &transaction_id)
    })
    .await?
    .map_err(db_error)?;

    Ok(serde_json::json!(rows))
}
