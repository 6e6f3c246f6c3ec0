//! IPC command handlers.
//!
//! Each submodule implements the commands for one IPC category.

pub mod allocation;
pub mod diagnostics;
pub mod pool;
pub mod sales;

use serde_json::Value;

use numpool_types::Provider;

use crate::rpc::RpcError;

type Result = std::result::Result<Value, RpcError>;

/// Run blocking database work off the async runtime.
async fn blocking<T, F>(f: F) -> std::result::Result<T, RpcError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| RpcError::internal_error(&format!("worker failed: {e}")))
}

/// Required provider name.
fn provider_param(params: &Value) -> std::result::Result<Provider, RpcError> {
    let name = params
        .get("provider")
        .and_then(|v| v.as_str())
        .ok_or_else(|| RpcError::invalid_params("provider required"))?;
    name.parse()
        .map_err(|e: numpool_types::TypesError| RpcError::invalid_params(&e.to_string()))
}

/// Optional u32 parameter; present-but-invalid is an error.
fn u32_param(params: &Value, key: &str) -> std::result::Result<Option<u32>, RpcError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| RpcError::invalid_params(&format!("{key} must be a u32"))),
    }
}

fn db_error(e: numpool_db::DbError) -> RpcError {
    match e {
        numpool_db::DbError::TimestampOutOfRange(_) => RpcError::invalid_params(&e.to_string()),
        _ => RpcError::storage_unavailable(&e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_param() {
        let params = serde_json::json!({"provider": "isat"});
        assert_eq!(provider_param(&params).expect("provider"), Provider::Isat);
        assert!(provider_param(&serde_json::json!({"provider": "nope"})).is_err());
        assert!(provider_param(&serde_json::json!({})).is_err());
    }

    #[test]
    fn test_u32_param() {
        let params = serde_json::json!({"a": 5, "b": -1, "c": null});
        assert_eq!(u32_param(&params, "a").expect("a"), Some(5));
        assert!(u32_param(&params, "b").is_err());
        assert_eq!(u32_param(&params, "c").expect("c"), None);
        assert_eq!(u32_param(&params, "missing").expect("missing"), None);
    }

    #[test]
    fn test_db_error_codes() {
        let range = db_error(numpool_db::DbError::TimestampOutOfRange(u64::MAX));
        assert_eq!(range.code, -32602);
        let pool = db_error(numpool_db::DbError::Pool("poisoned".into()));
        assert_eq!(pool.code, -32050);
    }
}
