//! Allocation command handlers.

use std::sync::Arc;

use serde_json::Value;

use numpool_alloc::{Allocation, Demand, OrderLine, Windows};

use super::{blocking, provider_param, u32_param, Result};
use crate::rpc::RpcError;
use crate::DaemonState;

/// Customer reference used when a request does not name one.
const ANONYMOUS_CUSTOMER: &str = "anonymous";

fn allocation_json(allocation: &Allocation) -> Value {
    serde_json::json!({
        "transaction_id": allocation.transaction_id,
        "provider": allocation.provider,
        "requested": allocation.requested,
        "sold_at": allocation.sold_at,
        "numbers": allocation.numbers,
        "outcome": allocation.outcome,
        "shortfall": allocation.shortfall(),
    })
}

/// Sell up to `quantity` numbers of one provider.
pub async fn allocate(state: &Arc<DaemonState>, params: &Value) -> Result {
    let provider = provider_param(params)?;
    let quantity = u32_param(params, "quantity")?
        .ok_or_else(|| RpcError::invalid_params("quantity required"))?;
    let customer_ref = params
        .get("customer_ref")
        .and_then(|v| v.as_str())
        .unwrap_or(ANONYMOUS_CUSTOMER);

    let defaults = state.allocator.windows();
    let windows = Windows {
        pool_days: u32_param(params, "pool_window_days")?.unwrap_or(defaults.pool_days),
        blacklist_days: u32_param(params, "blacklist_window_days")?
            .unwrap_or(defaults.blacklist_days),
    };
    let demand = Demand::with_windows(provider, quantity, customer_ref, windows);

    let allocator = state.allocator.clone();
    let allocation = blocking(move || allocator.allocate(&demand)).await??;

    Ok(allocation_json(&allocation))
}

/// Allocate a multi-provider order for one customer.
pub async fn process_order(state: &Arc<DaemonState>, params: &Value) -> Result {
    let customer_ref = params
        .get("customer_ref")
        .and_then(|v| v.as_str())
        .ok_or_else(|| RpcError::invalid_params("customer_ref required"))?
        .to_string();
    let lines: Vec<OrderLine> = params
        .get("lines")
        .cloned()
        .ok_or_else(|| RpcError::invalid_params("lines required"))
        .and_then(|v| {
            serde_json::from_value(v).map_err(|e| RpcError::invalid_params(&e.to_string()))
        })?;

    let allocator = state.allocator.clone();
    let receipt = blocking(move || allocator.process_order(&customer_ref, &lines)).await??;

    let lines: Vec<Value> = receipt.lines.iter().map(allocation_json).collect();
    let mut result = serde_json::json!({
        "customer_ref": receipt.customer_ref,
        "total_sold": receipt.total_sold(),
        "lines": lines,
    });
    if let Some(failed) = &receipt.failed {
        result["failed"] = serde_json::json!({
            "provider": failed.line.provider,
            "quantity": failed.line.quantity,
            "error": failed.error,
        });
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::pool::ingest_records;

    async fn seeded() -> Arc<DaemonState> {
        let state = crate::test_state();
        ingest_records(
            &state,
            &serde_json::json!({
                "source_file": "batch-01.csv",
                "records": [
                    {"phone": "081200000001"},
                    {"phone": "081200000002"},
                    {"phone": "081200000003"},
                    {"phone": "085700000001"},
                ],
            }),
        )
        .await
        .expect("ingest");
        state
    }

    #[tokio::test]
    async fn test_allocate_then_shortage() {
        let state = seeded().await;
        let first = allocate(&state, &serde_json::json!({"provider": "tsel", "quantity": 2}))
            .await
            .expect("first");
        assert_eq!(first["numbers"].as_array().map(Vec::len), Some(2));
        assert_eq!(first["outcome"], "fulfilled");

        let second = allocate(&state, &serde_json::json!({"provider": "tsel", "quantity": 2}))
            .await
            .expect("second");
        assert_eq!(second["numbers"].as_array().map(Vec::len), Some(1));
        assert_eq!(second["outcome"], "insufficient_inventory");
        assert_eq!(second["shortfall"], 1);
    }

    #[tokio::test]
    async fn test_allocate_rejects_zero_quantity() {
        let state = seeded().await;
        let err = allocate(&state, &serde_json::json!({"provider": "tsel", "quantity": 0}))
            .await
            .expect_err("zero quantity");
        assert_eq!(err.code, -32051);
    }

    #[tokio::test]
    async fn test_allocate_requires_provider() {
        let state = seeded().await;
        let err = allocate(&state, &serde_json::json!({"quantity": 1}))
            .await
            .expect_err("no provider");
        assert_eq!(err.code, -32602);
    }

    #[tokio::test]
    async fn test_process_order() {
        let state = seeded().await;
        let result = process_order(
            &state,
            &serde_json::json!({
                "customer_ref": "Anto",
                "lines": [
                    {"provider": "tsel", "qty": 5},
                    {"provider": "isat", "qty": 1},
                ],
            }),
        )
        .await
        .expect("order");
        assert_eq!(result["total_sold"], 4);
        assert_eq!(result["lines"][0]["outcome"], "insufficient_inventory");
        assert_eq!(result["lines"][1]["outcome"], "fulfilled");
        assert!(result.get("failed").is_none());
    }
}
