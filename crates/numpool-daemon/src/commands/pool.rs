//! Raw Pool command handlers: ingestion, stats and pruning.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use numpool_db::queries::{raw_pool, sales};
use numpool_types::{unix_now, window_start, PhoneRecord, Provider};

use super::{blocking, db_error, provider_param, u32_param, Result};
use crate::rpc::RpcError;
use crate::DaemonState;

/// How far ahead of the daemon clock an `imported_at` may be.
const MAX_CLOCK_SKEW_SECS: u64 = 300;

/// One record of an `ingest_records` call.
#[derive(Debug, Deserialize)]
struct IngestRecord {
    phone: String,
    /// Defaults to the time of the call.
    #[serde(default)]
    imported_at: Option<u64>,
    /// Opaque scraper payload, e.g. the source URL.
    #[serde(default)]
    payload: Option<String>,
}

/// Append a batch of scraped numbers to the Raw Pool.
pub async fn ingest_records(state: &Arc<DaemonState>, params: &Value) -> Result {
    let source_file = params
        .get("source_file")
        .and_then(|v| v.as_str())
        .ok_or_else(|| RpcError::invalid_params("source_file required"))?
        .to_string();
    let incoming: Vec<IngestRecord> = params
        .get("records")
        .cloned()
        .ok_or_else(|| RpcError::invalid_params("records required"))
        .and_then(|v| {
            serde_json::from_value(v).map_err(|e| RpcError::invalid_params(&e.to_string()))
        })?;

    let now = unix_now();
    let mut by_provider: BTreeMap<Provider, usize> = BTreeMap::new();
    let mut records = Vec::with_capacity(incoming.len());
    for rec in incoming {
        if rec.phone.trim().is_empty() {
            return Err(RpcError::invalid_params("phone must not be empty"));
        }
        let imported_at = rec.imported_at.unwrap_or(now);
        if imported_at > now.saturating_add(MAX_CLOCK_SKEW_SECS) {
            return Err(RpcError::invalid_params(&format!(
                "imported_at {imported_at} is in the future"
            )));
        }
        let mut record = PhoneRecord::detected(&rec.phone, imported_at, &source_file);
        record.raw_payload = rec.payload.map(String::into_bytes).unwrap_or_default();
        *by_provider.entry(record.provider).or_default() += 1;
        records.push(record);
    }

    let store = state.store.clone();
    let ingested = blocking(move || -> numpool_db::Result<usize> {
        let mut conn = store.pool().get()?;
        raw_pool::insert_batch(&mut conn, &records)
    })
    .await?
    .map_err(db_error)?;

    tracing::info!(ingested, source = %source_file, "raw pool ingest");

    Ok(serde_json::json!({
        "ingested": ingested,
        "by_provider": by_provider,
    }))
}

/// Pooled and available counts per provider.
pub async fn pool_stats(state: &Arc<DaemonState>, params: &Value) -> Result {
    let providers: Vec<Provider> = match params.get("provider") {
        None | Some(Value::Null) => Provider::ALL.to_vec(),
        Some(_) => vec![provider_param(params)?],
    };
    let defaults = state.allocator.windows();
    let pool_days = u32_param(params, "pool_window_days")?.unwrap_or(defaults.pool_days);
    let blacklist_days =
        u32_param(params, "blacklist_window_days")?.unwrap_or(defaults.blacklist_days);

    let now = unix_now();
    let pool_since = window_start(now, pool_days);
    let blacklist_since = window_start(now, blacklist_days);

    let store = state.store.clone();
    let (stats, sold_in_window) = blocking(move || -> numpool_db::Result<_> {
        let conn = store.pool().get()?;
        let mut stats: BTreeMap<Provider, Value> = BTreeMap::new();
        for provider in providers {
            let pooled = raw_pool::count_since(&conn, provider, pool_since)?;
            let available =
                raw_pool::available_count(&conn, provider, pool_since, blacklist_since)?;
            stats.insert(
                provider,
                serde_json::json!({"pooled": pooled, "available": available}),
            );
        }
        let sold = sales::count_since(&conn, blacklist_since)?;
        Ok((stats, sold))
    })
    .await?
    .map_err(db_error)?;

    Ok(serde_json::json!({
        "pool_window_days": pool_days,
        "blacklist_window_days": blacklist_days,
        "sold_in_window": sold_in_window,
        "providers": stats,
    }))
}

/// Delete Raw Pool rows older than `older_than_days`.
pub async fn prune_pool(state: &Arc<DaemonState>, params: &Value) -> Result {
    let days = u32_param(params, "older_than_days")?
        .filter(|d| *d > 0)
        .ok_or_else(|| RpcError::invalid_params("older_than_days must be positive"))?;
    let cutoff = window_start(unix_now(), days);

    let store = state.store.clone();
    let removed = blocking(move || -> numpool_db::Result<usize> {
        let conn = store.pool().get()?;
        raw_pool::prune_before(&conn, cutoff)
    })
    .await?
    .map_err(db_error)?;

    Ok(serde_json::json!({"removed": removed, "cutoff": cutoff}))
}
