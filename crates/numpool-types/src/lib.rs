//! # numpool-types
//!
//! Shared domain types used across the numpool workspace: providers, Raw Pool
//! records, sale records and the time constants the allocation windows are
//! expressed in.

pub mod provider;
pub mod record;

pub use provider::Provider;
pub use record::{PhoneRecord, SaleRecord};

/// Seconds in one day. Allocation windows are configured in whole days.
pub const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Default Raw Pool freshness window in days.
pub const DEFAULT_POOL_WINDOW_DAYS: u32 = 3;

/// Default blacklist window in days. A sold number is not resold inside it.
pub const DEFAULT_BLACKLIST_WINDOW_DAYS: u32 = 30;

/// Errors produced while parsing domain values.
#[derive(Debug, thiserror::Error)]
pub enum TypesError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
}

/// Current Unix time in seconds.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Start of a trailing window of `days` ending at `now`.
///
/// Saturates at zero so very long windows never underflow.
pub fn window_start(now: u64, days: u32) -> u64 {
    now.saturating_sub(u64::from(days) * SECS_PER_DAY)
}
