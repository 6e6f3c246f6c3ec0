//! Raw Pool and sales-history records.

use serde::{Deserialize, Serialize};

use crate::Provider;

/// One ingested phone number. Immutable once it reaches the Raw Pool.
///
/// The same number may be ingested many times from repeated scraping; the
/// allocator treats those rows as a single candidate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneRecord {
    pub phone_number: String,
    pub provider: Provider,
    /// Unix seconds.
    pub imported_at: u64,
    pub source_file: String,
    /// Opaque scraper payload (source URL etc.).
    #[serde(default)]
    pub raw_payload: Vec<u8>,
}

impl PhoneRecord {
    /// Build a record, detecting the provider from the number's prefix.
    pub fn detected(phone_number: &str, imported_at: u64, source_file: &str) -> Self {
        let phone_number = phone_number.trim().to_string();
        Self {
            provider: Provider::detect(&phone_number),
            phone_number,
            imported_at,
            source_file: source_file.to_string(),
            raw_payload: Vec::new(),
        }
    }
}

/// A single sold number. Append-only; written exactly once per allocated number.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRecord {
    pub phone_number: String,
    pub customer_ref: String,
    /// Unix seconds.
    pub sold_at: u64,
    /// Shared by every number handed out in one allocation.
    pub transaction_id: String,
}
