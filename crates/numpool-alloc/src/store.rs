//! Collaborator interfaces consumed by the allocator.

use std::collections::HashSet;

use numpool_types::{PhoneRecord, Provider, SaleRecord};

/// Failure reaching the backing store.
#[derive(Clone, Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result of a single claim attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The sale was recorded; the number belongs to the caller.
    Claimed,
    /// Another sale for this number is inside the blacklist window.
    AlreadyClaimed,
}

/// Read access to the Raw Pool. Ingestion is the only writer.
pub trait RawPoolReader: Send + Sync {
    /// Feed every record of `provider` imported at or after `since` to `sink`.
    ///
    /// Finite and restartable. Implementations should deliver rows in import
    /// order.
    fn scan(
        &self,
        provider: Provider,
        since: u64,
        sink: &mut dyn FnMut(PhoneRecord),
    ) -> StoreResult<()>;
}

/// The sale ledger: the only shared mutable resource.
pub trait SaleLedger: Send + Sync {
    /// Record `sale` iff its number has no sale at or after `blacklist_since`.
    ///
    /// Must be atomic with respect to every other `try_claim` on the same
    /// number.
    fn try_claim(&self, sale: &SaleRecord, blacklist_since: u64) -> StoreResult<ClaimOutcome>;

    /// Whether `phone_number` has a sale at or after `since`.
    fn is_blacklisted(&self, phone_number: &str, since: u64) -> StoreResult<bool>;

    /// The subset of `phone_numbers` with a sale at or after `since`.
    fn exclusion_set(&self, phone_numbers: &[&str], since: u64) -> StoreResult<HashSet<String>> {
        let mut excluded = HashSet::new();
        for phone in phone_numbers {
            if self.is_blacklisted(phone, since)? {
                excluded.insert((*phone).to_string());
            }
        }
        Ok(excluded)
    }
}
