//! In-process store.
//!
//! Holds the Raw Pool and sale ledger behind one mutex, so every
//! [`SaleLedger::try_claim`] is trivially atomic. Failure switches let tests
//! exercise the allocator's storage-error paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use numpool_types::{PhoneRecord, Provider, SaleRecord};

use crate::store::{ClaimOutcome, RawPoolReader, SaleLedger, StoreError, StoreResult};

#[derive(Default)]
struct Inner {
    pool: Vec<PhoneRecord>,
    sales: Vec<SaleRecord>,
    /// Latest `sold_at` per number.
    last_sold: HashMap<String, u64>,
}

/// Raw Pool and sale ledger kept in memory.
pub struct MemoryStore {
    inner: Mutex<Inner>,
    fail_scans: AtomicBool,
    fail_reads: AtomicBool,
    /// Claims left before claims start failing; negative means never.
    claims_until_failure: AtomicI64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            fail_scans: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            claims_until_failure: AtomicI64::new(-1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append records to the Raw Pool.
    pub fn ingest(&self, records: impl IntoIterator<Item = PhoneRecord>) {
        self.lock().pool.extend(records);
    }

    /// Append a sale without the blacklist check (history import).
    pub fn record_sale(&self, sale: SaleRecord) {
        let mut inner = self.lock();
        let last = inner.last_sold.entry(sale.phone_number.clone()).or_insert(0);
        *last = (*last).max(sale.sold_at);
        inner.sales.push(sale);
    }

    /// Every sale recorded so far, in write order.
    pub fn sales(&self) -> Vec<SaleRecord> {
        self.lock().sales.clone()
    }

    /// Make subsequent scans fail.
    pub fn fail_scans(&self, fail: bool) {
        self.fail_scans.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent blacklist reads fail.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Let `n` more claims through, then fail every claim after them.
    pub fn fail_claims_after(&self, n: usize) {
        self.claims_until_failure
            .store(i64::try_from(n).unwrap_or(i64::MAX), Ordering::SeqCst);
    }

    fn claim_allowed(&self) -> bool {
        let previous = self
            .claims_until_failure
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| {
                (left > 0).then_some(left - 1)
            });
        match previous {
            Ok(_) => true,
            Err(left) => left < 0,
        }
    }
}

impl RawPoolReader for MemoryStore {
    fn scan(
        &self,
        provider: Provider,
        since: u64,
        sink: &mut dyn FnMut(PhoneRecord),
    ) -> StoreResult<()> {
        if self.fail_scans.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("raw pool scan failed".into()));
        }
        let mut rows: Vec<PhoneRecord> = self
            .lock()
            .pool
            .iter()
            .filter(|r| r.provider == provider && r.imported_at >= since)
            .cloned()
            .collect();
        // Stable sort keeps ingestion order among equal timestamps.
        rows.sort_by_key(|r| r.imported_at);
        rows.into_iter().for_each(sink);
        Ok(())
    }
}

impl SaleLedger for MemoryStore {
    fn try_claim(&self, sale: &SaleRecord, blacklist_since: u64) -> StoreResult<ClaimOutcome> {
        if !self.claim_allowed() {
            return Err(StoreError::Unavailable("sale ledger write failed".into()));
        }
        let mut inner = self.lock();
        if let Some(&sold_at) = inner.last_sold.get(&sale.phone_number) {
            if sold_at >= blacklist_since {
                return Ok(ClaimOutcome::AlreadyClaimed);
            }
        }
        inner
            .last_sold
            .insert(sale.phone_number.clone(), sale.sold_at);
        inner.sales.push(sale.clone());
        Ok(ClaimOutcome::Claimed)
    }

    fn is_blacklisted(&self, phone_number: &str, since: u64) -> StoreResult<bool> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("sale ledger read failed".into()));
        }
        Ok(self
            .lock()
            .last_sold
            .get(phone_number)
            .is_some_and(|&sold_at| sold_at >= since))
    }
}
