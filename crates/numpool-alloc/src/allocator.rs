//! The allocation procedure.
//!
//! 1. Scan the Raw Pool for fresh rows of one provider and collapse repeated
//!    scrapes of a number into one candidate (earliest import wins).
//! 2. Read the blacklist window for those candidates.
//! 3. Order the rest by `(imported_at, phone_number)`.
//! 4. Claim candidates one at a time until the quantity is met.
//!
//! Steps 1-3 may work from a stale view. Step 4 is the authority: a candidate
//! sold by a concurrent allocation in the meantime fails its claim and is
//! skipped.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use numpool_types::{
    window_start, Provider, SaleRecord, DEFAULT_BLACKLIST_WINDOW_DAYS, DEFAULT_POOL_WINDOW_DAYS,
};

use crate::store::{ClaimOutcome, RawPoolReader, SaleLedger, StoreError};
use crate::{new_transaction_id, AllocError, Clock, Phase, Result, SystemClock};

/// Freshness and blacklist windows, in days.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Windows {
    /// Only numbers imported within this many days are candidates.
    pub pool_days: u32,
    /// Numbers sold within this many days are not resold.
    pub blacklist_days: u32,
}

impl Default for Windows {
    fn default() -> Self {
        Self {
            pool_days: DEFAULT_POOL_WINDOW_DAYS,
            blacklist_days: DEFAULT_BLACKLIST_WINDOW_DAYS,
        }
    }
}

/// A request for `quantity` numbers of one provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Demand {
    pub provider: Provider,
    pub quantity: u32,
    pub pool_window_days: u32,
    pub blacklist_window_days: u32,
    /// Written into every resulting sale.
    pub customer_ref: String,
}

impl Demand {
    /// Demand with the default windows.
    pub fn new(provider: Provider, quantity: u32, customer_ref: impl Into<String>) -> Self {
        Self::with_windows(provider, quantity, customer_ref, Windows::default())
    }

    pub fn with_windows(
        provider: Provider,
        quantity: u32,
        customer_ref: impl Into<String>,
        windows: Windows,
    ) -> Self {
        Self {
            provider,
            quantity,
            pool_window_days: windows.pool_days,
            blacklist_window_days: windows.blacklist_days,
            customer_ref: customer_ref.into(),
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.quantity == 0 {
            return Err(AllocError::InvalidDemand("quantity must be positive".into()));
        }
        if self.pool_window_days == 0 {
            return Err(AllocError::InvalidDemand(
                "pool window must be at least one day".into(),
            ));
        }
        if self.blacklist_window_days == 0 {
            return Err(AllocError::InvalidDemand(
                "blacklist window must be at least one day".into(),
            ));
        }
        Ok(())
    }
}

/// How an allocation ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationOutcome {
    /// Exactly the requested quantity was sold.
    Fulfilled,
    /// The pool ran out; every available number was sold.
    InsufficientInventory,
    /// The ledger failed mid-batch; only the committed prefix was sold.
    StorageInterrupted,
}

/// Numbers sold by one `allocate` call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub transaction_id: String,
    pub provider: Provider,
    pub requested: u32,
    /// `sold_at` of every sale in this allocation.
    pub sold_at: u64,
    /// Distinct numbers, in claim order. Each has a durable sale record.
    pub numbers: Vec<String>,
    pub outcome: AllocationOutcome,
}

impl Allocation {
    /// How many numbers short of the request this allocation fell.
    pub fn shortfall(&self) -> u32 {
        let sold = u32::try_from(self.numbers.len()).unwrap_or(u32::MAX);
        self.requested.saturating_sub(sold)
    }

    pub fn is_fulfilled(&self) -> bool {
        self.outcome == AllocationOutcome::Fulfilled
    }
}

/// Sells unsold numbers exactly once each.
///
/// Cheap to share: clone the `Arc`s or wrap the allocator itself in an `Arc`.
/// Calls may run concurrently from any number of threads.
pub struct Allocator {
    pool: Arc<dyn RawPoolReader>,
    ledger: Arc<dyn SaleLedger>,
    clock: Arc<dyn Clock>,
    windows: Windows,
}

impl Allocator {
    /// Allocator over the given collaborators, using the wall clock.
    pub fn new(pool: Arc<dyn RawPoolReader>, ledger: Arc<dyn SaleLedger>) -> Self {
        Self {
            pool,
            ledger,
            clock: Arc::new(SystemClock),
            windows: Windows::default(),
        }
    }

    /// Replace the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the windows used by [`Allocator::demand`] and orders.
    pub fn with_windows(mut self, windows: Windows) -> Self {
        self.windows = windows;
        self
    }

    pub fn windows(&self) -> Windows {
        self.windows
    }

    /// Build a demand using this allocator's windows.
    pub fn demand(&self, provider: Provider, quantity: u32, customer_ref: &str) -> Demand {
        Demand::with_windows(provider, quantity, customer_ref, self.windows)
    }

    /// Sell up to `demand.quantity` numbers that are fresh in the pool and
    /// outside the blacklist window.
    ///
    /// Returns fewer numbers when the pool runs short. Fails only when
    /// storage is unreachable before anything was committed; a ledger
    /// failure after the first successful claim ends the batch and returns
    /// what was committed.
    pub fn allocate(&self, demand: &Demand) -> Result<Allocation> {
        demand.validate()?;

        let now = self.clock.now();
        let pool_since = window_start(now, demand.pool_window_days);
        let blacklist_since = window_start(now, demand.blacklist_window_days);

        let candidates = self.candidates(demand.provider, pool_since)?;
        let phones: Vec<&str> = candidates.iter().map(String::as_str).collect();
        let excluded = self
            .ledger
            .exclusion_set(&phones, blacklist_since)
            .map_err(|e| AllocError::storage(Phase::Exclusion, e))?;

        let transaction_id = new_transaction_id();
        let wanted = demand.quantity as usize;
        let mut numbers = Vec::with_capacity(wanted.min(candidates.len()));
        let mut conflicts = 0usize;
        let mut interrupted: Option<StoreError> = None;

        for phone in candidates
            .into_iter()
            .filter(|phone| !excluded.contains(phone))
        {
            if numbers.len() == wanted {
                break;
            }
            let sale = SaleRecord {
                phone_number: phone,
                customer_ref: demand.customer_ref.clone(),
                sold_at: now,
                transaction_id: transaction_id.clone(),
            };
            match self.ledger.try_claim(&sale, blacklist_since) {
                Ok(ClaimOutcome::Claimed) => numbers.push(sale.phone_number),
                Ok(ClaimOutcome::AlreadyClaimed) => {
                    conflicts += 1;
                    debug!(
                        phone = %sale.phone_number,
                        provider = %demand.provider,
                        "claim lost to a concurrent allocation"
                    );
                }
                Err(err) => {
                    interrupted = Some(err);
                    break;
                }
            }
        }

        let outcome = match interrupted {
            Some(err) if numbers.is_empty() => return Err(AllocError::storage(Phase::Claim, err)),
            Some(err) => {
                warn!(
                    %transaction_id,
                    provider = %demand.provider,
                    committed = numbers.len(),
                    requested = demand.quantity,
                    error = %err,
                    "sale ledger failed mid-batch, returning committed numbers only"
                );
                AllocationOutcome::StorageInterrupted
            }
            None if numbers.len() < wanted => {
                warn!(
                    %transaction_id,
                    provider = %demand.provider,
                    found = numbers.len(),
                    requested = demand.quantity,
                    "shortage: pool exhausted"
                );
                AllocationOutcome::InsufficientInventory
            }
            None => AllocationOutcome::Fulfilled,
        };

        info!(
            %transaction_id,
            provider = %demand.provider,
            customer = %demand.customer_ref,
            sold = numbers.len(),
            requested = demand.quantity,
            conflicts,
            "allocation complete"
        );

        Ok(Allocation {
            transaction_id,
            provider: demand.provider,
            requested: demand.quantity,
            sold_at: now,
            numbers,
            outcome,
        })
    }

    /// Distinct fresh numbers of `provider`, ordered by first import.
    fn candidates(&self, provider: Provider, since: u64) -> Result<Vec<String>> {
        let mut first_seen: HashMap<String, u64> = HashMap::new();
        self.pool
            .scan(provider, since, &mut |rec| {
                if rec.provider != provider {
                    return;
                }
                let imported_at = rec.imported_at;
                first_seen
                    .entry(rec.phone_number)
                    .and_modify(|at| *at = (*at).min(imported_at))
                    .or_insert(imported_at);
            })
            .map_err(|e| AllocError::storage(Phase::Scan, e))?;

        let mut ordered: Vec<(u64, String)> = first_seen
            .into_iter()
            .map(|(phone, at)| (at, phone))
            .collect();
        ordered.sort_unstable();
        Ok(ordered.into_iter().map(|(_, phone)| phone).collect())
    }
}
