//! # numpool-alloc
//!
//! Double-sell prevention for phone-number allocation.
//!
//! The [`Allocator`] turns "sell N numbers from provider P that have not been
//! sold in the last 30 days" into a claim-then-verify loop: candidates come
//! from a Raw Pool scan, recently sold numbers are excluded, and every
//! remaining candidate is claimed individually through an atomic
//! insert-if-absent on the sale ledger. A claim that loses a race to a
//! concurrent allocation is skipped. The ledger, not a lock, is the authority,
//! so allocations for different providers never wait on each other.
//!
//! ## Modules
//!
//! - [`store`] — collaborator traits for the Raw Pool and the sale ledger
//! - [`memory`] — in-process store
//! - [`sqlite`] — store over `numpool-db`
//! - [`allocator`] — the allocation procedure
//! - [`order`] — multi-provider orders

pub mod allocator;
pub mod memory;
pub mod order;
pub mod sqlite;
pub mod store;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

pub use allocator::{Allocation, AllocationOutcome, Allocator, Demand, Windows};
pub use memory::MemoryStore;
pub use order::{FailedLine, OrderLine, OrderReceipt};
pub use sqlite::SqliteStore;
pub use store::{ClaimOutcome, RawPoolReader, SaleLedger, StoreError};

/// Allocation step that hit a storage failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Raw Pool candidate scan.
    Scan,
    /// Blacklist read.
    Exclusion,
    /// Claiming a candidate in the sale ledger.
    Claim,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Scan => "scan",
            Phase::Exclusion => "exclusion",
            Phase::Claim => "claim",
        })
    }
}

/// Error types for allocation.
#[derive(Debug, thiserror::Error)]
pub enum AllocError {
    /// The backing store could not be read or written.
    ///
    /// Nothing was committed by this call; retrying it is safe.
    #[error("storage unavailable during {phase}: {source}")]
    StorageUnavailable {
        /// Step that failed.
        phase: Phase,
        /// Underlying store failure.
        #[source]
        source: StoreError,
    },

    /// Quantity or window out of range.
    #[error("invalid demand: {0}")]
    InvalidDemand(String),
}

impl AllocError {
    pub(crate) fn storage(phase: Phase, source: StoreError) -> Self {
        AllocError::StorageUnavailable { phase, source }
    }
}

/// Convenience result type for allocation.
pub type Result<T> = std::result::Result<T, AllocError>;

/// Source of "now" for window arithmetic and `sold_at` stamps.
pub trait Clock: Send + Sync {
    /// Current Unix time in seconds.
    fn now(&self) -> u64;
}

/// Wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        numpool_types::unix_now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    /// Create a clock frozen at `now`.
    pub fn new(now: u64) -> Self {
        Self {
            now: AtomicU64::new(now),
        }
    }

    /// Jump to `now`.
    pub fn set(&self, now: u64) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Move forward by `secs`.
    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Fresh allocation identifier: 16 random bytes, hex-encoded.
pub fn new_transaction_id() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}
