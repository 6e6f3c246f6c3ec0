//! Store over the SQLite database in `numpool-db`.

use std::collections::HashSet;
use std::path::Path;

use numpool_db::queries::{raw_pool, sales};
use numpool_db::{ConnectionPool, DbError};
use numpool_types::{PhoneRecord, Provider, SaleRecord};

use crate::store::{ClaimOutcome, RawPoolReader, SaleLedger, StoreError, StoreResult};

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// Raw Pool and sale ledger backed by SQLite.
///
/// Several `SqliteStore`s (in one process or many) may share a database
/// file; claims stay exclusive because each runs as an immediate transaction.
pub struct SqliteStore {
    pool: ConnectionPool,
}

impl SqliteStore {
    /// Open (and migrate) the database at `path` with `connections` connections.
    pub fn open(path: &Path, connections: usize) -> numpool_db::Result<Self> {
        Ok(Self::from_pool(ConnectionPool::open(path, connections)?))
    }

    /// Fresh in-memory database.
    pub fn memory() -> numpool_db::Result<Self> {
        Ok(Self::from_pool(ConnectionPool::memory()?))
    }

    pub fn from_pool(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// The underlying connection pool, for ingestion and reporting queries.
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }
}

impl RawPoolReader for SqliteStore {
    fn scan(
        &self,
        provider: Provider,
        since: u64,
        sink: &mut dyn FnMut(PhoneRecord),
    ) -> StoreResult<()> {
        let conn = self.pool.get()?;
        raw_pool::scan(&conn, provider, since, sink)?;
        Ok(())
    }
}

impl SaleLedger for SqliteStore {
    fn try_claim(&self, sale: &SaleRecord, blacklist_since: u64) -> StoreResult<ClaimOutcome> {
        let mut conn = self.pool.get()?;
        if sales::claim(&mut conn, sale, blacklist_since)? {
            Ok(ClaimOutcome::Claimed)
        } else {
            Ok(ClaimOutcome::AlreadyClaimed)
        }
    }

    fn is_blacklisted(&self, phone_number: &str, since: u64) -> StoreResult<bool> {
        let conn = self.pool.get()?;
        Ok(sales::is_blacklisted(&conn, phone_number, since)?)
    }

    /// Batched `IN` lookups instead of one query per candidate.
    fn exclusion_set(&self, phone_numbers: &[&str], since: u64) -> StoreResult<HashSet<String>> {
        let conn = self.pool.get()?;
        Ok(sales::blacklisted_among(&conn, phone_numbers, since)?)
    }
}
