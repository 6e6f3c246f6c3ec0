//! # numpool-db
//!
//! SQLite persistence for the Raw Pool and the sale ledger.
//!
//! - WAL mode, so scans keep reading while a claim holds the write lock
//! - All timestamps are Unix epoch seconds (u64, stored as INTEGER)
//! - Schema version stored in `PRAGMA user_version`

pub mod migrations;
pub mod pool;
pub mod queries;
pub mod schema;

use rusqlite::Connection;
use std::path::Path;

pub use pool::ConnectionPool;

/// Current schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Database error types.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("timestamp {0} does not fit in an INTEGER column")]
    TimestampOutOfRange(u64),

    #[error("connection pool: {0}")]
    Pool(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Open or create the numpool database at the given path.
///
/// Configures WAL mode and runs any pending migrations.
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    configure(&conn)?;
    migrations::run(&conn)?;
    Ok(conn)
}

/// Open an in-memory database (for testing).
pub fn open_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    migrations::run(&conn)?;
    Ok(conn)
}

/// Stored form of a timestamp being written.
pub(crate) fn to_db_time(secs: u64) -> Result<i64> {
    i64::try_from(secs).map_err(|_| DbError::TimestampOutOfRange(secs))
}

/// Stored form of a window bound. Bounds past the INTEGER range saturate.
pub(crate) fn db_bound(secs: u64) -> i64 {
    i64::try_from(secs).unwrap_or(i64::MAX)
}

/// Timestamp read back from a row. Stored values are never negative.
pub(crate) fn from_db_time(stored: i64) -> u64 {
    u64::try_from(stored).unwrap_or_default()
}

/// Configure SQLite pragmas.
pub(crate) fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;
         PRAGMA cache_size = -8000;",
    )?;
    Ok(())
}
