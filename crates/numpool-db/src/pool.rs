//! A small fixed-size pool of connections to one database file.
//!
//! SQLite serializes writers itself; the pool exists so that Raw Pool scans
//! and blacklist reads on one connection are not queued behind a claim that
//! holds another connection's write lock.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, TryLockError};

use rusqlite::Connection;

use crate::{DbError, Result};

/// Round-robin pool of SQLite connections.
pub struct ConnectionPool {
    conns: Vec<Mutex<Connection>>,
    next: AtomicUsize,
}

impl ConnectionPool {
    /// Open `size` connections to the database at `path`.
    ///
    /// The first connection runs migrations; the rest only configure pragmas.
    pub fn open(path: &Path, size: usize) -> Result<Self> {
        let size = size.max(1);
        let mut conns = Vec::with_capacity(size);
        conns.push(Mutex::new(crate::open(path)?));
        for _ in 1..size {
            let conn = Connection::open(path)?;
            crate::configure(&conn)?;
            conns.push(Mutex::new(conn));
        }
        tracing::debug!(size, path = %path.display(), "opened connection pool");
        Ok(Self::from_connections(conns))
    }

    /// A single-connection pool over a fresh in-memory database.
    ///
    /// In-memory databases are private to their connection, so this pool
    /// never holds more than one.
    pub fn memory() -> Result<Self> {
        Ok(Self::from_connections(vec![Mutex::new(crate::open_memory()?)]))
    }

    fn from_connections(conns: Vec<Mutex<Connection>>) -> Self {
        Self {
            conns,
            next: AtomicUsize::new(0),
        }
    }

    /// Number of connections in the pool.
    pub fn size(&self) -> usize {
        self.conns.len()
    }

    /// Check out a connection.
    ///
    /// Prefers an idle connection starting from the round-robin cursor and
    /// blocks on the cursor's connection when all are busy.
    pub fn get(&self) -> Result<MutexGuard<'_, Connection>> {
        let len = self.conns.len();
        let start = self.next.fetch_add(1, Ordering::Relaxed) % len;

        for offset in 0..len {
            match self.conns[(start + offset) % len].try_lock() {
                Ok(guard) => return Ok(guard),
                Err(TryLockError::WouldBlock) => continue,
                Err(TryLockError::Poisoned(_)) => {
                    return Err(DbError::Pool("connection poisoned".into()))
                }
            }
        }

        self.conns[start]
            .lock()
            .map_err(|_| DbError::Pool("connection poisoned".into()))
    }
}
