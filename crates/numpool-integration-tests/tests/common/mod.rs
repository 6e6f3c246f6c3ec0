//! Helpers shared by the integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use numpool_alloc::SqliteStore;
use numpool_db::queries::raw_pool;
use numpool_types::{PhoneRecord, Provider};
use rand::Rng;

/// A database file under the OS temp dir, removed on drop.
pub struct TempDb {
    path: PathBuf,
}

impl TempDb {
    pub fn new(label: &str) -> Self {
        let path = std::env::temp_dir().join(format!(
            "numpool-{label}-{}-{:016x}.db",
            std::process::id(),
            rand::random::<u64>()
        ));
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a store with its own connections, as a separate process would.
    pub fn store(&self, connections: usize) -> SqliteStore {
        SqliteStore::open(&self.path, connections).expect("open store")
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut p = self.path.clone().into_os_string();
            p.push(suffix);
            let _ = std::fs::remove_file(PathBuf::from(p));
        }
    }
}

/// Random, distinct numbers with a provider's prefix.
pub fn synthetic_numbers(provider: Provider, count: usize) -> Vec<String> {
    let prefix = match provider {
        Provider::Tsel => "0812",
        Provider::Isat => "0857",
        Provider::Xl => "0819",
        Provider::Three | Provider::Other => "0896",
    };
    let mut rng = rand::thread_rng();
    let mut seen = std::collections::HashSet::new();
    while seen.len() < count {
        seen.insert(format!("{prefix}{}", rng.gen_range(10_000_000..100_000_000)));
    }
    let mut numbers: Vec<String> = seen.into_iter().collect();
    numbers.sort();
    numbers
}

/// Ingest `numbers` into the store's Raw Pool at `imported_at`.
pub fn ingest(store: &SqliteStore, numbers: &[String], imported_at: u64, source: &str) {
    let records: Vec<PhoneRecord> = numbers
        .iter()
        .map(|n| PhoneRecord::detected(n, imported_at, source))
        .collect();
    let mut conn = store.pool().get().expect("conn");
    raw_pool::insert_batch(&mut conn, &records).expect("ingest");
}
