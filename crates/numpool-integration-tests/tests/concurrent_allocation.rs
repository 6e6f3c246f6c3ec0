//! Integration test: no double-sell across connections and stores.
//!
//! Several `SqliteStore`s open the same database file, each with its own
//! connections, the way independent daemon processes would. Allocations run
//! concurrently on the blocking pool; the union of everything they return
//! must be duplicate-free and must match the sales table exactly.

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use numpool_alloc::{Allocation, AllocationOutcome, Allocator, Demand, ManualClock};
use numpool_db::queries::sales;
use numpool_types::{Provider, SECS_PER_DAY};

use common::{ingest, synthetic_numbers, TempDb};

const NOW: u64 = 1_700_000_000;

fn allocator_for(store: numpool_alloc::SqliteStore, clock: Arc<ManualClock>) -> Arc<Allocator> {
    let store = Arc::new(store);
    Arc::new(Allocator::new(store.clone(), store).with_clock(clock))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_stores_never_double_sell() {
    let db = TempDb::new("concurrent");
    let seed = db.store(1);
    let numbers = synthetic_numbers(Provider::Tsel, 300);
    ingest(&seed, &numbers, NOW - SECS_PER_DAY, "day-1.csv");

    let clock = Arc::new(ManualClock::new(NOW));
    let allocators: Vec<Arc<Allocator>> = (0..4)
        .map(|_| allocator_for(db.store(2), clock.clone()))
        .collect();

    let mut handles = Vec::new();
    for (i, allocator) in allocators.iter().enumerate() {
        for j in 0..3 {
            let allocator = allocator.clone();
            let customer = format!("customer-{i}-{j}");
            handles.push(tokio::task::spawn_blocking(move || {
                allocator
                    .allocate(&Demand::new(Provider::Tsel, 40, customer))
                    .expect("allocate")
            }));
        }
    }

    let mut results: Vec<Allocation> = Vec::new();
    for handle in handles {
        results.push(handle.await.expect("join"));
    }

    let mut returned = HashSet::new();
    for alloc in &results {
        for phone in &alloc.numbers {
            assert!(returned.insert(phone.clone()), "{phone} returned twice");
        }
    }
    // 12 x 40 = 480 requested from 300: everything is sold exactly once.
    assert_eq!(returned.len(), 300);
    assert!(results
        .iter()
        .any(|a| a.outcome == AllocationOutcome::InsufficientInventory));

    let conn = seed.pool().get().expect("conn");
    assert_eq!(sales::count_since(&conn, 0).expect("count"), 300);
    let sold: HashSet<String> = sales::blacklisted_since(&conn, 0).expect("sold");
    assert_eq!(sold, returned);
}

#[tokio::test]
async fn retry_after_completion_is_disjoint() {
    let db = TempDb::new("retry");
    let store = db.store(2);
    let numbers = synthetic_numbers(Provider::Isat, 20);
    ingest(&store, &numbers, NOW - 60, "isat.csv");

    let allocator = allocator_for(store, Arc::new(ManualClock::new(NOW)));
    let first = allocator
        .allocate(&Demand::new(Provider::Isat, 8, "anto"))
        .expect("first");
    let retry = allocator
        .allocate(&Demand::new(Provider::Isat, 8, "anto"))
        .expect("retry");

    assert_eq!(first.numbers.len(), 8);
    assert_eq!(retry.numbers.len(), 8);
    let first_set: HashSet<_> = first.numbers.iter().collect();
    assert!(retry.numbers.iter().all(|n| !first_set.contains(n)));
}

#[tokio::test]
async fn uncontended_order_is_deterministic() {
    let db = TempDb::new("determinism");
    let store = db.store(1);
    let mut numbers = synthetic_numbers(Provider::Xl, 10);
    // Two import batches: the older batch must be sold first.
    let older = numbers.split_off(5);
    ingest(&store, &older, NOW - 2 * SECS_PER_DAY, "older.csv");
    ingest(&store, &numbers, NOW - SECS_PER_DAY, "newer.csv");

    let allocator = allocator_for(store, Arc::new(ManualClock::new(NOW)));
    let alloc = allocator
        .allocate(&Demand::new(Provider::Xl, 10, "anto"))
        .expect("allocate");

    let mut expected = older.clone();
    expected.extend(numbers);
    assert_eq!(alloc.numbers, expected);

    let drained = allocator
        .allocate(&Demand::new(Provider::Xl, 10, "anto"))
        .expect("drained");
    assert!(drained.numbers.is_empty());
}
