//! Integration test: the blacklist window over time.
//!
//! 1. Ingest a day's batch and sell part of it
//! 2. Confirm the sold numbers stay blocked inside the window
//! 3. Advance the clock past the window and confirm they sell again
//! 4. Run a mixed-provider order against the same database

mod common;

use std::sync::Arc;

use numpool_alloc::{AllocationOutcome, Allocator, Demand, ManualClock, OrderLine, SaleLedger};
use numpool_db::queries::{raw_pool, sales};
use numpool_types::{Provider, SaleRecord, SECS_PER_DAY};

use common::{ingest, synthetic_numbers, TempDb};

const DAY0: u64 = 1_700_000_000;

#[tokio::test]
async fn sold_numbers_return_after_window() {
    let db = TempDb::new("lifecycle");
    let store = Arc::new(db.store(2));
    let numbers = synthetic_numbers(Provider::Tsel, 5);
    ingest(&store, &numbers, DAY0, "day0.csv");

    let clock = Arc::new(ManualClock::new(DAY0 + 60));
    let allocator = Allocator::new(store.clone(), store.clone()).with_clock(clock.clone());

    // Step 1: pool {A..E}, sell 3 then the remaining 2.
    let first = allocator
        .allocate(&Demand::new(Provider::Tsel, 3, "anto"))
        .expect("first");
    assert_eq!(first.numbers, numbers[..3]);
    let second = allocator
        .allocate(&Demand::new(Provider::Tsel, 3, "anto"))
        .expect("second");
    assert_eq!(second.numbers, numbers[3..]);
    assert_eq!(second.outcome, AllocationOutcome::InsufficientInventory);

    // Step 2: the same numbers are re-scraped a week later but stay blocked.
    clock.advance(7 * SECS_PER_DAY);
    ingest(&store, &numbers, clock_now(&clock), "day7.csv");
    let blocked = allocator
        .allocate(&Demand::new(Provider::Tsel, 5, "anto"))
        .expect("blocked");
    assert!(blocked.numbers.is_empty());
    for phone in &numbers {
        assert!(store
            .is_blacklisted(phone, clock_now(&clock) - 30 * SECS_PER_DAY)
            .expect("blacklist read"));
    }

    // Step 3: 31 days after the sale, re-scraped numbers sell again.
    clock.set(DAY0 + 60 + 31 * SECS_PER_DAY);
    ingest(&store, &numbers, clock_now(&clock), "day31.csv");
    let resold = allocator
        .allocate(&Demand::new(Provider::Tsel, 5, "bima"))
        .expect("resold");
    assert_eq!(resold.numbers, numbers);

    let conn = store.pool().get().expect("conn");
    assert_eq!(sales::count_since(&conn, 0).expect("count"), 10);
}

#[tokio::test]
async fn imported_history_blocks_allocation() {
    let db = TempDb::new("history");
    let store = Arc::new(db.store(1));
    let numbers = synthetic_numbers(Provider::Tsel, 2);
    ingest(&store, &numbers, DAY0, "day0.csv");
    {
        let conn = store.pool().get().expect("conn");
        sales::insert(
            &conn,
            &SaleRecord {
                phone_number: numbers[0].clone(),
                customer_ref: "legacy".into(),
                sold_at: DAY0 - 5 * SECS_PER_DAY,
                transaction_id: "legacy-import".into(),
            },
        )
        .expect("history");
    }

    let allocator = Allocator::new(store.clone(), store.clone())
        .with_clock(Arc::new(ManualClock::new(DAY0 + 60)));
    let alloc = allocator
        .allocate(&Demand::new(Provider::Tsel, 2, "anto"))
        .expect("allocate");
    assert_eq!(alloc.numbers, [numbers[1].clone()]);
}

#[tokio::test]
async fn mixed_order_against_file_database() {
    let db = TempDb::new("order");
    let store = Arc::new(db.store(2));
    let tsel = synthetic_numbers(Provider::Tsel, 50);
    let isat = synthetic_numbers(Provider::Isat, 10);
    ingest(&store, &tsel, DAY0, "mixed.csv");
    ingest(&store, &isat, DAY0, "mixed.csv");

    let allocator = Allocator::new(store.clone(), store.clone())
        .with_clock(Arc::new(ManualClock::new(DAY0 + 60)));
    let receipt = allocator
        .process_order(
            "Anto",
            &[
                OrderLine {
                    provider: Provider::Tsel,
                    quantity: 40,
                },
                OrderLine {
                    provider: Provider::Isat,
                    quantity: 20,
                },
            ],
        )
        .expect("order");

    assert_eq!(receipt.numbers_for(Provider::Tsel).len(), 40);
    assert_eq!(receipt.numbers_for(Provider::Isat).len(), 10);
    let short: Vec<_> = receipt.shortages().map(|a| a.provider).collect();
    assert_eq!(short, [Provider::Isat]);

    let conn = store.pool().get().expect("conn");
    assert_eq!(
        raw_pool::available_count(&conn, Provider::Tsel, 0, DAY0).expect("available"),
        10
    );
}

fn clock_now(clock: &ManualClock) -> u64 {
    numpool_alloc::Clock::now(clock)
}
