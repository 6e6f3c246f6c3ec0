//! Sales-history queries: the sale ledger.
//!
//! Rows are only ever inserted. A number is blacklisted while it has a row
//! with `sold_at` inside the trailing blacklist window.

use std::collections::HashSet;

use rusqlite::{Connection, TransactionBehavior};

use numpool_types::SaleRecord;

use crate::{db_bound, from_db_time, to_db_time, DbError, Result};

/// Append a sale unconditionally.
///
/// Used for importing existing sales history. Allocation goes through
/// [`claim`], which refuses numbers still inside the blacklist window.
pub fn insert(conn: &Connection, sale: &SaleRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO sales_history (phone_number, customer_ref, sold_at, transaction_id)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![
            sale.phone_number,
            sale.customer_ref,
            to_db_time(sale.sold_at)?,
            sale.transaction_id,
        ],
    )?;
    Ok(())
}

/// Atomically record `sale` unless its number was sold at or after
/// `blacklist_since`.
///
/// Returns `true` when the sale was written. The check and the insert are a
/// single statement inside a `BEGIN IMMEDIATE` transaction, so the write lock
/// is held from the existence check to commit and no other connection can
/// slip a sale for the same number in between.
pub fn claim(conn: &mut Connection, sale: &SaleRecord, blacklist_since: u64) -> Result<bool> {
    let sold_at = to_db_time(sale.sold_at)?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let inserted = tx.execute(
        "INSERT INTO sales_history (phone_number, customer_ref, sold_at, transaction_id)
         SELECT ?1, ?2, ?3, ?4
         WHERE NOT EXISTS (
             SELECT 1 FROM sales_history WHERE phone_number = ?1 AND sold_at >= ?5
         )",
        rusqlite::params![
            sale.phone_number,
            sale.customer_ref,
            sold_at,
            sale.transaction_id,
            db_bound(blacklist_since),
        ],
    )?;
    tx.commit()?;
    Ok(inserted == 1)
}

/// Whether `phone_number` was sold at or after `since`.
pub fn is_blacklisted(conn: &Connection, phone_number: &str, since: u64) -> Result<bool> {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS (
                 SELECT 1 FROM sales_history WHERE phone_number = ?1 AND sold_at >= ?2
             )",
            rusqlite::params![phone_number, db_bound(since)],
            |row| row.get(0),
        )
        .map_err(DbError::Sqlite)?;
    Ok(exists != 0)
}

/// Distinct numbers sold at or after `since`.
pub fn blacklisted_since(conn: &Connection, since: u64) -> Result<HashSet<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT DISTINCT phone_number FROM sales_history WHERE sold_at >= ?1",
    )?;
    let numbers = stmt
        .query_map([db_bound(since)], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<HashSet<_>, _>>()?;
    Ok(numbers)
}

/// Bound parameters per `IN (...)` chunk, below SQLite's variable limit.
const IN_CHUNK: usize = 500;

/// The subset of `phone_numbers` sold at or after `since`.
///
/// Cost follows the number of candidates, not the size of the window.
pub fn blacklisted_among(
    conn: &Connection,
    phone_numbers: &[&str],
    since: u64,
) -> Result<HashSet<String>> {
    let mut excluded = HashSet::new();
    for chunk in phone_numbers.chunks(IN_CHUNK) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let sql = format!(
            "SELECT DISTINCT phone_number FROM sales_history
             WHERE sold_at >= ?1 AND phone_number IN ({placeholders})"
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let bound = db_bound(since);
        let params = std::iter::once(&bound as &dyn rusqlite::ToSql)
            .chain(chunk.iter().map(|p| p as &dyn rusqlite::ToSql));
        let rows = stmt.query_map(rusqlite::params_from_iter(params), |row| {
            row.get::<_, String>(0)
        })?;
        for row in rows {
            excluded.insert(row?);
        }
    }
    Ok(excluded)
}

/// Most recent sales, newest first.
pub fn recent(conn: &Connection, limit: u32) -> Result<Vec<SaleRecord>> {
    let mut stmt = conn.prepare(
        "SELECT phone_number, customer_ref, sold_at, transaction_id
         FROM sales_history ORDER BY sold_at DESC, id DESC LIMIT ?1",
    )?;
    let rows = stmt
        .query_map([limit], sale_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// All sales written by one allocation, in claim order.
pub fn for_transaction(conn: &Connection, transaction_id: &str) -> Result<Vec<SaleRecord>> {
    let mut stmt = conn.prepare(
        "SELECT phone_number, customer_ref, sold_at, transaction_id
         FROM sales_history WHERE transaction_id = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt
        .query_map([transaction_id], sale_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Number of sales recorded at or after `since`.
pub fn count_since(conn: &Connection, since: u64) -> Result<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sales_history WHERE sold_at >= ?1",
        [db_bound(since)],
        |row| row.get(0),
    )?;
    Ok(from_db_time(count))
}

fn sale_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SaleRecord> {
    Ok(SaleRecord {
        phone_number: row.get(0)?,
        customer_ref: row.get(1)?,
        sold_at: from_db_time(row.get(2)?),
        transaction_id: row.get(3)?,
    })
}
