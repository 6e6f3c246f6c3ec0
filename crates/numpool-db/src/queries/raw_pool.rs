//! Raw Pool queries: ingestion, candidate scans and reporting.

use rusqlite::Connection;

use numpool_types::{PhoneRecord, Provider};

use crate::{db_bound, from_db_time, to_db_time, DbError, Result};

/// Insert a batch of ingested records in a single transaction.
///
/// Returns the number of rows written.
pub fn insert_batch(conn: &mut Connection, records: &[PhoneRecord]) -> Result<usize> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO raw_pool (phone_number, provider, imported_at, source_file, raw_payload)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for rec in records {
            stmt.execute(rusqlite::params![
                rec.phone_number,
                rec.provider.as_str(),
                to_db_time(rec.imported_at)?,
                rec.source_file,
                rec.raw_payload,
            ])?;
        }
    }
    tx.commit()?;
    tracing::debug!(rows = records.len(), "raw pool: batch ingested");
    Ok(records.len())
}

/// Stream every record for `provider` imported at or after `since`.
///
/// Rows arrive in import order (ties broken by insertion order), so two scans
/// over an unchanged pool visit the same sequence.
pub fn scan(
    conn: &Connection,
    provider: Provider,
    since: u64,
    mut visit: impl FnMut(PhoneRecord),
) -> Result<()> {
    let mut stmt = conn.prepare_cached(
        "SELECT phone_number, imported_at, source_file, raw_payload
         FROM raw_pool
         WHERE provider = ?1 AND imported_at >= ?2
         ORDER BY imported_at ASC, id ASC",
    )?;

    let rows = stmt.query_map(rusqlite::params![provider.as_str(), db_bound(since)], |row| {
        Ok(PhoneRecord {
            phone_number: row.get(0)?,
            provider,
            imported_at: from_db_time(row.get(1)?),
            source_file: row.get(2)?,
            raw_payload: row.get::<_, Option<Vec<u8>>>(3)?.unwrap_or_default(),
        })
    })?;

    for row in rows {
        visit(row?);
    }
    Ok(())
}

/// Count distinct numbers for `provider` imported at or after `since`.
pub fn count_since(conn: &Connection, provider: Provider, since: u64) -> Result<u64> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(DISTINCT phone_number) FROM raw_pool
             WHERE provider = ?1 AND imported_at >= ?2",
            rusqlite::params![provider.as_str(), db_bound(since)],
            |row| row.get(0),
        )
        .map_err(DbError::Sqlite)?;
    Ok(from_db_time(count))
}

/// Count distinct numbers that are currently sellable.
///
/// Set-based anti-join of fresh pool rows against the blacklist window. Only
/// used for reporting; allocation goes through per-number claims.
pub fn available_count(
    conn: &Connection,
    provider: Provider,
    pool_since: u64,
    blacklist_since: u64,
) -> Result<u64> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(DISTINCT r.phone_number)
             FROM raw_pool r
             LEFT JOIN (
                 SELECT DISTINCT phone_number FROM sales_history WHERE sold_at >= ?3
             ) b ON r.phone_number = b.phone_number
             WHERE r.provider = ?1
               AND r.imported_at >= ?2
               AND b.phone_number IS NULL",
            rusqlite::params![
                provider.as_str(),
                db_bound(pool_since),
                db_bound(blacklist_since)
            ],
            |row| row.get(0),
        )
        .map_err(DbError::Sqlite)?;
    Ok(from_db_time(count))
}

/// Delete pool rows imported before `cutoff`. Returns the number removed.
pub fn prune_before(conn: &Connection, cutoff: u64) -> Result<usize> {
    let removed = conn.execute(
        "DELETE FROM raw_pool WHERE imported_at < ?1",
        [db_bound(cutoff)],
    )?;
    if removed > 0 {
        tracing::info!(removed, cutoff, "raw pool: pruned expired rows");
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        crate::open_memory().expect("open test db")
    }

    fn rec(phone: &str, imported_at: u64) -> PhoneRecord {
        PhoneRecord::detected(phone, imported_at, "test.csv")
    }

    fn scan_all(conn: &Connection, provider: Provider, since: u64) -> Vec<PhoneRecord> {
        let mut out = Vec::new();
        scan(conn, provider, since, |r| out.push(r)).expect("scan");
        out
    }

    #[test]
    fn test_insert_and_scan() {
        let mut conn = test_db();
        let written = insert_batch(
            &mut conn,
            &[rec("081200000002", 200), rec("081200000001", 100), rec("085700000001", 100)],
        )
        .expect("insert");
        assert_eq!(written, 3);

        let tsel = scan_all(&conn, Provider::Tsel, 0);
        assert_eq!(tsel.len(), 2);
        // Import order, not insertion order.
        assert_eq!(tsel[0].phone_number, "081200000001");
        assert_eq!(tsel[1].phone_number, "081200000002");
        assert!(tsel.iter().all(|r| r.provider == Provider::Tsel));
    }

    #[test]
    fn test_scan_respects_since() {
        let mut conn = test_db();
        insert_batch(&mut conn, &[rec("081200000001", 100), rec("081200000002", 200)])
            .expect("insert");
        let fresh = scan_all(&conn, Provider::Tsel, 150);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].phone_number, "081200000002");
    }

    #[test]
    fn test_payload_roundtrip() {
        let mut conn = test_db();
        let mut r = rec("081200000001", 100);
        r.raw_payload = b"slot_b.com".to_vec();
        insert_batch(&mut conn, &[r]).expect("insert");
        let rows = scan_all(&conn, Provider::Tsel, 0);
        assert_eq!(rows[0].raw_payload, b"slot_b.com");
    }

    #[test]
    fn test_count_since_is_distinct() {
        let mut conn = test_db();
        insert_batch(
            &mut conn,
            &[rec("081200000001", 100), rec("081200000001", 110), rec("081200000002", 120)],
        )
        .expect("insert");
        assert_eq!(count_since(&conn, Provider::Tsel, 0).expect("count"), 2);
        assert_eq!(count_since(&conn, Provider::Isat, 0).expect("count"), 0);
    }

    #[test]
    fn test_available_count_excludes_recent_sales() {
        let mut conn = test_db();
        insert_batch(&mut conn, &[rec("081200000001", 100), rec("081200000002", 100)])
            .expect("insert");
        crate::queries::sales::insert(
            &conn,
            &numpool_types::SaleRecord {
                phone_number: "081200000001".into(),
                customer_ref: "anto".into(),
                sold_at: 500,
                transaction_id: "tx".into(),
            },
        )
        .expect("sale");

        assert_eq!(available_count(&conn, Provider::Tsel, 0, 400).expect("count"), 1);
        // Sale fell out of the blacklist window.
        assert_eq!(available_count(&conn, Provider::Tsel, 0, 600).expect("count"), 2);
    }

    #[test]
    fn test_oversized_imported_at_rejected() {
        let mut conn = test_db();
        let err = insert_batch(
            &mut conn,
            &[rec("081200000001", 100), rec("081200000002", i64::MAX as u64 + 10)],
        )
        .expect_err("out of range");
        assert!(matches!(err, DbError::TimestampOutOfRange(_)));
        // The whole batch rolled back.
        assert!(scan_all(&conn, Provider::Tsel, 0).is_empty());
    }

    #[test]
    fn test_prune_before() {
        let mut conn = test_db();
        insert_batch(&mut conn, &[rec("081200000001", 100), rec("081200000002", 300)])
            .expect("insert");
        assert_eq!(prune_before(&conn, 200).expect("prune"), 1);
        assert_eq!(scan_all(&conn, Provider::Tsel, 0).len(), 1);
    }
}
