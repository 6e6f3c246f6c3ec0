//! SQL schema definitions.

/// Complete schema for numpool v1 database.
pub const SCHEMA_V1: &str = r#"
-- ============================================================
-- Raw Pool: ingested numbers awaiting sale. Read-only to the allocator.
-- ============================================================

CREATE TABLE IF NOT EXISTS raw_pool (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    phone_number TEXT NOT NULL,
    provider TEXT NOT NULL,
    imported_at INTEGER NOT NULL,
    source_file TEXT NOT NULL,
    raw_payload BLOB
);

-- Candidate scan: provider + freshness window.
CREATE INDEX IF NOT EXISTS idx_raw_provider_date ON raw_pool(provider, imported_at);
CREATE INDEX IF NOT EXISTS idx_raw_phone ON raw_pool(phone_number);

-- ============================================================
-- Sales history: the sale ledger. Append-only.
-- ============================================================

CREATE TABLE IF NOT EXISTS sales_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    phone_number TEXT NOT NULL,
    customer_ref TEXT NOT NULL,
    sold_at INTEGER NOT NULL,
    transaction_id TEXT NOT NULL
);

-- Blacklist check and claim predicate.
CREATE INDEX IF NOT EXISTS idx_sales_check ON sales_history(phone_number, sold_at);
CREATE INDEX IF NOT EXISTS idx_sales_time ON sales_history(sold_at);
CREATE INDEX IF NOT EXISTS idx_sales_tx ON sales_history(transaction_id);
"#;
