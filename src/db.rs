use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;

// Column names follow the upstream wire format so rows round-trip without a
// rename layer. Lower-cased expression indexes back the case-insensitive
// vendor substring search.
pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS transactions (
    id TEXT PRIMARY KEY,
    account_id TEXT,
    createdAt TEXT NOT NULL,
    amount REAL NOT NULL,
    kind TEXT,
    vendorName TEXT,
    counterpartyName TEXT,
    bankDescription TEXT,
    mercuryCategory TEXT
);

CREATE INDEX IF NOT EXISTS idx_txn_created_at ON transactions(createdAt);
CREATE INDEX IF NOT EXISTS idx_txn_vendor_lower ON transactions(lower(vendorName));
CREATE INDEX IF NOT EXISTS idx_txn_counterparty_lower ON transactions(lower(counterpartyName));
CREATE INDEX IF NOT EXISTS idx_txn_bank_desc_lower ON transactions(lower(bankDescription));
";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}
