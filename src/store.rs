use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Connection;
use tokio::task;

use crate::db;
use crate::error::{BursarError, Result};
use crate::models::{store_timestamp, Transaction};

/// Upserts are applied in chunks so a large backfill never holds one write
/// transaction open for the whole batch. There is no atomicity across
/// chunks; a failed chunk is repaired by the next sync because upsert is
/// idempotent.
const UPSERT_CHUNK: usize = 500;

const TXN_COLUMNS: &str = "id, account_id, createdAt, amount, kind, vendorName, \
     counterpartyName, bankDescription, mercuryCategory";

/// Insert-or-replace the batch, keyed by transaction id. Safe to call
/// repeatedly with overlapping batches.
pub fn upsert_batch(conn: &mut Connection, txs: &[Transaction]) -> Result<()> {
    for chunk in txs.chunks(UPSERT_CHUNK) {
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR REPLACE INTO transactions \
                 (id, account_id, createdAt, amount, kind, vendorName, \
                  counterpartyName, bankDescription, mercuryCategory) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for t in chunk {
                stmt.execute(rusqlite::params![
                    t.id,
                    t.account_id,
                    store_timestamp(&t.created_at),
                    t.amount,
                    t.kind,
                    t.vendor_name,
                    t.counterparty_name,
                    t.bank_description,
                    t.category,
                ])?;
            }
        }
        tx.commit()?;
    }
    Ok(())
}

fn month_bounds(year: i32, month: u32) -> Result<(String, String)> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| BursarError::Other(format!("invalid month: {year}-{month:02}")))?;
    let (end_year, end_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    Ok((
        format!("{year:04}-{month:02}-01T00:00:00.000Z"),
        format!("{end_year:04}-{end_month:02}-01T00:00:00.000Z"),
    ))
}

fn row_to_transaction(row: &rusqlite::Row<'_>) -> rusqlite::Result<(Transaction, String)> {
    let created_raw: String = row.get(2)?;
    let tx = Transaction {
        id: row.get(0)?,
        account_id: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        created_at: DateTime::<Utc>::MIN_UTC, // replaced after parsing
        amount: row.get(3)?,
        kind: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        vendor_name: row
            .get::<_, Option<String>>(5)?
            .unwrap_or_else(|| "Unknown Vendor".to_string()),
        counterparty_name: row.get(6)?,
        bank_description: row.get(7)?,
        category: row.get(8)?,
    };
    Ok((tx, created_raw))
}

fn parse_created(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| BursarError::Other(format!("bad createdAt in store: {raw}: {e}")))
}

fn collect_transactions(
    stmt: &mut rusqlite::Statement<'_>,
    params: &[&dyn rusqlite::ToSql],
) -> Result<Vec<Transaction>> {
    let rows = stmt
        .query_map(params, row_to_transaction)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter()
        .map(|(mut tx, raw)| {
            tx.created_at = parse_created(&raw)?;
            Ok(tx)
        })
        .collect()
}

/// All transactions with `createdAt` in `[month_start, next_month_start)`,
/// ordered ascending.
pub fn query_by_month(conn: &Connection, year: i32, month: u32) -> Result<Vec<Transaction>> {
    let (start, end) = month_bounds(year, month)?;
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {TXN_COLUMNS} FROM transactions \
         WHERE createdAt >= ?1 AND createdAt < ?2 ORDER BY createdAt ASC"
    ))?;
    collect_transactions(&mut stmt, rusqlite::params![start, end])
}

/// The sync watermark: latest `createdAt` in the store, `None` when empty
/// (callers treat that as "full sync needed").
pub fn max_created_at(conn: &Connection) -> Result<Option<DateTime<Utc>>> {
    let raw: Option<String> =
        conn.query_row("SELECT MAX(createdAt) FROM transactions", [], |row| row.get(0))?;
    match raw {
        Some(s) => Ok(Some(parse_created(&s)?)),
        None => Ok(None),
    }
}

/// Case-insensitive substring match over the vendor, counterparty, and bank
/// description columns, optionally restricted to one month.
pub fn query_by_vendor(
    conn: &Connection,
    pattern: &str,
    month: Option<(i32, u32)>,
) -> Result<Vec<Transaction>> {
    let like = format!("%{}%", pattern.to_lowercase());
    let name_clause = "(lower(vendorName) LIKE ?1 \
         OR lower(counterpartyName) LIKE ?1 \
         OR lower(bankDescription) LIKE ?1)";
    match month {
        Some((year, m)) => {
            let (start, end) = month_bounds(year, m)?;
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {TXN_COLUMNS} FROM transactions \
                 WHERE {name_clause} AND createdAt >= ?2 AND createdAt < ?3 \
                 ORDER BY createdAt ASC"
            ))?;
            collect_transactions(&mut stmt, rusqlite::params![like, start, end])
        }
        None => {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {TXN_COLUMNS} FROM transactions \
                 WHERE {name_clause} ORDER BY createdAt ASC"
            ))?;
            collect_transactions(&mut stmt, rusqlite::params![like])
        }
    }
}

pub fn count(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT count(*) FROM transactions", [], |row| row.get(0))?)
}

/// Async handle over the transaction cache. Every call opens its own
/// connection inside `spawn_blocking` and closes it on return, so the daily
/// sync task and the notification poller can use the store concurrently
/// without sharing a connection.
#[derive(Debug, Clone)]
pub struct TxnStore {
    db_path: PathBuf,
}

impl TxnStore {
    pub fn new(db_path: PathBuf) -> Self {
        Self { db_path }
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let path = self.db_path.clone();
        task::spawn_blocking(move || {
            let mut conn = db::get_connection(&path)?;
            f(&mut conn)
        })
        .await?
    }

    pub async fn init(&self) -> Result<()> {
        self.with_conn(|conn| db::init_db(conn)).await
    }

    pub async fn upsert_batch(&self, txs: Vec<Transaction>) -> Result<()> {
        self.with_conn(move |conn| upsert_batch(conn, &txs)).await
    }

    pub async fn query_by_month(&self, year: i32, month: u32) -> Result<Vec<Transaction>> {
        self.with_conn(move |conn| query_by_month(conn, year, month))
            .await
    }

    pub async fn max_created_at(&self) -> Result<Option<DateTime<Utc>>> {
        self.with_conn(|conn| max_created_at(conn)).await
    }

    pub async fn query_by_vendor(
        &self,
        pattern: String,
        month: Option<(i32, u32)>,
    ) -> Result<Vec<Transaction>> {
        self.with_conn(move |conn| query_by_vendor(conn, &pattern, month))
            .await
    }

    pub async fn count(&self) -> Result<i64> {
        self.with_conn(|conn| count(conn)).await
    }
}
