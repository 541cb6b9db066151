use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use tracing::{info, warn};

use crate::error::{BursarError, Result};
use crate::mercury::TransactionSource;
use crate::models::Transaction;
use crate::store::TxnStore;

/// Keeps the local cache eventually consistent with the upstream source.
/// Treasury accounts are excluded from transaction sync; only core and
/// credit pools carry transactions we track.
pub struct SyncEngine<S> {
    source: S,
    store: TxnStore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Full,
    Incremental,
}

impl<S: TransactionSource> SyncEngine<S> {
    pub fn new(source: S, store: TxnStore) -> Self {
        Self { source, store }
    }

    /// Full backfill when the store is empty, watermark-bounded catch-up
    /// otherwise.
    pub async fn sync(&self) -> Result<SyncMode> {
        match self.store.max_created_at().await? {
            None => {
                self.full_sync().await?;
                Ok(SyncMode::Full)
            }
            Some(watermark) => {
                self.incremental_sync_from(watermark).await?;
                Ok(SyncMode::Incremental)
            }
        }
    }

    /// Fetch and cache the complete transaction history of every core and
    /// credit account. Intended to run once, when the store is empty.
    pub async fn full_sync(&self) -> Result<()> {
        info!("starting full transaction sync");
        self.sync_window(None).await?;
        let rows = self.store.count().await?;
        info!(rows, "full sync finished");
        Ok(())
    }

    /// Catch up from the current watermark. No-op (beyond re-upserting the
    /// boundary records) when upstream has nothing new.
    pub async fn incremental_sync(&self) -> Result<()> {
        match self.store.max_created_at().await? {
            Some(watermark) => self.incremental_sync_from(watermark).await,
            // Nothing cached yet; incremental would re-fetch everything anyway.
            None => self.full_sync().await,
        }
    }

    async fn incremental_sync_from(&self, watermark: DateTime<Utc>) -> Result<()> {
        info!(watermark = %watermark, "starting incremental sync");
        self.sync_window(Some(watermark)).await?;
        info!("incremental sync finished");
        Ok(())
    }

    /// One pass over the sync targets. A failing account is logged and
    /// skipped so it cannot block the remaining accounts.
    async fn sync_window(&self, after: Option<DateTime<Utc>>) -> Result<()> {
        let directory = self.source.fetch_accounts().await?;
        for (pool, account) in directory.sync_targets() {
            let Some(account_id) = account.id.as_deref() else {
                continue;
            };
            match self.source.list_transactions(account_id, after).await {
                Ok(raw) => {
                    let batch: Vec<Transaction> =
                        raw.into_iter().filter_map(Transaction::from_raw).collect();
                    let fetched = batch.len();
                    self.store.upsert_batch(batch).await?;
                    info!(account = account_id, pool = %pool, fetched, "account synced");
                }
                Err(e) => {
                    warn!(account = account_id, pool = %pool, error = %e, "account sync failed, skipping");
                }
            }
        }
        Ok(())
    }

    /// Fetch and cache one historical month on demand, for queries that fall
    /// outside the watermark-covered range. Returns the month's transactions.
    pub async fn fetch_month_on_demand(&self, year: i32, month: u32) -> Result<Vec<Transaction>> {
        let since = month_start(year, month)?;
        let directory = self.source.fetch_accounts().await?;
        let mut month_txns: Vec<Transaction> = Vec::new();
        for (pool, account) in directory.sync_targets() {
            let Some(account_id) = account.id.as_deref() else {
                continue;
            };
            match self.source.list_transactions(account_id, Some(since)).await {
                Ok(raw) => {
                    month_txns.extend(
                        raw.into_iter()
                            .filter_map(Transaction::from_raw)
                            .filter(|t| {
                                t.created_at.year() == year && t.created_at.month() == month
                            }),
                    );
                }
                Err(e) => {
                    warn!(account = account_id, pool = %pool, error = %e, "month fetch failed, skipping account");
                }
            }
        }
        info!(year, month, count = month_txns.len(), "fetched month on demand");
        self.store.upsert_batch(month_txns.clone()).await?;
        Ok(month_txns)
    }

    /// Vendor-substring spend lookup, cache-first. A month query with no
    /// cached rows triggers an on-demand fetch of that month before giving
    /// up; the refreshed cache is then queried once more.
    pub async fn vendor_spend(
        &self,
        pattern: &str,
        month: Option<(i32, u32)>,
    ) -> Result<(Vec<Transaction>, f64)> {
        let mut rows = self
            .store
            .query_by_vendor(pattern.to_string(), month)
            .await?;
        if rows.is_empty() {
            if let Some((year, m)) = month {
                self.fetch_month_on_demand(year, m).await?;
                rows = self.store.query_by_vendor(pattern.to_string(), month).await?;
            }
        }
        let total = rows.iter().map(|t| t.amount.abs()).sum();
        Ok((rows, total))
    }
}

fn month_start(year: i32, month: u32) -> Result<DateTime<Utc>> {
    let date = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| BursarError::Other(format!("invalid month: {year}-{month:02}")))?;
    Ok(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap()))
}
