use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{BursarError, Result};
use crate::models::{store_timestamp, Account, AccountDirectory, RawTransaction};

const PAGE_SIZE: &str = "100";

/// Seam between the sync/notification layers and the upstream banking API.
/// The production implementation is [`MercuryClient`]; tests substitute an
/// in-memory fake.
pub trait TransactionSource {
    /// All accounts across the three pools.
    fn fetch_accounts(&self) -> impl Future<Output = Result<AccountDirectory>> + Send;

    /// Every transaction for `account_id` with `createdAt >= after` (all of
    /// them when `after` is `None`), collected across pages. The page that
    /// crosses below `after` is returned whole; callers absorb the overshoot
    /// via idempotent upsert or the seen-set.
    fn list_transactions(
        &self,
        account_id: &str,
        after: Option<DateTime<Utc>>,
    ) -> impl Future<Output = Result<Vec<RawTransaction>>> + Send;
}

#[derive(Debug, Clone, Default, Deserialize)]
struct AccountEnvelope {
    #[serde(default)]
    accounts: Vec<Account>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TransactionPage {
    #[serde(default)]
    transactions: Vec<RawTransaction>,
}

/// HTTP client for the Mercury API. Owned by whichever component fetches;
/// cheap to clone (the inner connection pool is shared).
#[derive(Debug, Clone)]
pub struct MercuryClient {
    base_url: String,
    token: String,
    http: reqwest::Client,
    accounts_timeout: Duration,
    page_timeout: Duration,
}

impl MercuryClient {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        accounts_timeout: Duration,
        page_timeout: Duration,
    ) -> Result<Self> {
        let base_url = base_url.into();
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
            http: reqwest::Client::builder().build()?,
            accounts_timeout,
            page_timeout,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(
            cfg.base_url.clone(),
            cfg.require_token()?.to_string(),
            cfg.accounts_timeout,
            cfg.page_timeout,
        )
    }

    /// One account pool. A failed pool degrades to an empty list so the
    /// remaining pools still load.
    async fn fetch_pool(&self, path: &str) -> Vec<Account> {
        let url = format!("{}/{path}", self.base_url);
        let result: Result<AccountEnvelope> = async {
            let resp = self
                .http
                .get(&url)
                .bearer_auth(&self.token)
                .timeout(self.accounts_timeout)
                .send()
                .await?;
            if !resp.status().is_success() {
                return Err(BursarError::Upstream(format!(
                    "{path} returned {}",
                    resp.status()
                )));
            }
            Ok(resp.json::<AccountEnvelope>().await?)
        }
        .await;
        match result {
            Ok(envelope) => envelope.accounts,
            Err(e) => {
                warn!(pool = path, error = %e, "account pool fetch failed");
                Vec::new()
            }
        }
    }

    async fn fetch_page(
        &self,
        account_id: &str,
        cursor: Option<&str>,
        after: Option<&str>,
    ) -> Result<TransactionPage> {
        let url = format!("{}/account/{account_id}/transactions", self.base_url);
        let mut req = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .timeout(self.page_timeout)
            .query(&[("limit", PAGE_SIZE)]);
        if let Some(cursor) = cursor {
            req = req.query(&[("before", cursor)]);
        }
        if let Some(after) = after {
            req = req.query(&[("from", after)]);
        }
        let resp = req.send().await?;
        if !resp.status().is_success() {
            return Err(BursarError::Upstream(format!(
                "transactions page for {account_id} returned {}",
                resp.status()
            )));
        }
        Ok(resp.json::<TransactionPage>().await?)
    }
}

impl TransactionSource for MercuryClient {
    fn fetch_accounts(&self) -> impl Future<Output = Result<AccountDirectory>> + Send {
        async move {
            Ok(AccountDirectory {
                core: self.fetch_pool("accounts").await,
                credit: self.fetch_pool("credit").await,
                treasury: self.fetch_pool("treasury").await,
            })
        }
    }

    fn list_transactions(
        &self,
        account_id: &str,
        after: Option<DateTime<Utc>>,
    ) -> impl Future<Output = Result<Vec<RawTransaction>>> + Send {
        async move {
            let after_param = after.map(|a| store_timestamp(&a));
            let mut collected: Vec<RawTransaction> = Vec::new();
            let mut cursor: Option<String> = None;
            loop {
                let page = match self
                    .fetch_page(account_id, cursor.as_deref(), after_param.as_deref())
                    .await
                {
                    Ok(page) => page,
                    Err(e) => {
                        // Soft failure: keep whatever earlier pages yielded;
                        // the next scheduled cycle retries from scratch.
                        warn!(account = account_id, error = %e, "page fetch failed, returning partial result");
                        break;
                    }
                };
                if page.transactions.is_empty() {
                    break;
                }
                let last = page.transactions.last();
                let last_created = last.and_then(|t| t.created_at);
                let last_id = last.and_then(|t| t.id.clone());
                for mut tx in page.transactions {
                    tx.account_id = account_id.to_string();
                    collected.push(tx);
                }
                // Pages arrive reverse-chronological: once the tail of a page
                // is older than `after`, later pages are entirely out of range.
                if let (Some(after), Some(last_created)) = (after, last_created) {
                    if last_created < after {
                        break;
                    }
                }
                match last_id {
                    Some(id) => cursor = Some(id),
                    None => break,
                }
            }
            debug!(account = account_id, count = collected.len(), "transaction walk complete");
            Ok(collected)
        }
    }
}
