use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;

/// Which upstream pool an account was listed under. Treasury accounts are
/// balance-only; transaction sync covers core and credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountPool {
    Core,
    Credit,
    Treasury,
}

impl AccountPool {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::Credit => "credit",
            Self::Treasury => "treasury",
        }
    }
}

impl std::fmt::Display for AccountPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account record as returned by the accounts/credit/treasury endpoints.
/// Accounts are never persisted; they are re-fetched every cycle.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub current_balance: Option<f64>,
    #[serde(default)]
    pub available_balance: Option<f64>,
}

impl Account {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.nickname.as_deref())
            .unwrap_or("Unnamed")
    }
}

/// The three account pools, fetched together. `sync_targets` yields the
/// accounts whose transactions are synchronized (core + credit, in that
/// order); treasury is deliberately absent from it.
#[derive(Debug, Clone, Default)]
pub struct AccountDirectory {
    pub core: Vec<Account>,
    pub credit: Vec<Account>,
    pub treasury: Vec<Account>,
}

impl AccountDirectory {
    pub fn sync_targets(&self) -> impl Iterator<Item = (AccountPool, &Account)> {
        self.core
            .iter()
            .map(|a| (AccountPool::Core, a))
            .chain(self.credit.iter().map(|a| (AccountPool::Credit, a)))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDetails {
    #[serde(default)]
    pub merchant_name: Option<String>,
}

/// Transaction record exactly as the upstream API returns it. Everything is
/// optional: records missing `id` or `createdAt` are dropped at
/// normalization and never reach the store or the notification feed.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub merchant_name: Option<String>,
    #[serde(default)]
    pub counterparty_name: Option<String>,
    #[serde(default)]
    pub bank_description: Option<String>,
    #[serde(default)]
    pub mercury_category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub card_details: Option<CardDetails>,
    /// Tagged by the fetch layer; upstream records may omit it.
    #[serde(skip)]
    pub account_id: String,
}

impl RawTransaction {
    /// Priority fallback chain for the display/cooldown vendor label. Used
    /// everywhere a vendor name is needed so the derivation never diverges.
    pub fn vendor_name(&self) -> String {
        self.merchant_name
            .as_deref()
            .or(self.counterparty_name.as_deref())
            .or(self.bank_description.as_deref())
            .or(self
                .card_details
                .as_ref()
                .and_then(|c| c.merchant_name.as_deref()))
            .or(self.description.as_deref())
            .unwrap_or("Unknown Vendor")
            .to_string()
    }
}

/// Credit/debit classification. `kind` substrings are authoritative; the
/// amount sign only breaks ties when `kind` names neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Credit,
    Debit,
}

/// Normalized transaction, the unit stored and deduplicated. `kind` is
/// lower-cased at ingestion; `vendor_name` is the derived label.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: String,
    pub account_id: String,
    pub created_at: DateTime<Utc>,
    pub amount: f64,
    pub kind: String,
    pub vendor_name: String,
    pub counterparty_name: Option<String>,
    pub bank_description: Option<String>,
    pub category: Option<String>,
}

impl Transaction {
    /// Returns `None` when the record lacks an identity (`id`) or a
    /// timestamp (`createdAt`) and therefore cannot be stored or tracked.
    pub fn from_raw(raw: RawTransaction) -> Option<Self> {
        let id = raw.id.clone()?;
        let created_at = raw.created_at?;
        let vendor_name = raw.vendor_name();
        Some(Self {
            id,
            account_id: raw.account_id,
            created_at,
            amount: raw.amount.unwrap_or(0.0),
            kind: raw.kind.unwrap_or_default().to_lowercase(),
            vendor_name,
            counterparty_name: raw.counterparty_name,
            bank_description: raw.bank_description,
            category: raw.mercury_category,
        })
    }

    pub fn flow(&self) -> Flow {
        if self.kind.contains("credit") {
            Flow::Credit
        } else if self.kind.contains("debit") {
            Flow::Debit
        } else if self.amount >= 0.0 {
            Flow::Credit
        } else {
            Flow::Debit
        }
    }

    pub fn category_label(&self) -> &str {
        self.category.as_deref().unwrap_or("uncategorized")
    }
}

/// Fixed-width UTC timestamp used in the store, chosen so that lexicographic
/// order over the stored strings equals chronological order.
pub fn store_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}
