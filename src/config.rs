use std::path::PathBuf;
use std::time::Duration;

use crate::error::{BursarError, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.mercury.com/api/v1";
pub const TOKEN_ENV: &str = "MERCURY_API_TOKEN";

/// Process configuration. The bearer token only ever comes from the
/// environment; everything else has a CLI flag with a default.
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub api_token: Option<String>,
    pub db_path: PathBuf,
    /// Timeout for the three account-pool listing requests.
    pub accounts_timeout: Duration,
    /// Timeout for a single transaction page request.
    pub page_timeout: Duration,
    /// Notification poll cadence.
    pub poll_interval: Duration,
    /// Full/incremental sync cadence.
    pub sync_interval: Duration,
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bursar")
        .join("transactions.db")
}

impl Config {
    pub fn load(
        db: Option<PathBuf>,
        base_url: Option<String>,
        accounts_timeout_secs: u64,
        page_timeout_secs: u64,
        poll_interval_secs: u64,
        sync_interval_secs: u64,
    ) -> Self {
        Self {
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_token: std::env::var(TOKEN_ENV).ok().filter(|t| !t.trim().is_empty()),
            db_path: db.unwrap_or_else(default_db_path),
            accounts_timeout: Duration::from_secs(accounts_timeout_secs),
            page_timeout: Duration::from_secs(page_timeout_secs),
            poll_interval: Duration::from_secs(poll_interval_secs),
            sync_interval: Duration::from_secs(sync_interval_secs),
        }
    }

    /// Commands that talk to the upstream API need a credential; cache-only
    /// commands never call this.
    pub fn require_token(&self) -> Result<&str> {
        self.api_token
            .as_deref()
            .ok_or_else(|| BursarError::Settings(format!("{TOKEN_ENV} is not set")))
    }
}
