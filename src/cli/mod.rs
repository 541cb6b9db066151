pub mod backfill;
pub mod balances;
pub mod notify;
pub mod report;
pub mod serve;
pub mod sync;
pub mod vendor;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::error::{BursarError, Result};

#[derive(Parser)]
#[command(name = "bursar", about = "Mercury transaction sync, cache, and alerting daemon.")]
pub struct Cli {
    /// Path to the SQLite cache (default: platform data dir)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Upstream API base URL
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Timeout for account listing requests, in seconds
    #[arg(long, global = true, default_value_t = 20)]
    pub accounts_timeout: u64,

    /// Timeout for a single transaction page request, in seconds
    #[arg(long, global = true, default_value_t = 30)]
    pub page_timeout: u64,

    /// Notification poll cadence, in seconds
    #[arg(long, global = true, default_value_t = 60)]
    pub poll_interval: u64,

    /// Sync cycle cadence, in seconds
    #[arg(long, global = true, default_value_t = 86_400)]
    pub sync_interval: u64,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the daemon: periodic sync plus the notification poll loop.
    Serve,
    /// One-shot sync: full when the cache is empty, incremental otherwise.
    Sync {
        /// Force a complete backfill
        #[arg(long)]
        full: bool,
    },
    /// Fetch and cache one historical month.
    Backfill {
        /// Month to fetch, as YYYY-MM
        #[arg(long)]
        month: String,
    },
    /// Spend for a vendor substring, optionally restricted to one month.
    Vendor {
        /// Substring matched against vendor, counterparty, and description
        pattern: String,
        /// Month filter, as YYYY-MM
        #[arg(long)]
        month: Option<String>,
    },
    /// Cached month summary: inflow, outflow, spend by category.
    Report {
        /// Month to summarize, as YYYY-MM
        #[arg(long)]
        month: String,
    },
    /// Current balances for all account pools, treasury included.
    Balances,
    /// Inspect or change notification settings.
    Notify {
        #[command(subcommand)]
        command: NotifyCommands,
    },
}

#[derive(Subcommand)]
pub enum NotifyCommands {
    /// Print the current settings.
    Show,
    /// Change one setting and save immediately.
    Set { key: String, value: String },
    /// Flip notifications on or off.
    Toggle,
}

pub(crate) fn parse_month(raw: &str) -> Result<(i32, u32)> {
    let parts: Vec<&str> = raw.split('-').collect();
    if parts.len() == 2 {
        if let (Ok(year), Ok(month)) = (parts[0].parse::<i32>(), parts[1].parse::<u32>()) {
            if (1..=12).contains(&month) {
                return Ok((year, month));
            }
        }
    }
    Err(BursarError::Other(format!("expected YYYY-MM, got: {raw}")))
}
