use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};

use crate::config::Config;
use crate::error::Result;
use crate::fmt;
use crate::reports;
use crate::store::TxnStore;

/// Month summary over the cache only; run `backfill` first for months the
/// sync cadence has not covered.
pub async fn run(cfg: Config, month_arg: &str) -> Result<()> {
    let (year, month) = super::parse_month(month_arg)?;
    let store = TxnStore::new(cfg.db_path.clone());
    store.init().await?;

    let txs = store.query_by_month(year, month).await?;
    if txs.is_empty() {
        println!("No cached transactions for {year}-{month:02}. Try `bursar backfill --month {year}-{month:02}`.");
        return Ok(());
    }
    let summary = reports::summarize(&txs);

    println!("{}", format!("Summary for {year}-{month:02}").bold());
    println!("  transactions: {}", summary.count);
    println!("  inflow:  {}", fmt::money(summary.inflow).as_str().green());
    println!("  outflow: {}", fmt::money(summary.outflow).as_str().red());
    println!("  net:     {}", fmt::money(summary.net));

    if !summary.spend_by_category.is_empty() {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(["Category", "Spend"]);
        for bucket in &summary.spend_by_category {
            table.add_row([bucket.name.clone(), fmt::money(bucket.total)]);
        }
        println!("{table}");
    }
    Ok(())
}
