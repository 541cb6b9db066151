use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};

use crate::config::Config;
use crate::error::Result;
use crate::fmt;
use crate::mercury::MercuryClient;
use crate::store::TxnStore;
use crate::sync::SyncEngine;

pub async fn run(cfg: Config, pattern: &str, month_arg: Option<&str>) -> Result<()> {
    let month = month_arg.map(super::parse_month).transpose()?;
    if let Some(dir) = cfg.db_path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let store = TxnStore::new(cfg.db_path.clone());
    store.init().await?;
    let client = MercuryClient::from_config(&cfg)?;
    let engine = SyncEngine::new(client, store);

    let (rows, total) = engine.vendor_spend(pattern, month).await?;
    if rows.is_empty() {
        let scope = match month {
            Some((y, m)) => format!(" in {y}-{m:02}"),
            None => String::new(),
        };
        println!("No transactions matching '{pattern}'{scope}.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(["Date", "Vendor", "Account", "Amount"]);
    for tx in &rows {
        table.add_row([
            fmt::short_date(&tx.created_at),
            tx.vendor_name.clone(),
            tx.account_id.clone(),
            fmt::money(tx.amount),
        ]);
    }
    println!("{table}");
    let total = fmt::money(total);
    println!("Total for '{pattern}': {}", total.as_str().bold());
    Ok(())
}
