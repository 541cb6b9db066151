use colored::Colorize;

use crate::config::Config;
use crate::error::Result;
use crate::fmt;
use crate::mercury::MercuryClient;
use crate::store::TxnStore;
use crate::sync::SyncEngine;

pub async fn run(cfg: Config, month_arg: &str) -> Result<()> {
    let (year, month) = super::parse_month(month_arg)?;
    if let Some(dir) = cfg.db_path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let store = TxnStore::new(cfg.db_path.clone());
    store.init().await?;
    let client = MercuryClient::from_config(&cfg)?;
    let engine = SyncEngine::new(client, store);

    let fetched = engine.fetch_month_on_demand(year, month).await?;
    let total: f64 = fetched.iter().map(|t| t.amount.abs()).sum();
    println!(
        "{} cached {} transactions for {year}-{month:02} ({} gross)",
        "✓".green(),
        fetched.len(),
        fmt::money(total),
    );
    Ok(())
}
