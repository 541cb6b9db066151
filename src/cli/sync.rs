use colored::Colorize;

use crate::config::Config;
use crate::error::Result;
use crate::mercury::MercuryClient;
use crate::store::TxnStore;
use crate::sync::{SyncEngine, SyncMode};

pub async fn run(cfg: Config, full: bool) -> Result<()> {
    if let Some(dir) = cfg.db_path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let store = TxnStore::new(cfg.db_path.clone());
    store.init().await?;
    let client = MercuryClient::from_config(&cfg)?;
    let engine = SyncEngine::new(client, store.clone());

    let mode = if full {
        engine.full_sync().await?;
        SyncMode::Full
    } else {
        engine.sync().await?
    };

    let rows = store.count().await?;
    let label = match mode {
        SyncMode::Full => "full sync",
        SyncMode::Incremental => "incremental sync",
    };
    println!("{} {label} complete, {rows} transactions cached", "✓".green());
    Ok(())
}
