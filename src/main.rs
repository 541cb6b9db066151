mod cli;
mod config;
mod db;
mod error;
mod fmt;
mod mercury;
mod models;
mod monitor;
mod notify;
mod reports;
mod settings;
mod store;
mod sync;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, NotifyCommands};
use config::Config;

fn init_tracing() {
    let filter = EnvFilter::try_from_env("BURSAR_LOG")
        .unwrap_or_else(|_| EnvFilter::new("bursar=info,warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = Config::load(
        cli.db.clone(),
        cli.base_url.clone(),
        cli.accounts_timeout,
        cli.page_timeout,
        cli.poll_interval,
        cli.sync_interval,
    );

    let result = match cli.command {
        Commands::Serve => cli::serve::run(cfg).await,
        Commands::Sync { full } => cli::sync::run(cfg, full).await,
        Commands::Backfill { month } => cli::backfill::run(cfg, &month).await,
        Commands::Vendor { pattern, month } => {
            cli::vendor::run(cfg, &pattern, month.as_deref()).await
        }
        Commands::Report { month } => cli::report::run(cfg, &month).await,
        Commands::Balances => cli::balances::run(cfg).await,
        Commands::Notify { command } => match command {
            NotifyCommands::Show => cli::notify::show(),
            NotifyCommands::Set { key, value } => cli::notify::set(&key, &value),
            NotifyCommands::Toggle => cli::notify::toggle(),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
    Ok(())
}
