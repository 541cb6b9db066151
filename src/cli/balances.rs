use comfy_table::{presets::UTF8_FULL, Table};

use crate::config::Config;
use crate::error::Result;
use crate::fmt;
use crate::mercury::{MercuryClient, TransactionSource};
use crate::models::{Account, AccountPool};

pub async fn run(cfg: Config) -> Result<()> {
    let client = MercuryClient::from_config(&cfg)?;
    let directory = client.fetch_accounts().await?;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(["Account", "Pool", "Balance", "Available"]);
    let mut add_rows = |pool: AccountPool, accounts: &[Account]| {
        for account in accounts {
            table.add_row([
                account.display_name().to_string(),
                pool.to_string(),
                account.current_balance.map(fmt::money).unwrap_or_default(),
                account.available_balance.map(fmt::money).unwrap_or_default(),
            ]);
        }
    };
    add_rows(AccountPool::Core, &directory.core);
    add_rows(AccountPool::Credit, &directory.credit);
    add_rows(AccountPool::Treasury, &directory.treasury);
    println!("{table}");

    let total: f64 = directory
        .core
        .iter()
        .chain(directory.treasury.iter())
        .filter_map(|a| a.current_balance)
        .sum();
    println!("Total cash (core + treasury): {}", fmt::money(total));
    Ok(())
}
