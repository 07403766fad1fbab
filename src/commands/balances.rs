//! Show remaining credential balances from the ledger.

use anyhow::Result;

use crate::config::{self, PoolscribeConfig};
use crate::pool::Ledger;

/// Handles the `balances` command.
///
/// Reads configured credentials and their durable balances straight from the
/// ledger, without building a pool, so nothing transitions state.
///
/// # Errors
/// - If the configuration or ledger cannot be read
pub fn handle_balances() -> Result<()> {
    let config = PoolscribeConfig::load_or_default()?;
    let data_dir = config::data_dir()?;
    let ledger = Ledger::open(&data_dir)?;

    // Seed so freshly configured credentials show up before their first job.
    for credential in &config.credentials {
        ledger.seed(&credential.id, credential.initial_balance)?;
    }

    let balances = ledger.balances()?;
    if balances.is_empty() {
        println!("No credentials configured.");
        return Ok(());
    }

    let mut total = 0.0;
    for (id, balance) in &balances {
        println!("{id:<24} ${balance:.4}");
        total += balance;
    }
    println!("{:<24} ${total:.4}", "total");

    Ok(())
}
