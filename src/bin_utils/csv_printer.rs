use std::io::Write;

use anyhow::Context;
use serde::Serialize;

use crate::account::Balance;

#[derive(Debug, Serialize)]
pub struct AccountRow {
    pub account: String,
    pub balance: Balance,
}

/// Writes `account,balance` rows. The header is written even when there are
/// no accounts, so an empty ledger still yields valid CSV.
pub fn print_accounts<W>(
    output: &mut W,
    accounts: impl IntoIterator<Item = AccountRow>,
) -> anyhow::Result<()>
where
    W: Write,
{
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(output);
    writer
        .write_record(["account", "balance"])
        .context("Failed to write CSV header")?;
    for row in accounts {
        let account = row.account.clone();
        writer
            .serialize(row)
            .with_context(|| format!("Failed to write balance of `{account}`"))?;
    }
    writer.flush().context("Failed to flush balances")?;
    Ok(())
}
