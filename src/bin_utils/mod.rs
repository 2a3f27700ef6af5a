//! Replays a CSV list of ledger operations against a fresh [`Ledger`] and
//! prints the final balance of every account the input created.

use std::{
    io::{Read, Write},
    time::Duration,
};

use anyhow::{Context, Result};
use csv_parser::{CsvOperationParser, Operation, OperationKind};
use csv_printer::{AccountRow, print_accounts};

use crate::ledger::{Ledger, LedgerError, Ticket};

pub mod csv_parser;
pub mod csv_printer;

pub const DEFAULT_SETTLE: Duration = Duration::from_millis(100);

pub struct Service<'w, R, W: 'w> {
    pub input: R,
    pub output: &'w mut W,
    /// How long to wait for a transfer or alert before treating it as parked.
    pub settle: Duration,
    pub error_printer: Box<dyn FnMut(u64, LedgerError)>,
}

impl<'w, R, W> Service<'w, R, W>
where
    R: Read,
    W: Write + 'w,
{
    pub fn run(mut self) -> Result<()> {
        let parser =
            CsvOperationParser::new(self.input).context("Failed to read the CSV header")?;
        let ledger = Ledger::new().context("Failed to start the ledger serializer")?;

        let mut accounts: Vec<String> = Vec::new();
        let mut parked: Vec<(u64, Ticket<()>)> = Vec::new();

        for (line, row) in parser {
            let row = row.with_context(|| format!("Malformed record at line {line}"))?;
            let result = match row.op {
                OperationKind::Create => {
                    if !accounts.contains(&row.account) {
                        accounts.push(row.account.clone());
                    }
                    ledger.create(&row.account, target(&row), amount(&row))
                }
                OperationKind::Balance => ledger.balance_of(&row.account).map(|balance| {
                    tracing::info!(line, account = %row.account, balance, "balance");
                }),
                OperationKind::Transfer => ledger
                    .submit_transfer(&row.account, target(&row), amount(&row))
                    .and_then(|ticket| settle(line, ticket, self.settle, &mut parked)),
                OperationKind::Alert => ledger
                    .submit_alert(&row.account, amount(&row))
                    .and_then(|ticket| settle(line, ticket, self.settle, &mut parked)),
            };
            if let Err(err) = result {
                (self.error_printer)(line, err);
            }
        }

        for (line, ticket) in parked {
            if let Err(err) = ticket.wait_timeout(self.settle) {
                (self.error_printer)(line, err);
            }
        }

        let mut rows = Vec::with_capacity(accounts.len());
        for account in accounts {
            match ledger.balance_of(&account) {
                Ok(balance) => rows.push(AccountRow { account, balance }),
                // the create for it was rejected
                Err(LedgerError::NotFound(_)) => {}
                Err(err) => return Err(err).context("Failed to read final balances"),
            }
        }
        print_accounts(self.output, rows)
    }
}

fn target(row: &Operation) -> &str {
    row.target.as_deref().unwrap_or_default()
}

fn amount(row: &Operation) -> i64 {
    row.amount.unwrap_or_default()
}

/// Waits briefly for the reply; a request still unanswered after that is kept
/// for a final check once the input is exhausted.
fn settle(
    line: u64,
    ticket: Ticket<()>,
    timeout: Duration,
    parked: &mut Vec<(u64, Ticket<()>)>,
) -> Result<(), LedgerError> {
    match ticket.wait_timeout(timeout) {
        Err(LedgerError::Timeout) => {
            tracing::debug!(line, "request parked");
            parked.push((line, ticket));
            Ok(())
        }
        result => result,
    }
}
