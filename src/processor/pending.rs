use std::collections::VecDeque;

use crate::{
    account::AccountStore,
    command::{AlertCommand, TransferCommand},
};

/// A validated transfer waiting for its source to hold enough funds.
#[derive(Debug)]
pub struct ParkedTransfer {
    pub command: TransferCommand,
    /// Private id resolved from the public destination at validation time.
    pub destination: String,
}

/// Parked transfers and alerts, both in arrival order.
#[derive(Debug, Default)]
pub struct PendingQueues {
    transfers: VecDeque<ParkedTransfer>,
    alerts: VecDeque<AlertCommand>,
}

impl PendingQueues {
    pub fn park_transfer(&mut self, mut command: TransferCommand, destination: String) {
        command.mark_parked();
        self.transfers.push_back(ParkedTransfer {
            command,
            destination,
        });
    }

    pub fn park_alert(&mut self, command: AlertCommand) {
        self.alerts.push_back(command);
    }

    /// Whether `source` already has a transfer waiting.
    pub fn has_outstanding_transfer(&self, source: &str) -> bool {
        self.transfers.iter().any(|p| p.command.source == source)
    }

    pub fn transfers(&self) -> impl Iterator<Item = &ParkedTransfer> {
        self.transfers.iter()
    }

    pub fn alerts(&self) -> impl Iterator<Item = &AlertCommand> {
        self.alerts.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.transfers.is_empty() && self.alerts.is_empty()
    }

    /// First parked transfer that the store can now cover.
    ///
    /// An entry whose source equals the previously inspected entry's source is
    /// skipped: nothing changed that sender's balance since that check, so the
    /// next distinct sender gets the slot instead.
    pub fn take_satisfiable_transfer(&mut self, store: &AccountStore) -> Option<ParkedTransfer> {
        let mut previous: Option<&str> = None;
        let mut found = None;
        for (idx, parked) in self.transfers.iter().enumerate() {
            let source = parked.command.source.as_str();
            if previous == Some(source) {
                continue;
            }
            if store
                .balance(source)
                .is_some_and(|balance| balance >= parked.command.amount)
            {
                found = Some(idx);
                break;
            }
            previous = Some(source);
        }
        found.and_then(|idx| self.transfers.remove(idx))
    }

    /// First parked alert whose account balance now exceeds its threshold.
    pub fn take_satisfiable_alert(&mut self, store: &AccountStore) -> Option<AlertCommand> {
        let idx = self.alerts.iter().position(|alert| {
            store
                .balance(&alert.private_id)
                .is_some_and(|balance| balance > alert.threshold)
        })?;
        self.alerts.remove(idx)
    }
}
