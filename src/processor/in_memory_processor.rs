use crate::{
    account::AccountStore,
    command::{
        AlertCommand, CommandError, CreateCommand, QueryCommand, QueryReply, Request,
        TransferCommand,
    },
};

use super::{
    RequestError, RequestProcessor,
    pending::{ParkedTransfer, PendingQueues},
};

/// Owns the ledger state. Every mutation goes through [`RequestProcessor::process`].
#[derive(Debug, Default)]
pub struct InMemoryProcessor {
    store: AccountStore,
    pending: PendingQueues,
}

impl RequestProcessor for InMemoryProcessor {
    fn process(&mut self, request: Request) {
        match request {
            Request::Create(command) => self.handle_create(command),
            Request::Query(command) => self.handle_query(command),
            Request::Transfer(command) => self.handle_transfer(command),
            Request::Alert(command) => self.handle_alert(command),
        }
    }
}

impl InMemoryProcessor {
    pub fn store(&self) -> &AccountStore {
        &self.store
    }

    pub fn pending(&self) -> &PendingQueues {
        &self.pending
    }

    fn handle_create(&mut self, command: CreateCommand) {
        let CreateCommand {
            private_id,
            public_id,
            balance,
            reply,
        } = command;
        match self.store.create(&private_id, &public_id, balance) {
            Ok(()) => {
                tracing::debug!(%private_id, %public_id, balance, "account created");
                reply.fulfill(Ok(()));
                self.unblock();
            }
            Err(err) => {
                tracing::debug!(%private_id, %public_id, "create rejected: {err}");
                reply.fulfill(Err(err.into()));
            }
        }
    }

    fn handle_query(&mut self, command: QueryCommand) {
        let result: QueryReply = self
            .store
            .balance(&command.private_id)
            .ok_or_else(|| CommandError::UnknownAccount(command.private_id.clone()).into());
        command.reply.fulfill(result);
    }

    fn handle_transfer(&mut self, command: TransferCommand) {
        let destination = match self.validate_transfer(&command) {
            Ok(destination) => destination,
            Err(err) => {
                tracing::debug!(source = %command.source, "transfer rejected: {err}");
                command.reply.fulfill(Err(err));
                return;
            }
        };

        let insufficient = self
            .store
            .balance(&command.source)
            .is_none_or(|balance| balance < command.amount);
        if insufficient || self.pending.has_outstanding_transfer(&command.source) {
            tracing::debug!(
                source = %command.source,
                amount = command.amount,
                insufficient,
                "transfer parked"
            );
            self.pending.park_transfer(command, destination);
            return;
        }

        self.commit_transfer(ParkedTransfer {
            command,
            destination,
        });
        self.unblock();
    }

    /// Resolves the destination private id of a well-formed transfer.
    fn validate_transfer(&self, command: &TransferCommand) -> Result<String, RequestError> {
        if command.amount <= 0 {
            return Err(CommandError::NonPositiveAmount {
                amount: command.amount,
            }
            .into());
        }
        if !self.store.contains(&command.source) {
            return Err(CommandError::UnknownAccount(command.source.clone()).into());
        }
        let Some(destination) = self.store.resolve(&command.destination) else {
            return Err(CommandError::UnknownDestination(command.destination.clone()).into());
        };
        if destination == command.source {
            return Err(CommandError::SelfTransfer(command.source.clone()).into());
        }
        Ok(destination.to_owned())
    }

    fn handle_alert(&mut self, command: AlertCommand) {
        if command.threshold < 0 {
            let err = CommandError::NegativeThreshold {
                threshold: command.threshold,
            };
            command.reply.fulfill(Err(err.into()));
            return;
        }
        let Some(balance) = self.store.balance(&command.private_id) else {
            let err = CommandError::UnknownAccount(command.private_id.clone());
            command.reply.fulfill(Err(err.into()));
            return;
        };

        if balance > command.threshold {
            tracing::debug!(private_id = %command.private_id, balance, "alert fired on arrival");
            command.reply.fulfill(Ok(()));
            self.unblock();
        } else {
            tracing::debug!(
                private_id = %command.private_id,
                threshold = command.threshold,
                "alert parked"
            );
            self.pending.park_alert(command);
        }
    }

    fn commit_transfer(&mut self, transfer: ParkedTransfer) {
        let ParkedTransfer {
            command,
            destination,
        } = transfer;
        self.store
            .move_funds(&command.source, &destination, command.amount);
        tracing::debug!(
            source = %command.source,
            %destination,
            amount = command.amount,
            "transfer committed"
        );
        command.reply.fulfill(Ok(()));
    }

    /// Settles parked requests until a full scan changes nothing.
    ///
    /// Each round settles at most one transfer, or, if none was payable, at
    /// most one alert.
    fn unblock(&mut self) {
        let mut rounds = 0usize;
        loop {
            if let Some(transfer) = self.pending.take_satisfiable_transfer(&self.store) {
                self.commit_transfer(transfer);
            } else if let Some(alert) = self.pending.take_satisfiable_alert(&self.store) {
                tracing::debug!(private_id = %alert.private_id, "parked alert fired");
                alert.reply.fulfill(Ok(()));
            } else {
                break;
            }
            rounds += 1;
        }
        tracing::trace!(rounds, "unblocking pass finished");
    }
}
