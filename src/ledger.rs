use std::{io, thread::JoinHandle, time::Duration};

use thiserror::Error;

use crate::{
    account::Balance,
    command::{
        AlertCommand, CommandError, CreateCommand, Pending, QueryCommand, Request,
        TransferCommand, WaitError,
    },
    processor::{
        RequestError,
        in_memory_processor::InMemoryProcessor,
        serializer::{Inboxes, Serializer},
    },
};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(#[from] RequestError),
    #[error("Account `{0}` not found")]
    NotFound(String),
    #[error("Gave up waiting for the reply")]
    Timeout,
    #[error("Ledger serializer is not running")]
    Stopped,
}

impl From<WaitError> for LedgerError {
    fn from(err: WaitError) -> Self {
        match err {
            WaitError::Timeout => LedgerError::Timeout,
            WaitError::Disconnected => LedgerError::Stopped,
        }
    }
}

impl From<CommandError> for LedgerError {
    fn from(err: CommandError) -> Self {
        LedgerError::InvalidArgument(err.into())
    }
}

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Capacity of each request inbox, `None` for unbounded.
    pub inbox_capacity: Option<usize>,
    pub thread_name: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            inbox_capacity: None,
            thread_name: "ledger-serializer".to_string(),
        }
    }
}

/// Outstanding reply to a submitted request.
#[derive(Debug)]
pub struct Ticket<T> {
    pending: Pending<Result<T, RequestError>>,
    reject: fn(RequestError) -> LedgerError,
}

impl<T> Ticket<T> {
    fn new(pending: Pending<Result<T, RequestError>>) -> Self {
        Self {
            pending,
            reject: LedgerError::InvalidArgument,
        }
    }

    /// Blocks until the serializer answers. A parked request may never be
    /// answered, in which case this never returns.
    pub fn wait(self) -> Result<T, LedgerError> {
        self.pending.wait()?.map_err(self.reject)
    }

    /// Like [`Ticket::wait`], but gives up after `timeout` with
    /// [`LedgerError::Timeout`]. The request stays queued and the ticket can be
    /// waited on again.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<T, LedgerError> {
        self.pending.wait_timeout(timeout)?.map_err(self.reject)
    }
}

fn query_rejected(err: RequestError) -> LedgerError {
    match err {
        RequestError::CommandErr(CommandError::UnknownAccount(private_id)) => {
            LedgerError::NotFound(private_id)
        }
        err => LedgerError::InvalidArgument(err),
    }
}

fn require_identifier(value: &str, field: &'static str) -> Result<(), LedgerError> {
    if value.is_empty() {
        return Err(CommandError::EmptyIdentifier { field }.into());
    }
    Ok(())
}

/// Thread-safe handle to a ledger served by its own serializer thread.
///
/// Share it between threads by reference (`std::thread::scope`) or behind an
/// `Arc`. Dropping it lets the serializer drain what is already queued and
/// stop; requests still parked after that resolve to [`LedgerError::Stopped`].
pub struct Ledger {
    inboxes: Option<Inboxes>,
    serializer: Option<JoinHandle<InMemoryProcessor>>,
}

impl Ledger {
    pub fn new() -> io::Result<Self> {
        Self::with_config(LedgerConfig::default())
    }

    pub fn with_config(config: LedgerConfig) -> io::Result<Self> {
        let (serializer, inboxes) =
            Serializer::new(InMemoryProcessor::default(), config.inbox_capacity);
        let handle = serializer.spawn(config.thread_name)?;
        Ok(Self {
            inboxes: Some(inboxes),
            serializer: Some(handle),
        })
    }

    /// Registers a new account under both identifiers.
    pub fn create(
        &self,
        private_id: &str,
        public_id: &str,
        initial_balance: Balance,
    ) -> Result<(), LedgerError> {
        self.submit_create(private_id, public_id, initial_balance)?
            .wait()
    }

    /// Moves `amount` from the caller's account to the account published
    /// under `destination`. Blocks while the source cannot cover it, or while
    /// an earlier transfer from the same source is still waiting.
    pub fn transfer(
        &self,
        private_id: &str,
        destination: &str,
        amount: Balance,
    ) -> Result<(), LedgerError> {
        self.submit_transfer(private_id, destination, amount)?
            .wait()
    }

    pub fn balance_of(&self, private_id: &str) -> Result<Balance, LedgerError> {
        self.submit_balance_of(private_id)?.wait()
    }

    /// Blocks until the balance of the account is strictly above `threshold`.
    pub fn set_alert(&self, private_id: &str, threshold: Balance) -> Result<(), LedgerError> {
        self.submit_alert(private_id, threshold)?.wait()
    }

    pub fn submit_create(
        &self,
        private_id: &str,
        public_id: &str,
        initial_balance: Balance,
    ) -> Result<Ticket<()>, LedgerError> {
        require_identifier(private_id, "private id")?;
        require_identifier(public_id, "public id")?;
        let (command, pending) = CreateCommand::new(private_id, public_id, initial_balance);
        self.send(Request::Create(command))?;
        Ok(Ticket::new(pending))
    }

    pub fn submit_transfer(
        &self,
        private_id: &str,
        destination: &str,
        amount: Balance,
    ) -> Result<Ticket<()>, LedgerError> {
        require_identifier(private_id, "private id")?;
        require_identifier(destination, "destination")?;
        let (command, pending) = TransferCommand::new(private_id, destination, amount);
        self.send(Request::Transfer(command))?;
        Ok(Ticket::new(pending))
    }

    pub fn submit_balance_of(&self, private_id: &str) -> Result<Ticket<Balance>, LedgerError> {
        require_identifier(private_id, "private id")?;
        let (command, pending) = QueryCommand::new(private_id);
        self.send(Request::Query(command))?;
        Ok(Ticket {
            pending,
            reject: query_rejected,
        })
    }

    pub fn submit_alert(
        &self,
        private_id: &str,
        threshold: Balance,
    ) -> Result<Ticket<()>, LedgerError> {
        require_identifier(private_id, "private id")?;
        if threshold < 0 {
            return Err(CommandError::NegativeThreshold { threshold }.into());
        }
        let (command, pending) = AlertCommand::new(private_id, threshold);
        self.send(Request::Alert(command))?;
        Ok(Ticket::new(pending))
    }

    fn send(&self, request: Request) -> Result<(), LedgerError> {
        let inboxes = self.inboxes.as_ref().ok_or(LedgerError::Stopped)?;
        inboxes.submit(request).map_err(|_| LedgerError::Stopped)
    }
}

impl Drop for Ledger {
    fn drop(&mut self) {
        // disconnecting the inboxes is what stops the serializer loop
        self.inboxes.take();
        if let Some(handle) = self.serializer.take() {
            match handle.join() {
                Ok(processor) => {
                    let parked = processor.pending().transfers().count()
                        + processor.pending().alerts().count();
                    if parked > 0 {
                        tracing::info!(parked, "Ledger stopped with parked requests");
                    }
                }
                Err(_) => tracing::error!("Ledger serializer panicked"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::account::AccountError;

    use super::*;

    #[test]
    fn rejections_map_to_invalid_argument() {
        let ledger = Ledger::new().unwrap();
        ledger.create("p1", "A", 100).unwrap();

        let err = ledger.create("p1", "B", 5).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InvalidArgument(RequestError::AccountErr(
                AccountError::DuplicatePrivateId(_)
            ))
        ));
        assert_eq!(err.to_string(), "Invalid argument: Account `p1` already exists");

        let err = ledger.create("", "B", 5).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InvalidArgument(RequestError::CommandErr(
                CommandError::EmptyIdentifier { field: "private id" }
            ))
        ));

        let err = ledger.transfer("p1", "A", 1).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InvalidArgument(RequestError::CommandErr(CommandError::SelfTransfer(_)))
        ));

        let err = ledger.set_alert("p1", -1).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InvalidArgument(RequestError::CommandErr(
                CommandError::NegativeThreshold { threshold: -1 }
            ))
        ));
    }

    #[test]
    fn unknown_balance_is_not_found() {
        let ledger = Ledger::new().unwrap();
        let err = ledger.balance_of("ghost").unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(ref id) if id == "ghost"));

        // but an unknown source in a transfer is an invalid argument
        ledger.create("p1", "A", 0).unwrap();
        let err = ledger.transfer("ghost", "A", 1).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidArgument(_)));
    }

    #[test]
    fn ticket_timeout_does_not_cancel() {
        let ledger = Ledger::new().unwrap();
        ledger.create("p1", "A", 0).unwrap();
        ledger.create("p2", "B", 10).unwrap();

        let ticket = ledger.submit_transfer("p1", "B", 5).unwrap();
        let err = ticket.wait_timeout(Duration::from_millis(50)).unwrap_err();
        assert!(matches!(err, LedgerError::Timeout));

        ledger.transfer("p2", "A", 10).unwrap();
        ticket.wait().unwrap();
        assert_eq!(ledger.balance_of("p1").unwrap(), 5);
        assert_eq!(ledger.balance_of("p2").unwrap(), 5);
    }

    #[test]
    fn ticket_is_stopped_when_ledger_drops() {
        let ledger = Ledger::with_config(LedgerConfig {
            inbox_capacity: Some(4),
            ..Default::default()
        })
        .unwrap();
        ledger.create("p1", "A", 1).unwrap();
        // served after the drop and parked; parked requests die with the serializer
        let ticket = ledger.submit_alert("p1", 1).unwrap();
        drop(ledger);
        assert!(matches!(ticket.wait().unwrap_err(), LedgerError::Stopped));
    }

    #[test]
    fn queued_tickets_are_answered_after_drop() {
        let ledger = Ledger::new().unwrap();
        let tickets: Vec<_> = (0..50)
            .map(|idx| {
                ledger
                    .submit_create(&format!("p{idx}"), &format!("P{idx}"), idx)
                    .unwrap()
            })
            .collect();
        drop(ledger);
        for ticket in tickets {
            ticket.wait().unwrap();
        }
    }
}
