use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, bounded};
use thiserror::Error;

use crate::{account::Balance, processor::RequestError};

/// What the serializer writes back for create, transfer and alert requests.
pub type Reply = Result<(), RequestError>;

/// What the serializer writes back for balance queries.
pub type QueryReply = Result<Balance, RequestError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Create,
    Query,
    Transfer,
    Alert,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("{field} must not be empty")]
    EmptyIdentifier { field: &'static str },
    #[error("Transfer amount must be positive, got {amount}")]
    NonPositiveAmount { amount: Balance },
    #[error("Alert threshold must not be negative, got {threshold}")]
    NegativeThreshold { threshold: Balance },
    #[error("Account `{0}` does not exist")]
    UnknownAccount(String),
    #[error("No account is registered under public identity `{0}`")]
    UnknownDestination(String),
    #[error("Account `{0}` cannot transfer to itself")]
    SelfTransfer(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WaitError {
    #[error("Reply did not arrive in time")]
    Timeout,
    #[error("Reply slot was dropped before being fulfilled")]
    Disconnected,
}

/// Write side of a one-shot reply.
///
/// `fulfill` consumes the slot, so a reply can be written at most once.
#[derive(Debug)]
pub struct ReplySlot<T> {
    tx: Sender<T>,
}

/// Read side of a one-shot reply, held by the caller that sent the request.
#[derive(Debug)]
pub struct Pending<T> {
    rx: Receiver<T>,
}

pub fn reply_slot<T>() -> (ReplySlot<T>, Pending<T>) {
    // capacity one: fulfilling never blocks the serializer
    let (tx, rx) = bounded(1);
    (ReplySlot { tx }, Pending { rx })
}

impl<T> ReplySlot<T> {
    /// Returns `false` if the caller stopped waiting; the value is dropped.
    pub fn fulfill(self, value: T) -> bool {
        if self.tx.send(value).is_err() {
            tracing::warn!("Caller stopped waiting, reply discarded");
            return false;
        }
        true
    }
}

impl<T> Pending<T> {
    /// Blocks until the reply is written.
    pub fn wait(self) -> Result<T, WaitError> {
        self.rx.recv().map_err(|_| WaitError::Disconnected)
    }

    /// Stops waiting after `timeout`. The request itself is not cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<T, WaitError> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => WaitError::Timeout,
            RecvTimeoutError::Disconnected => WaitError::Disconnected,
        })
    }

    /// Non-blocking peek; `Ok(None)` means not answered yet.
    pub fn try_take(&self) -> Result<Option<T>, WaitError> {
        match self.rx.try_recv() {
            Ok(value) => Ok(Some(value)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(WaitError::Disconnected),
        }
    }
}

#[derive(Debug)]
pub struct CreateCommand {
    pub private_id: String,
    pub public_id: String,
    pub balance: Balance,
    pub reply: ReplySlot<Reply>,
}

#[derive(Debug)]
pub struct QueryCommand {
    pub private_id: String,
    pub reply: ReplySlot<QueryReply>,
}

#[derive(Debug)]
pub struct TransferCommand {
    pub source: String,
    /// Public identity of the receiving account.
    pub destination: String,
    pub amount: Balance,
    pub reply: ReplySlot<Reply>,
    parked: bool,
}

#[derive(Debug)]
pub struct AlertCommand {
    pub private_id: String,
    pub threshold: Balance,
    pub reply: ReplySlot<Reply>,
}

impl CreateCommand {
    pub fn new(
        private_id: impl Into<String>,
        public_id: impl Into<String>,
        balance: Balance,
    ) -> (Self, Pending<Reply>) {
        let (reply, pending) = reply_slot();
        let command = Self {
            private_id: private_id.into(),
            public_id: public_id.into(),
            balance,
            reply,
        };
        (command, pending)
    }
}

impl QueryCommand {
    pub fn new(private_id: impl Into<String>) -> (Self, Pending<QueryReply>) {
        let (reply, pending) = reply_slot();
        let command = Self {
            private_id: private_id.into(),
            reply,
        };
        (command, pending)
    }
}

impl TransferCommand {
    pub fn new(
        source: impl Into<String>,
        destination: impl Into<String>,
        amount: Balance,
    ) -> (Self, Pending<Reply>) {
        let (reply, pending) = reply_slot();
        let command = Self {
            source: source.into(),
            destination: destination.into(),
            amount,
            reply,
            parked: false,
        };
        (command, pending)
    }

    pub fn is_parked(&self) -> bool {
        self.parked
    }

    pub(crate) fn mark_parked(&mut self) {
        self.parked = true;
    }
}

impl AlertCommand {
    pub fn new(private_id: impl Into<String>, threshold: Balance) -> (Self, Pending<Reply>) {
        let (reply, pending) = reply_slot();
        let command = Self {
            private_id: private_id.into(),
            threshold,
            reply,
        };
        (command, pending)
    }
}

/// One envelope, as taken from whichever inbox the serializer selected.
#[derive(Debug)]
pub enum Request {
    Create(CreateCommand),
    Query(QueryCommand),
    Transfer(TransferCommand),
    Alert(AlertCommand),
}

impl Request {
    pub fn kind(&self) -> RequestKind {
        match self {
            Request::Create(_) => RequestKind::Create,
            Request::Query(_) => RequestKind::Query,
            Request::Transfer(_) => RequestKind::Transfer,
            Request::Alert(_) => RequestKind::Alert,
        }
    }
}
