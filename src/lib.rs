/// Account balances and the public -> private identity map.
pub mod account;

/// Request envelopes and their one-shot reply slots.
pub mod command;

/// Request processing: the in-memory processor with its pending queues, and
/// the serializer thread that feeds it one request at a time.
pub mod processor;

/// Blocking facade over the serializer. This is what callers normally use.
pub mod ledger;

/// CSV replay of ledger operations, used by the binary and integration tests.
pub mod bin_utils;

pub use ledger::{Ledger, LedgerConfig, LedgerError, Ticket};
