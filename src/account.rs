use std::collections::HashMap;

use thiserror::Error;

pub type Balance = i64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountError {
    #[error("Initial balance must not be negative, got {balance}")]
    NegativeBalance { balance: Balance },
    #[error("Account `{0}` already exists")]
    DuplicatePrivateId(String),
    #[error("Public identity `{0}` is already registered")]
    DuplicatePublicId(String),
    #[error("Initial balance {balance} would overflow the total supply")]
    SupplyOverflow { balance: Balance },
}

/// Balances keyed by private id, plus the public -> private identity map.
///
/// The store does not lock anything: it is owned by exactly one processor and
/// only ever mutated from the serializer thread.
#[derive(Debug, Default)]
pub struct AccountStore {
    balances: HashMap<String, Balance>,
    identities: HashMap<String, String>,
    total_supply: Balance,
}

impl AccountStore {
    /// Registers both identifiers and the initial balance, or nothing at all.
    pub fn create(
        &mut self,
        private_id: &str,
        public_id: &str,
        balance: Balance,
    ) -> Result<(), AccountError> {
        if balance < 0 {
            return Err(AccountError::NegativeBalance { balance });
        }
        if self.balances.contains_key(private_id) {
            return Err(AccountError::DuplicatePrivateId(private_id.to_owned()));
        }
        if self.identities.contains_key(public_id) {
            return Err(AccountError::DuplicatePublicId(public_id.to_owned()));
        }
        let Some(total_supply) = self.total_supply.checked_add(balance) else {
            return Err(AccountError::SupplyOverflow { balance });
        };

        self.total_supply = total_supply;
        self.balances.insert(private_id.to_owned(), balance);
        self.identities
            .insert(public_id.to_owned(), private_id.to_owned());
        Ok(())
    }

    pub fn balance(&self, private_id: &str) -> Option<Balance> {
        self.balances.get(private_id).copied()
    }

    pub fn contains(&self, private_id: &str) -> bool {
        self.balances.contains_key(private_id)
    }

    /// Private id behind a public identity.
    pub fn resolve(&self, public_id: &str) -> Option<&str> {
        self.identities.get(public_id).map(String::as_str)
    }

    pub fn total_supply(&self) -> Balance {
        self.total_supply
    }

    pub fn len(&self) -> usize {
        self.balances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Balance)> {
        self.balances
            .iter()
            .map(|(private_id, balance)| (private_id.as_str(), *balance))
    }

    /// Moves `amount` from one account to the other.
    ///
    /// Sufficiency and existence are validated by the caller beforehand, so a
    /// missing account here is a no-op rather than an error.
    pub(crate) fn move_funds(&mut self, from: &str, to: &str, amount: Balance) {
        self.debit(from, amount);
        self.credit(to, amount);
    }

    fn debit(&mut self, private_id: &str, amount: Balance) {
        if let Some(balance) = self.balances.get_mut(private_id) {
            debug_assert!(*balance >= amount, "debit below zero for `{private_id}`");
            *balance -= amount;
        }
    }

    fn credit(&mut self, private_id: &str, amount: Balance) {
        // cannot overflow: every balance is bounded by the total supply
        if let Some(balance) = self.balances.get_mut(private_id) {
            *balance += amount;
        }
    }
}
