use thiserror::Error;

use crate::{account::AccountError, command::CommandError, command::Request};

pub mod in_memory_processor;
pub mod pending;
pub mod serializer;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error(transparent)]
    CommandErr(#[from] CommandError),
    #[error(transparent)]
    AccountErr(#[from] AccountError),
}

pub trait RequestProcessor {
    /// Handles one envelope to completion: it is either answered, or parked
    /// until some later commit makes it satisfiable.
    fn process(&mut self, request: Request);
}
