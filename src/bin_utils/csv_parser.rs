use std::io::Read;

use csv::{DeserializeRecordsIntoIter, Trim};
use serde::Deserialize;

use crate::account::Balance;

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Transfer,
    Balance,
    Alert,
}

/// One ledger call. `target` is the public id for `create` and the
/// destination for `transfer`; `amount` is the initial balance, the transfer
/// amount or the alert threshold.
#[derive(Debug, Deserialize)]
pub struct Operation {
    pub op: OperationKind,
    pub account: String,
    pub target: Option<String>,
    pub amount: Option<Balance>,
}

/// Parses an operation list in CSV format, yielding each record with the line
/// it started on.
pub struct CsvOperationParser<R> {
    iter: DeserializeRecordsIntoIter<R, Operation>,
}

impl<R> CsvOperationParser<R>
where
    R: Read,
{
    /// Reads the header line up front, so records report their own line and
    /// a broken header fails here instead of on the first record.
    pub fn new(source: R) -> csv::Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(source);
        reader.headers()?;

        Ok(Self {
            iter: reader.into_deserialize(),
        })
    }
}

impl<R> Iterator for CsvOperationParser<R>
where
    R: Read,
{
    type Item = (u64, csv::Result<Operation>);

    fn next(&mut self) -> Option<Self::Item> {
        let curr_line = self.iter.reader().position().line();
        self.iter.next().map(|row| (curr_line, row))
    }
}
