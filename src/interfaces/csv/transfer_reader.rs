use crate::domain::transfer::{AccountId, TransferRequest};
use crate::error::{Result, TransferError};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize)]
struct TransferRow {
    from: AccountId,
    to: AccountId,
    amount: Decimal,
}

impl From<TransferRow> for TransferRequest {
    fn from(row: TransferRow) -> Self {
        TransferRequest::new(row.from, row.to, row.amount)
    }
}

/// Reads transfer requests from a CSV source with a `from, to, amount` header.
///
/// Whitespace around fields is trimmed. Rows are validated later by the orchestrator, so a row
/// only fails here when it cannot be parsed at all.
pub struct TransferReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> TransferReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes transfer requests.
    pub fn requests(self) -> impl Iterator<Item = Result<TransferRequest>> {
        self.reader
            .into_deserialize::<TransferRow>()
            .map(|result| result.map(TransferRequest::from).map_err(TransferError::from))
    }
}
