use crate::application::batch::BatchItemResult;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
struct OutcomeRow<'a> {
    transfer_id: &'a str,
    status: String,
    message: String,
}

/// Writes batch results as CSV rows of `transfer_id, status, message`.
///
/// Items rejected before reaching the ledger have an empty transfer id and status `REJECTED`.
pub struct OutcomeWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> OutcomeWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_results<'a>(
        &mut self,
        results: impl IntoIterator<Item = &'a BatchItemResult>,
    ) -> Result<()> {
        for result in results {
            let row = match result {
                Ok(outcome) => OutcomeRow {
                    transfer_id: &outcome.transfer_id,
                    status: outcome.status.to_string(),
                    message: outcome.message.clone(),
                },
                Err(e) => OutcomeRow {
                    transfer_id: "",
                    status: "REJECTED".to_string(),
                    message: e.to_string(),
                },
            };
            self.writer.serialize(row)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
