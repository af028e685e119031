use super::orchestrator::{IDEMPOTENT_REPLAY, TransferOrchestrator};
use crate::domain::idempotency::derive_item_key;
use crate::domain::transfer::{TransferOutcome, TransferRequest};
use crate::error::{Result, TransferError};
use futures::future::join_all;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use tracing::{error, info};

/// Largest batch accepted in one submission.
pub const MAX_BATCH_SIZE: usize = 20;

/// Result of one item of a batch. Items fail independently of each other.
pub type BatchItemResult = Result<TransferOutcome>;

/// Where the result of one batch position comes from.
enum Slot {
    Rejected(TransferError),
    /// First item carrying the derived key of this group.
    First(usize),
    /// A later item with the same content as an earlier one.
    Repeat(usize),
}

/// Fans a batch of transfer requests out to the orchestrator.
///
/// Each item runs under a key derived from the batch key and the item content, so resubmitting
/// the same batch replays every item instead of executing it again. Items with identical content
/// share one key and are executed once; the repeats are reported as replays of that execution.
#[derive(Clone)]
pub struct BatchDispatcher {
    orchestrator: Arc<TransferOrchestrator>,
}

impl BatchDispatcher {
    pub fn new(orchestrator: Arc<TransferOrchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Executes every distinct item concurrently and returns one result per request, in input
    /// order.
    ///
    /// Only an oversized batch or a blank batch key fails the call as a whole; in both cases no
    /// item is dispatched.
    pub async fn execute_batch(
        &self,
        requests: Vec<TransferRequest>,
        batch_key: &str,
    ) -> Result<Vec<BatchItemResult>> {
        if requests.len() > MAX_BATCH_SIZE {
            return Err(TransferError::BatchTooLarge {
                size: requests.len(),
                max: MAX_BATCH_SIZE,
            });
        }
        if batch_key.trim().is_empty() {
            return Err(TransferError::InvalidRequest(
                "idempotency key is required".to_string(),
            ));
        }

        let mut groups: Vec<(String, TransferRequest)> = Vec::new();
        let mut by_key: HashMap<String, usize> = HashMap::new();
        let slots: Vec<Slot> = requests
            .into_iter()
            .map(|request| match request.validate() {
                Err(e) => Slot::Rejected(e),
                Ok(transfer) => match by_key.entry(derive_item_key(batch_key, &transfer)) {
                    Entry::Occupied(entry) => Slot::Repeat(*entry.get()),
                    Entry::Vacant(entry) => {
                        let group = groups.len();
                        groups.push((entry.key().clone(), request));
                        entry.insert(group);
                        Slot::First(group)
                    }
                },
            })
            .collect();

        info!(
            batch_key,
            items = slots.len(),
            distinct = groups.len(),
            "dispatching batch"
        );

        let handles = groups.into_iter().map(|(key, request)| {
            let orchestrator = self.orchestrator.clone();
            tokio::spawn(async move { orchestrator.execute(&request, &key).await })
        });

        let mut executed: Vec<Option<BatchItemResult>> = join_all(handles)
            .await
            .into_iter()
            .map(|joined| {
                Some(joined.unwrap_or_else(|e| {
                    error!(batch_key, error = %e, "batch item task failed");
                    Err(TransferError::InternalError(Box::new(e)))
                }))
            })
            .collect();

        // Repeats always follow the first item of their group, so walking backwards lets every
        // repeat copy the shared result before the first item takes it.
        let mut results: Vec<BatchItemResult> = slots
            .into_iter()
            .rev()
            .map(|slot| match slot {
                Slot::Rejected(e) => Err(e),
                Slot::Repeat(group) => match &executed[group] {
                    Some(result) => repeat_of(result),
                    None => Err(missing_result()),
                },
                Slot::First(group) => executed[group]
                    .take()
                    .unwrap_or_else(|| Err(missing_result())),
            })
            .collect();
        results.reverse();

        Ok(results)
    }
}

/// What a repeated item reports: the shared transfer as a replay, or a copy of the shared error.
fn repeat_of(result: &BatchItemResult) -> BatchItemResult {
    match result {
        Ok(outcome) => Ok(TransferOutcome {
            message: IDEMPOTENT_REPLAY.to_string(),
            ..outcome.clone()
        }),
        Err(e) => Err(copy_error(e)),
    }
}

fn copy_error(err: &TransferError) -> TransferError {
    match err {
        TransferError::InvalidRequest(msg) => TransferError::InvalidRequest(msg.clone()),
        TransferError::NotFound(id) => TransferError::NotFound(id.clone()),
        TransferError::BatchTooLarge { size, max } => TransferError::BatchTooLarge {
            size: *size,
            max: *max,
        },
        TransferError::DownstreamUnavailable(msg) => {
            TransferError::DownstreamUnavailable(msg.clone())
        }
        TransferError::StorageConflict(key) => TransferError::StorageConflict(key.clone()),
        other => TransferError::InternalError(other.to_string().into()),
    }
}

fn missing_result() -> TransferError {
    TransferError::InternalError("batch item result missing".into())
}
