use super::idempotency::IdempotencyRecord;
use super::ledger::{LedgerTransferRequest, LedgerTransferResponse};
use super::transfer::TransferRecord;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Durable mapping from idempotency key to the transfer it produced.
///
/// Implementations must make `put` an atomic insert-if-absent: when the key already exists the
/// call fails with `TransferError::StorageConflict` and leaves the stored record untouched.
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<IdempotencyRecord>>;
    async fn put(&self, record: IdempotencyRecord) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
    /// Deletes the record under `key` only if it is expired at `now`. Returns whether a record
    /// was removed.
    async fn delete_if_expired(&self, key: &str, now: DateTime<Utc>, ttl: Duration)
    -> Result<bool>;
    /// Deletes the record under `key` only if it is still bound to `transfer_id`. Returns whether
    /// a record was removed.
    async fn delete_if_bound(&self, key: &str, transfer_id: &str) -> Result<bool>;
    async fn all(&self) -> Result<Vec<IdempotencyRecord>>;
}

/// Durable mapping from transfer id to transfer record.
#[async_trait]
pub trait TransferLedger: Send + Sync {
    async fn save(&self, record: TransferRecord) -> Result<TransferRecord>;
    async fn find_by_transfer_id(&self, transfer_id: &str) -> Result<Option<TransferRecord>>;
}

/// A single unprotected call to the external ledger.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn transfer(&self, request: &LedgerTransferRequest) -> Result<LedgerTransferResponse>;
}

pub type IdempotencyStoreRef = Arc<dyn IdempotencyStore>;
pub type TransferLedgerRef = Arc<dyn TransferLedger>;
pub type LedgerClientRef = Arc<dyn LedgerClient>;
