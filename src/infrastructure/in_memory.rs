use crate::domain::idempotency::IdempotencyRecord;
use crate::domain::ledger::{LedgerTransferRequest, LedgerTransferResponse};
use crate::domain::ports::{IdempotencyStore, LedgerClient, TransferLedger};
use crate::domain::transfer::{TransferRecord, TransferStatus};
use crate::error::{Result, TransferError};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use std::collections::hash_map::Entry;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory idempotency store.
///
/// Key claims happen under the write lock, which makes `put` an atomic insert-if-absent.
#[derive(Default, Clone)]
pub struct InMemoryIdempotencyStore {
    records: Arc<RwLock<HashMap<String, IdempotencyRecord>>>,
}

impl InMemoryIdempotencyStore {
    /// Creates a new, empty in-memory idempotency store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn get(&self, key: &str) -> Result<Option<IdempotencyRecord>> {
        let records = self.records.read().await;
        Ok(records.get(key).cloned())
    }

    async fn put(&self, record: IdempotencyRecord) -> Result<()> {
        let mut records = self.records.write().await;
        match records.entry(record.key.clone()) {
            Entry::Occupied(_) => Err(TransferError::StorageConflict(record.key)),
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut records = self.records.write().await;
        records.remove(key);
        Ok(())
    }

    async fn delete_if_expired(
        &self,
        key: &str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<bool> {
        let mut records = self.records.write().await;
        let expired = records
            .get(key)
            .is_some_and(|record| record.is_expired(now, ttl));
        if expired {
            records.remove(key);
        }
        Ok(expired)
    }

    async fn delete_if_bound(&self, key: &str, transfer_id: &str) -> Result<bool> {
        let mut records = self.records.write().await;
        let bound = records
            .get(key)
            .is_some_and(|record| record.transfer_id == transfer_id);
        if bound {
            records.remove(key);
        }
        Ok(bound)
    }

    async fn all(&self) -> Result<Vec<IdempotencyRecord>> {
        let records = self.records.read().await;
        Ok(records.values().cloned().collect())
    }
}

/// A thread-safe in-memory store for transfer records.
#[derive(Default, Clone)]
pub struct InMemoryTransferLedger {
    transfers: Arc<RwLock<HashMap<String, TransferRecord>>>,
}

impl InMemoryTransferLedger {
    /// Creates a new, empty in-memory transfer store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransferLedger for InMemoryTransferLedger {
    async fn save(&self, record: TransferRecord) -> Result<TransferRecord> {
        let mut transfers = self.transfers.write().await;
        match transfers.entry(record.transfer_id.clone()) {
            Entry::Occupied(_) => Err(TransferError::InternalError(
                format!("transfer {} already recorded", record.transfer_id).into(),
            )),
            Entry::Vacant(slot) => Ok(slot.insert(record).clone()),
        }
    }

    async fn find_by_transfer_id(&self, transfer_id: &str) -> Result<Option<TransferRecord>> {
        let transfers = self.transfers.read().await;
        Ok(transfers.get(transfer_id).cloned())
    }
}

/// Number of most recent requests an `InMemoryLedgerClient` remembers.
pub const SUBMISSION_HISTORY: usize = 1_024;

/// Loopback ledger that accepts every transfer.
///
/// Stands in for the remote ledger when none is configured, and remembers the last
/// `SUBMISSION_HISTORY` requests it received so callers can inspect submissions.
#[derive(Default, Clone)]
pub struct InMemoryLedgerClient {
    submitted: Arc<RwLock<VecDeque<LedgerTransferRequest>>>,
    delay: Option<std::time::Duration>,
}

impl InMemoryLedgerClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// A loopback ledger that takes `delay` to answer each call.
    pub fn with_delay(delay: std::time::Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// The most recent requests received, oldest first.
    pub async fn submitted(&self) -> Vec<LedgerTransferRequest> {
        self.submitted.read().await.iter().cloned().collect()
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedgerClient {
    async fn transfer(&self, request: &LedgerTransferRequest) -> Result<LedgerTransferResponse> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let mut submitted = self.submitted.write().await;
        if submitted.len() == SUBMISSION_HISTORY {
            submitted.pop_front();
        }
        submitted.push_back(request.clone());
        drop(submitted);
        Ok(LedgerTransferResponse {
            transfer_id: request.transfer_id.clone(),
            status: TransferStatus::Success,
            message: "Transfer completed".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::transfer::Amount;
    use rust_decimal_macros::dec;

    fn transfer(id: &str) -> TransferRecord {
        TransferRecord {
            transfer_id: id.to_string(),
            from_account_id: 1,
            to_account_id: 2,
            amount: Amount::new(dec!(100.00)).unwrap(),
            status: TransferStatus::Success,
            message: "Transfer completed".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_put_is_insert_if_absent() {
        let store = InMemoryIdempotencyStore::new();
        store
            .put(IdempotencyRecord::new("k", "t1", Utc::now()))
            .await
            .unwrap();

        let err = store
            .put(IdempotencyRecord::new("k", "t2", Utc::now()))
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::StorageConflict(ref key) if key == "k"));

        assert_eq!(store.get("k").await.unwrap().unwrap().transfer_id, "t1");
    }

    #[tokio::test]
    async fn test_delete_if_expired_keeps_live_records() {
        let store = InMemoryIdempotencyStore::new();
        let now = Utc::now();
        store
            .put(IdempotencyRecord::new("live", "t", now))
            .await
            .unwrap();

        assert!(
            !store
                .delete_if_expired("live", now, Duration::hours(24))
                .await
                .unwrap()
        );
        assert!(
            !store
                .delete_if_expired("missing", now, Duration::hours(24))
                .await
                .unwrap()
        );
        assert!(store.get("live").await.unwrap().is_some());

        store.delete("live").await.unwrap();
        assert!(store.all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transfer_ledger_round_trip() {
        let ledger = InMemoryTransferLedger::new();
        let saved = ledger.save(transfer("t-1")).await.unwrap();

        assert_eq!(
            ledger.find_by_transfer_id("t-1").await.unwrap(),
            Some(saved)
        );
        assert!(ledger.find_by_transfer_id("t-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_transfer_records_are_append_only() {
        let ledger = InMemoryTransferLedger::new();
        ledger.save(transfer("t-1")).await.unwrap();
        assert!(ledger.save(transfer("t-1")).await.is_err());
    }

    #[tokio::test]
    async fn test_loopback_ledger_records_submissions() {
        let ledger = InMemoryLedgerClient::new();
        let request = LedgerTransferRequest {
            transfer_id: "t-9".to_string(),
            from_account_id: 1,
            to_account_id: 2,
            amount: dec!(5.00),
        };

        let response = ledger.transfer(&request).await.unwrap();

        assert_eq!(response.transfer_id, "t-9");
        assert_eq!(response.status, TransferStatus::Success);
        assert_eq!(ledger.submitted().await, vec![request]);
    }

    #[tokio::test]
    async fn test_delete_if_bound_spares_rebound_keys() {
        let store = InMemoryIdempotencyStore::new();
        store
            .put(IdempotencyRecord::new("k", "fresh", Utc::now()))
            .await
            .unwrap();

        assert!(!store.delete_if_bound("k", "stale").await.unwrap());
        assert_eq!(store.get("k").await.unwrap().unwrap().transfer_id, "fresh");

        assert!(store.delete_if_bound("k", "fresh").await.unwrap());
        assert!(store.get("k").await.unwrap().is_none());
        assert!(!store.delete_if_bound("k", "fresh").await.unwrap());
    }

    #[tokio::test]
    async fn test_loopback_history_is_bounded() {
        let ledger = InMemoryLedgerClient::new();
        for i in 0..SUBMISSION_HISTORY + 6 {
            let request = LedgerTransferRequest {
                transfer_id: format!("t-{i}"),
                from_account_id: 1,
                to_account_id: 2,
                amount: dec!(1.00),
            };
            ledger.transfer(&request).await.unwrap();
        }

        let submitted = ledger.submitted().await;
        assert_eq!(submitted.len(), SUBMISSION_HISTORY);
        assert_eq!(submitted[0].transfer_id, "t-6");
        assert_eq!(
            submitted[SUBMISSION_HISTORY - 1].transfer_id,
            format!("t-{}", SUBMISSION_HISTORY + 5)
        );
    }
}
