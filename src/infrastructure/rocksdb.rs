use crate::domain::idempotency::IdempotencyRecord;
use crate::domain::ports::{IdempotencyStore, TransferLedger};
use crate::domain::transfer::TransferRecord;
use crate::error::{Result, TransferError};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Options};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for idempotency key bindings.
pub const CF_IDEMPOTENCY_KEYS: &str = "idempotency_keys";
/// Column Family for transfer records.
pub const CF_TRANSFERS: &str = "transfers";

/// A persistent store implementation using RocksDB.
///
/// Holds both idempotency records and transfer records in separate Column Families, keyed by
/// idempotency key and transfer id respectively. RocksDB has no insert-if-absent, so every
/// mutation of the idempotency Column Family goes through `key_lock`.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    key_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required column families ("idempotency_keys" and "transfers") exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_keys = ColumnFamilyDescriptor::new(CF_IDEMPOTENCY_KEYS, Options::default());
        let cf_transfers = ColumnFamilyDescriptor::new(CF_TRANSFERS, Options::default());

        let db = DB::open_cf_descriptors(&opts, path, vec![cf_keys, cf_transfers])?;

        Ok(Self {
            db: Arc::new(db),
            key_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            TransferError::InternalError(
                format!("{} column family not found", name).into(),
            )
        })
    }

    fn read<T: DeserializeOwned>(&self, cf_name: &str, key: &str) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, key.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn write<T: Serialize>(&self, cf_name: &str, key: &str, value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        let bytes = serde_json::to_vec(value)?;
        self.db.put_cf(cf, key.as_bytes(), bytes)?;
        Ok(())
    }
}

#[async_trait]
impl IdempotencyStore for RocksDBStore {
    async fn get(&self, key: &str) -> Result<Option<IdempotencyRecord>> {
        self.read(CF_IDEMPOTENCY_KEYS, key)
    }

    async fn put(&self, record: IdempotencyRecord) -> Result<()> {
        let _guard = self.key_lock.lock().await;
        let cf = self.cf(CF_IDEMPOTENCY_KEYS)?;
        if self.db.get_pinned_cf(cf, record.key.as_bytes())?.is_some() {
            return Err(TransferError::StorageConflict(record.key));
        }
        self.write(CF_IDEMPOTENCY_KEYS, &record.key, &record)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let _guard = self.key_lock.lock().await;
        let cf = self.cf(CF_IDEMPOTENCY_KEYS)?;
        self.db.delete_cf(cf, key.as_bytes())?;
        Ok(())
    }

    async fn delete_if_expired(
        &self,
        key: &str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<bool> {
        let _guard = self.key_lock.lock().await;
        let expired = self
            .read::<IdempotencyRecord>(CF_IDEMPOTENCY_KEYS, key)?
            .is_some_and(|record| record.is_expired(now, ttl));
        if expired {
            let cf = self.cf(CF_IDEMPOTENCY_KEYS)?;
            self.db.delete_cf(cf, key.as_bytes())?;
        }
        Ok(expired)
    }

    async fn delete_if_bound(&self, key: &str, transfer_id: &str) -> Result<bool> {
        let _guard = self.key_lock.lock().await;
        let bound = self
            .read::<IdempotencyRecord>(CF_IDEMPOTENCY_KEYS, key)?
            .is_some_and(|record| record.transfer_id == transfer_id);
        if bound {
            let cf = self.cf(CF_IDEMPOTENCY_KEYS)?;
            self.db.delete_cf(cf, key.as_bytes())?;
        }
        Ok(bound)
    }

    async fn all(&self) -> Result<Vec<IdempotencyRecord>> {
        let cf = self.cf(CF_IDEMPOTENCY_KEYS)?;
        let mut records = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, value) = item?;
            records.push(serde_json::from_slice(&value)?);
        }
        Ok(records)
    }
}

#[async_trait]
impl TransferLedger for RocksDBStore {
    async fn save(&self, record: TransferRecord) -> Result<TransferRecord> {
        let cf = self.cf(CF_TRANSFERS)?;
        if self
            .db
            .get_pinned_cf(cf, record.transfer_id.as_bytes())?
            .is_some()
        {
            return Err(TransferError::InternalError(
                format!("transfer {} already recorded", record.transfer_id).into(),
            ));
        }
        self.write(CF_TRANSFERS, &record.transfer_id, &record)?;
        Ok(record)
    }

    async fn find_by_transfer_id(&self, transfer_id: &str) -> Result<Option<TransferRecord>> {
        self.read(CF_TRANSFERS, transfer_id)
    }
}
