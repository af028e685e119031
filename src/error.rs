use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Transfer not found: {0}")]
    NotFound(String),
    #[error("Batch size cannot exceed {max} (got {size})")]
    BatchTooLarge { size: usize, max: usize },
    #[error("Ledger service unavailable: {0}")]
    DownstreamUnavailable(String),
    #[error("Idempotency key already claimed: {0}")]
    StorageConflict(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDBError(#[from] rocksdb::Error),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

impl TransferError {
    /// Whether the error is part of the caller-facing taxonomy (bad input, unknown id,
    /// oversized batch) rather than an infrastructure failure.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            TransferError::InvalidRequest(_)
                | TransferError::NotFound(_)
                | TransferError::BatchTooLarge { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, TransferError>;
