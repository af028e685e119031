//! Wires adapters, gateway and orchestrator together from an `AppConfig`.

use crate::application::gateway::LedgerGateway;
use crate::application::orchestrator::TransferOrchestrator;
use crate::application::sweeper::CleanupSweeper;
use crate::config::AppConfig;
use crate::domain::ports::{IdempotencyStoreRef, LedgerClientRef, TransferLedgerRef};
use crate::error::Result;
use crate::infrastructure::http_ledger::HttpLedgerClient;
use crate::infrastructure::in_memory::{
    InMemoryIdempotencyStore, InMemoryLedgerClient, InMemoryTransferLedger,
};
use std::sync::Arc;
use tracing::{info, warn};

/// The composed service: the orchestrator plus the handles background jobs need.
pub struct Service {
    pub orchestrator: Arc<TransferOrchestrator>,
    pub sweeper: CleanupSweeper,
}

pub fn build_service(config: &AppConfig) -> Result<Service> {
    let (idempotency_store, transfer_ledger) = open_stores(config)?;
    let client = ledger_client(config)?;

    let gateway = LedgerGateway::new(client, config.breaker.clone(), config.ledger_timeout);
    let orchestrator = Arc::new(TransferOrchestrator::new(
        idempotency_store.clone(),
        transfer_ledger,
        gateway,
        config.idempotency_ttl,
    ));
    let sweeper = CleanupSweeper::new(idempotency_store, config.idempotency_ttl);

    Ok(Service {
        orchestrator,
        sweeper,
    })
}

fn ledger_client(config: &AppConfig) -> Result<LedgerClientRef> {
    match &config.ledger_url {
        Some(url) => {
            info!(%url, "using remote ledger");
            Ok(Arc::new(HttpLedgerClient::new(
                url.clone(),
                config.ledger_timeout,
            )?))
        }
        None => {
            warn!("no ledger URL configured, using loopback ledger");
            Ok(Arc::new(InMemoryLedgerClient::new()))
        }
    }
}

#[cfg(feature = "storage-rocksdb")]
fn open_stores(config: &AppConfig) -> Result<(IdempotencyStoreRef, TransferLedgerRef)> {
    if let Some(db_path) = &config.db_path {
        info!(path = %db_path.display(), "using RocksDB storage");
        let store = crate::infrastructure::rocksdb::RocksDBStore::open(db_path)?;
        return Ok((Arc::new(store.clone()), Arc::new(store)));
    }
    Ok(in_memory_stores())
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_stores(config: &AppConfig) -> Result<(IdempotencyStoreRef, TransferLedgerRef)> {
    if config.db_path.is_some() {
        warn!(
            "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(in_memory_stores())
}

fn in_memory_stores() -> (IdempotencyStoreRef, TransferLedgerRef) {
    (
        Arc::new(InMemoryIdempotencyStore::new()),
        Arc::new(InMemoryTransferLedger::new()),
    )
}
