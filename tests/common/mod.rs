#![allow(dead_code)]

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use transfer_orchestrator::application::circuit_breaker::CircuitBreakerConfig;
use transfer_orchestrator::application::gateway::LedgerGateway;
use transfer_orchestrator::application::orchestrator::TransferOrchestrator;
use transfer_orchestrator::domain::idempotency::IDEMPOTENCY_TTL;
use transfer_orchestrator::domain::ledger::{LedgerTransferRequest, LedgerTransferResponse};
use transfer_orchestrator::domain::ports::{LedgerClient, LedgerClientRef};
use transfer_orchestrator::domain::transfer::TransferStatus;
use transfer_orchestrator::error::{Result, TransferError};
use transfer_orchestrator::infrastructure::in_memory::{
    InMemoryIdempotencyStore, InMemoryTransferLedger,
};

/// Ledger whose every call fails at the transport level.
#[derive(Default)]
pub struct UnreachableLedger {
    pub calls: AtomicUsize,
}

#[async_trait]
impl LedgerClient for UnreachableLedger {
    async fn transfer(&self, _request: &LedgerTransferRequest) -> Result<LedgerTransferResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(TransferError::DownstreamUnavailable(
            "connection refused".to_string(),
        ))
    }
}

/// Ledger that answers larger amounts sooner, so concurrent calls complete out of order.
#[derive(Default)]
pub struct SkewedLedger {
    pub calls: AtomicUsize,
}

#[async_trait]
impl LedgerClient for SkewedLedger {
    async fn transfer(&self, request: &LedgerTransferRequest) -> Result<LedgerTransferResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let amount = request.amount.to_u64().unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(60u64.saturating_sub(amount * 10))).await;
        Ok(LedgerTransferResponse {
            transfer_id: request.transfer_id.clone(),
            status: TransferStatus::Success,
            message: format!("settled {}", request.amount),
        })
    }
}

pub struct Harness {
    pub orchestrator: Arc<TransferOrchestrator>,
    pub keys: Arc<InMemoryIdempotencyStore>,
    pub transfers: Arc<InMemoryTransferLedger>,
}

pub fn harness(client: LedgerClientRef) -> Harness {
    harness_with_breaker(client, CircuitBreakerConfig::default())
}

pub fn harness_with_breaker(client: LedgerClientRef, breaker: CircuitBreakerConfig) -> Harness {
    let keys = Arc::new(InMemoryIdempotencyStore::new());
    let transfers = Arc::new(InMemoryTransferLedger::new());
    let gateway = LedgerGateway::new(client, breaker, Duration::from_secs(2));
    let orchestrator = Arc::new(TransferOrchestrator::new(
        keys.clone(),
        transfers.clone(),
        gateway,
        IDEMPOTENCY_TTL,
    ));
    Harness {
        orchestrator,
        keys,
        transfers,
    }
}
