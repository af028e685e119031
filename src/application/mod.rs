//! Application layer containing the transfer orchestration logic.
//!
//! `TransferOrchestrator` is the entry point for single transfers; `BatchDispatcher` fans batches
//! out to it on tokio tasks. Both reach the external ledger only through `LedgerGateway`, which
//! wraps every call in a circuit breaker and a timeout.

pub mod batch;
pub mod circuit_breaker;
pub mod gateway;
pub mod orchestrator;
pub mod sweeper;
