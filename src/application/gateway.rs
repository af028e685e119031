use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use crate::domain::ledger::LedgerTransferRequest;
use crate::domain::ports::LedgerClientRef;
use crate::domain::transfer::{AccountId, Amount, TransferOutcome, TransferStatus};
use crate::error::TransferError;
use parking_lot::Mutex;
use std::time::Duration;
use tracing::{error, info};

/// Message of the outcome returned whenever the ledger cannot be reached.
pub const LEDGER_UNAVAILABLE: &str = "Ledger service unavailable";

/// Default bound on a single ledger call.
pub const DEFAULT_LEDGER_TIMEOUT: Duration = Duration::from_secs(5);

/// Protected access to the external ledger.
///
/// Every call yields a `TransferOutcome`: transport errors, timeouts and an open circuit are
/// absorbed into the fallback outcome (`FAILURE`, "Ledger service unavailable") and counted
/// against the circuit breaker. A `FAILURE` reported by the ledger itself is a business result
/// and counts as a successful call.
pub struct LedgerGateway {
    client: LedgerClientRef,
    breaker: Mutex<CircuitBreaker>,
    timeout: Duration,
}

impl LedgerGateway {
    pub fn new(client: LedgerClientRef, breaker: CircuitBreakerConfig, timeout: Duration) -> Self {
        Self {
            client,
            breaker: Mutex::new(CircuitBreaker::new("ledger", breaker)),
            timeout,
        }
    }

    pub async fn call(
        &self,
        transfer_id: &str,
        from_account_id: AccountId,
        to_account_id: AccountId,
        amount: Amount,
    ) -> TransferOutcome {
        let Some(admission) = self.breaker.lock().try_acquire() else {
            error!(transfer_id, "ledger call short-circuited, circuit open");
            return fallback(transfer_id);
        };

        info!(
            transfer_id,
            from = from_account_id,
            to = to_account_id,
            %amount,
            "calling ledger"
        );
        let request = LedgerTransferRequest {
            transfer_id: transfer_id.to_string(),
            from_account_id,
            to_account_id,
            amount: amount.value(),
        };

        let result = match tokio::time::timeout(self.timeout, self.client.transfer(&request)).await
        {
            Ok(result) => result,
            Err(_) => Err(TransferError::DownstreamUnavailable(format!(
                "timed out after {}ms",
                self.timeout.as_millis()
            ))),
        };

        match result {
            Ok(response) => {
                self.breaker.lock().record_success(admission);
                TransferOutcome {
                    transfer_id: transfer_id.to_string(),
                    status: response.status,
                    message: response.message,
                }
            }
            Err(e) => {
                self.breaker.lock().record_failure(admission);
                error!(transfer_id, error = %e, "ledger call failed");
                fallback(transfer_id)
            }
        }
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.lock().state()
    }
}

fn fallback(transfer_id: &str) -> TransferOutcome {
    TransferOutcome {
        transfer_id: transfer_id.to_string(),
        status: TransferStatus::Failure,
        message: LEDGER_UNAVAILABLE.to_string(),
    }
}
