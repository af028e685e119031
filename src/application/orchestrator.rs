use super::gateway::LedgerGateway;
use crate::domain::idempotency::IdempotencyRecord;
use crate::domain::ports::{IdempotencyStoreRef, TransferLedgerRef};
use crate::domain::transfer::{TransferOutcome, TransferRecord, TransferRequest};
use crate::error::{Result, TransferError};
use chrono::{Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

/// Message attached to outcomes served from an existing idempotency binding.
pub const IDEMPOTENT_REPLAY: &str = "Idempotent replay";

/// Runs a transfer request against the ledger at most once per idempotency key.
///
/// The orchestrator owns the ordering between the two stores: the transfer record is always
/// saved before the idempotency record that points at it, so a crash in between leaves an
/// unreferenced transfer and never a key bound to nothing.
pub struct TransferOrchestrator {
    idempotency_store: IdempotencyStoreRef,
    transfer_ledger: TransferLedgerRef,
    gateway: LedgerGateway,
    ttl: Duration,
}

impl TransferOrchestrator {
    /// Creates a new `TransferOrchestrator`.
    ///
    /// # Arguments
    ///
    /// * `idempotency_store` - Where idempotency keys are claimed.
    /// * `transfer_ledger` - Where transfer records are kept.
    /// * `gateway` - Protected access to the external ledger.
    /// * `ttl` - How long a key stays bound to its transfer.
    pub fn new(
        idempotency_store: IdempotencyStoreRef,
        transfer_ledger: TransferLedgerRef,
        gateway: LedgerGateway,
        ttl: Duration,
    ) -> Self {
        Self {
            idempotency_store,
            transfer_ledger,
            gateway,
            ttl,
        }
    }

    /// Executes `request` under `idempotency_key`.
    ///
    /// A live binding for the key replays the bound transfer without calling the ledger. An
    /// expired binding is reclaimed and the request runs again. Ledger failures come back as a
    /// `FAILURE` outcome, not as an error.
    pub async fn execute(
        &self,
        request: &TransferRequest,
        idempotency_key: &str,
    ) -> Result<TransferOutcome> {
        let transfer = request.validate()?;
        if idempotency_key.trim().is_empty() {
            return Err(TransferError::InvalidRequest(
                "idempotency key is required".to_string(),
            ));
        }

        if let Some(replay) = self.replay(idempotency_key).await? {
            return Ok(replay);
        }

        let transfer_id = Uuid::new_v4().to_string();
        let reply = self
            .gateway
            .call(
                &transfer_id,
                transfer.from_account_id,
                transfer.to_account_id,
                transfer.amount,
            )
            .await;

        let saved = self
            .transfer_ledger
            .save(TransferRecord {
                transfer_id: transfer_id.clone(),
                from_account_id: transfer.from_account_id,
                to_account_id: transfer.to_account_id,
                amount: transfer.amount,
                status: reply.status,
                message: reply.message.clone(),
                created_at: Utc::now(),
            })
            .await?;

        let binding = IdempotencyRecord::new(idempotency_key, &saved.transfer_id, Utc::now());
        match self.idempotency_store.put(binding).await {
            Ok(()) => {}
            Err(TransferError::StorageConflict(_)) => {
                return self.reconcile(idempotency_key, &transfer_id).await;
            }
            Err(e) => return Err(e),
        }

        info!(
            transfer_id = %saved.transfer_id,
            status = %saved.status,
            key = idempotency_key,
            "transfer recorded"
        );
        Ok(reply)
    }

    /// Returns the stored record for `transfer_id`.
    pub async fn lookup(&self, transfer_id: &str) -> Result<TransferRecord> {
        self.transfer_ledger
            .find_by_transfer_id(transfer_id)
            .await?
            .ok_or_else(|| TransferError::NotFound(transfer_id.to_string()))
    }

    pub fn gateway(&self) -> &LedgerGateway {
        &self.gateway
    }

    /// Serves a live binding for `key` if there is one, reclaiming stale bindings on the way.
    async fn replay(&self, key: &str) -> Result<Option<TransferOutcome>> {
        let Some(existing) = self.idempotency_store.get(key).await? else {
            return Ok(None);
        };

        let now = Utc::now();
        if existing.is_expired(now, self.ttl) {
            self.idempotency_store
                .delete_if_expired(key, now, self.ttl)
                .await?;
            info!(
                key,
                transfer_id = %existing.transfer_id,
                "idempotency key expired; reprocessing"
            );
            return Ok(None);
        }

        match self
            .transfer_ledger
            .find_by_transfer_id(&existing.transfer_id)
            .await?
        {
            Some(record) => {
                info!(
                    key,
                    transfer_id = %record.transfer_id,
                    status = %record.status,
                    "idempotent replay"
                );
                Ok(Some(replay_of(&record)))
            }
            None => {
                warn!(
                    key,
                    transfer_id = %existing.transfer_id,
                    "idempotency key bound to a missing transfer; reprocessing"
                );
                self.idempotency_store
                    .delete_if_bound(key, &existing.transfer_id)
                    .await?;
                Ok(None)
            }
        }
    }

    /// Another execution claimed `key` between our lookup and our insert. Our own transfer record
    /// stays in the ledger unreferenced; the caller gets the winner's transfer.
    async fn reconcile(&self, key: &str, own_transfer_id: &str) -> Result<TransferOutcome> {
        let winner = self.idempotency_store.get(key).await?.ok_or_else(|| {
            TransferError::InternalError(
                format!("idempotency key {key} conflicted but is no longer stored").into(),
            )
        })?;
        let record = self.lookup(&winner.transfer_id).await?;
        warn!(
            key,
            discarded = own_transfer_id,
            winner = %record.transfer_id,
            "lost idempotency race; returning winning transfer"
        );
        Ok(replay_of(&record))
    }
}

fn replay_of(record: &TransferRecord) -> TransferOutcome {
    TransferOutcome {
        transfer_id: record.transfer_id.clone(),
        status: record.status,
        message: IDEMPOTENT_REPLAY.to_string(),
    }
}
