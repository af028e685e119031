use crate::error::{Result, TransferError};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of fractional digits every transfer amount is held at.
pub const AMOUNT_SCALE: u32 = 2;

/// Identifier of an account on the external ledger.
pub type AccountId = i64;

/// A strictly positive monetary amount, held at a fixed scale of two fractional digits.
///
/// `100`, `100.0` and `100.00` all normalize to the same `Amount`, so its textual form is
/// canonical and can be fed into key derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self> {
        if value <= Decimal::ZERO {
            return Err(TransferError::InvalidRequest(
                "amount must be > 0".to_string(),
            ));
        }
        if value.normalize().scale() > AMOUNT_SCALE {
            return Err(TransferError::InvalidRequest(format!(
                "amount supports at most {} fractional digits",
                AMOUNT_SCALE
            )));
        }
        let mut value = value;
        value.rescale(AMOUNT_SCALE);
        Ok(Self(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = TransferError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A request to move funds between two ledger accounts, as submitted by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: Decimal,
}

impl TransferRequest {
    pub fn new(from_account_id: AccountId, to_account_id: AccountId, amount: Decimal) -> Self {
        Self {
            from_account_id,
            to_account_id,
            amount,
        }
    }

    /// Checks the request invariants without touching any state.
    pub fn validate(&self) -> Result<ValidatedTransfer> {
        if self.from_account_id == self.to_account_id {
            return Err(TransferError::InvalidRequest(
                "from/to must differ".to_string(),
            ));
        }
        Ok(ValidatedTransfer {
            from_account_id: self.from_account_id,
            to_account_id: self.to_account_id,
            amount: Amount::new(self.amount)?,
        })
    }
}

/// A `TransferRequest` whose invariants have been checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValidatedTransfer {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransferStatus {
    Success,
    Failure,
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferStatus::Success => f.write_str("SUCCESS"),
            TransferStatus::Failure => f.write_str("FAILURE"),
        }
    }
}

/// The durable record of one orchestration attempt. Never mutated once saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRecord {
    pub transfer_id: String,
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: Amount,
    pub status: TransferStatus,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl TransferRecord {
    pub fn outcome(&self) -> TransferOutcome {
        TransferOutcome {
            transfer_id: self.transfer_id.clone(),
            status: self.status,
            message: self.message.clone(),
        }
    }
}

/// What a caller gets back for a transfer submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferOutcome {
    pub transfer_id: String,
    pub status: TransferStatus,
    pub message: String,
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        self.status == TransferStatus::Success
    }
}
