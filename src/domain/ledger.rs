use super::transfer::{AccountId, TransferStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Body of a transfer submission to the external ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerTransferRequest {
    pub transfer_id: String,
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: Decimal,
}

/// The ledger's verdict on a submitted transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerTransferResponse {
    pub transfer_id: String,
    pub status: TransferStatus,
    pub message: String,
}
