use super::transfer::ValidatedTransfer;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// How long an idempotency key stays bound to its transfer.
pub const IDEMPOTENCY_TTL: Duration = Duration::hours(24);

/// Binds an idempotency key to the transfer it produced.
///
/// The record only references the transfer; it does not own it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdempotencyRecord {
    pub key: String,
    pub transfer_id: String,
    pub created_at: DateTime<Utc>,
}

impl IdempotencyRecord {
    pub fn new(
        key: impl Into<String>,
        transfer_id: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            key: key.into(),
            transfer_id: transfer_id.into(),
            created_at,
        }
    }

    /// A record is expired once strictly more than `ttl` has elapsed since it was created.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.created_at > ttl
    }
}

/// Derives the idempotency key of one batch item from the batch key and the item content.
///
/// Items with the same accounts and amount derive the same key regardless of their position,
/// so identical items inside one batch collapse into a single transfer.
pub fn derive_item_key(batch_key: &str, transfer: &ValidatedTransfer) -> String {
    let payload = format!(
        "{}|{}|{}",
        transfer.from_account_id, transfer.to_account_id, transfer.amount
    );
    let digest = Sha256::digest(payload.as_bytes());
    format!("{}:{}", batch_key, hex::encode(digest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::transfer::TransferRequest;
    use rust_decimal_macros::dec;

    fn validated(from: i64, to: i64, amount: rust_decimal::Decimal) -> ValidatedTransfer {
        TransferRequest::new(from, to, amount).validate().unwrap()
    }

    #[test]
    fn test_expiry_boundary() {
        let created = Utc::now();
        let record = IdempotencyRecord::new("k", "t", created);

        assert!(!record.is_expired(created + IDEMPOTENCY_TTL, IDEMPOTENCY_TTL));
        assert!(record.is_expired(
            created + IDEMPOTENCY_TTL + Duration::milliseconds(1),
            IDEMPOTENCY_TTL
        ));
    }

    #[test]
    fn test_derived_key_shape() {
        let key = derive_item_key("batch-1", &validated(1, 2, dec!(100.00)));
        // SHA-256("1|2|100.00")
        assert_eq!(
            key,
            format!("batch-1:{}", hex::encode(Sha256::digest(b"1|2|100.00")))
        );
        assert_eq!(key.len(), "batch-1:".len() + 64);
    }

    #[test]
    fn test_derived_key_ignores_amount_formatting() {
        let a = derive_item_key("b", &validated(1, 2, dec!(100)));
        let b = derive_item_key("b", &validated(1, 2, dec!(100.00)));
        assert_eq!(a, b);
    }

    #[test]
    fn test_derived_key_depends_on_direction_and_batch() {
        let forward = derive_item_key("b", &validated(1, 2, dec!(5.00)));
        let backward = derive_item_key("b", &validated(2, 1, dec!(5.00)));
        let other_batch = derive_item_key("c", &validated(1, 2, dec!(5.00)));

        assert_ne!(forward, backward);
        assert_ne!(forward, other_batch);
    }
}
