use crate::domain::idempotency::IdempotencyRecord;
use crate::domain::ports::IdempotencyStoreRef;
use crate::error::Result;
use chrono::{DateTime, Duration, Utc};
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Reclaims idempotency records whose TTL has elapsed.
///
/// The orchestrator already reclaims expired keys lazily when it meets them, so sweeping only
/// bounds storage growth.
#[derive(Clone)]
pub struct CleanupSweeper {
    store: IdempotencyStoreRef,
    ttl: Duration,
}

impl CleanupSweeper {
    pub fn new(store: IdempotencyStoreRef, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn is_expired(&self, record: &IdempotencyRecord, now: DateTime<Utc>) -> bool {
        record.is_expired(now, self.ttl)
    }

    /// Deletes every record expired at `now` and returns how many were removed.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut removed = 0;
        for record in self.store.all().await? {
            if self.is_expired(&record, now)
                && self
                    .store
                    .delete_if_expired(&record.key, now, self.ttl)
                    .await?
            {
                removed += 1;
            }
        }
        if removed > 0 {
            info!(removed, "idempotency cleanup removed expired keys");
        }
        Ok(removed)
    }

    /// Sweeps every `period` on a background task until the returned handle is aborted.
    pub fn spawn(self, period: std::time::Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                if let Err(e) = self.sweep(Utc::now()).await {
                    error!(error = %e, "idempotency cleanup failed");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::idempotency::IDEMPOTENCY_TTL;
    use crate::domain::ports::IdempotencyStore;
    use crate::infrastructure::in_memory::InMemoryIdempotencyStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_sweep_removes_only_expired() {
        let store = Arc::new(InMemoryIdempotencyStore::new());
        let now = Utc::now();
        store
            .put(IdempotencyRecord::new("fresh", "t1", now - Duration::hours(1)))
            .await
            .unwrap();
        store
            .put(IdempotencyRecord::new("stale", "t2", now - Duration::hours(25)))
            .await
            .unwrap();

        let sweeper = CleanupSweeper::new(store.clone(), IDEMPOTENCY_TTL);
        assert_eq!(sweeper.sweep(now).await.unwrap(), 1);

        assert!(store.get("fresh").await.unwrap().is_some());
        assert!(store.get("stale").await.unwrap().is_none());
        assert_eq!(sweeper.sweep(now).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_is_expired_uses_configured_ttl() {
        let store = Arc::new(InMemoryIdempotencyStore::new());
        let sweeper = CleanupSweeper::new(store, Duration::minutes(5));
        let now = Utc::now();

        let record = IdempotencyRecord::new("k", "t", now - Duration::minutes(6));
        assert!(sweeper.is_expired(&record, now));

        let record = IdempotencyRecord::new("k", "t", now - Duration::minutes(4));
        assert!(!sweeper.is_expired(&record, now));
    }

    #[tokio::test]
    async fn test_background_sweep() {
        let store = Arc::new(InMemoryIdempotencyStore::new());
        store
            .put(IdempotencyRecord::new(
                "stale",
                "t",
                Utc::now() - Duration::hours(48),
            ))
            .await
            .unwrap();

        let handle = CleanupSweeper::new(store.clone(), IDEMPOTENCY_TTL)
            .spawn(std::time::Duration::from_millis(10));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        handle.abort();

        assert!(store.get("stale").await.unwrap().is_none());
    }
}
