//! Nonce replay prevention.
//!
//! A nonce is consumed by inserting a [`NonceRecord`]; the backing store's
//! atomic unique-insert on `(application_id, nonce)` is the entire
//! mechanism. There is no check-then-insert and no in-process locking:
//! two concurrent requests with the same nonce resolve to exactly one
//! acceptance because exactly one insert succeeds.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use faultline_store::{NonceRecord, NonceStore, StorageError};
use uuid::Uuid;

use crate::error::AuthError;

/// Persists consumed nonces and reports replays.
pub struct NonceReplayGuard {
    store: Arc<dyn NonceStore>,
}

impl NonceReplayGuard {
    pub fn new(store: Arc<dyn NonceStore>) -> Self {
        Self { store }
    }

    /// Attempt to consume `(application_id, nonce)`.
    ///
    /// Returns `Ok(true)` if the nonce was not seen before, `Ok(false)` on
    /// replay. A replay is an expected outcome, not an error, and is never
    /// logged as one. Any other store failure propagates and the caller
    /// must fail the request closed: a nonce that cannot be recorded is a
    /// nonce that cannot be accepted.
    pub async fn try_consume(
        &self,
        application_id: Uuid,
        nonce: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        let record = NonceRecord {
            application_id,
            nonce: nonce.to_owned(),
            expires_at,
        };
        match self.store.try_insert(&record).await {
            Ok(()) => Ok(true),
            Err(StorageError::AlreadyExists { .. }) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration;
    use faultline_store::{MemoryNonceStore, StorageResult};

    #[tokio::test]
    async fn first_use_consumes_second_is_replay() {
        let guard = NonceReplayGuard::new(Arc::new(MemoryNonceStore::new()));
        let app = Uuid::new_v4();
        let expires = Utc::now() + Duration::minutes(5);

        assert!(guard.try_consume(app, "nonce-12345", expires).await.unwrap());
        assert!(!guard.try_consume(app, "nonce-12345", expires).await.unwrap());
    }

    #[tokio::test]
    async fn nonces_are_scoped_per_application() {
        let guard = NonceReplayGuard::new(Arc::new(MemoryNonceStore::new()));
        let expires = Utc::now() + Duration::minutes(5);

        assert!(guard
            .try_consume(Uuid::new_v4(), "shared-nonce", expires)
            .await
            .unwrap());
        assert!(guard
            .try_consume(Uuid::new_v4(), "shared-nonce", expires)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn concurrent_same_nonce_accepts_exactly_once() {
        let guard = Arc::new(NonceReplayGuard::new(Arc::new(MemoryNonceStore::new())));
        let app = Uuid::new_v4();
        let expires = Utc::now() + Duration::minutes(5);

        let mut handles = Vec::new();
        for _ in 0..16 {
            let guard = guard.clone();
            handles.push(tokio::spawn(async move {
                guard.try_consume(app, "contended-nonce", expires).await
            }));
        }
        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 1);
    }

    struct BrokenStore;

    #[async_trait]
    impl NonceStore for BrokenStore {
        async fn try_insert(&self, _record: &NonceRecord) -> StorageResult<()> {
            Err(StorageError::internal("backend unavailable"))
        }

        async fn purge_expired(&self, _now: DateTime<Utc>) -> StorageResult<u64> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn store_failure_is_hard_failure_not_replay() {
        let guard = NonceReplayGuard::new(Arc::new(BrokenStore));
        let result = guard
            .try_consume(Uuid::new_v4(), "nonce-12345", Utc::now())
            .await;
        // Neither accepted nor reported as replay: the request fails closed.
        assert!(matches!(result, Err(AuthError::Storage(_))));
    }
}
