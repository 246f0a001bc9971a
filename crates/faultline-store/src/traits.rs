//! Persistence contracts the ingestion core depends on.
//!
//! Implementations can use different backends (SQLite for production,
//! in-memory for tests) behind the same interface. Two contracts are hard
//! requirements on any backend:
//!
//! - `SecretStore::insert_secret` and `DataKeyStore::create_key` must
//!   enforce their uniqueness constraints atomically and report violations
//!   as [`StorageError::AlreadyExists`].
//! - `NonceStore::try_insert` must be an atomic unique-insert on
//!   `(application_id, nonce)`. Replay detection is built entirely on this
//!   property; a backend that checks then inserts is not a valid
//!   implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StorageResult;
use crate::types::{ApplicationDataKeyRecord, ApplicationSecretRecord, NonceRecord};

/// Persistence for versioned application signing secrets.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Inserts a new secret version.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` if `(application_id, version)` is already present.
    async fn insert_secret(&self, record: &ApplicationSecretRecord) -> StorageResult<()>;

    /// Fetches one secret version, or `None` if it was never issued.
    async fn get_secret(
        &self,
        application_id: Uuid,
        version: u32,
    ) -> StorageResult<Option<ApplicationSecretRecord>>;

    /// Highest version ever issued for the application, or `None` if the
    /// application has no secrets yet.
    async fn latest_version(&self, application_id: Uuid) -> StorageResult<Option<u32>>;

    /// Toggles the active flag of one version without deleting history.
    ///
    /// # Errors
    ///
    /// `NotFound` if the version does not exist.
    async fn set_active(
        &self,
        application_id: Uuid,
        version: u32,
        is_active: bool,
    ) -> StorageResult<()>;
}

/// Persistence for per-application data-encryption keys.
#[async_trait]
pub trait DataKeyStore: Send + Sync {
    /// Inserts the data key for an application.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` if a key for `(application_id, key_version)` is
    /// already present. The loser of a concurrent creation race receives
    /// this and should re-read instead of failing the request.
    async fn create_key(&self, record: &ApplicationDataKeyRecord) -> StorageResult<()>;

    /// Fetches the data key for an application, or `None` if none was
    /// created yet.
    async fn get_key(
        &self,
        application_id: Uuid,
        key_version: u32,
    ) -> StorageResult<Option<ApplicationDataKeyRecord>>;
}

/// Persistence for consumed request nonces.
#[async_trait]
pub trait NonceStore: Send + Sync {
    /// Atomically inserts a nonce record.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` if `(application_id, nonce)` was already consumed
    /// (the replay signal). Any other error is a hard failure.
    async fn try_insert(&self, record: &NonceRecord) -> StorageResult<()>;

    /// Deletes records whose `expires_at` is at or before `now`; returns
    /// the number removed. Housekeeping only; the core never calls this on
    /// the request path.
    async fn purge_expired(&self, now: DateTime<Utc>) -> StorageResult<u64>;
}
