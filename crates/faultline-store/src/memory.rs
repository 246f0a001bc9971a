//! In-memory store implementations for tests and embedded use.
//!
//! All maps are guarded by `parking_lot` locks held only across the map
//! operation itself; the unique-insert contracts hold because the whole
//! insert happens under one write guard.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};
use crate::traits::{DataKeyStore, NonceStore, SecretStore};
use crate::types::{ApplicationDataKeyRecord, ApplicationSecretRecord, NonceRecord};

/// In-memory [`SecretStore`].
#[derive(Default)]
pub struct MemorySecretStore {
    records: RwLock<HashMap<(Uuid, u32), ApplicationSecretRecord>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn insert_secret(&self, record: &ApplicationSecretRecord) -> StorageResult<()> {
        let mut records = self.records.write();
        let key = (record.application_id, record.version);
        if records.contains_key(&key) {
            return Err(StorageError::already_exists(record.storage_key()));
        }
        records.insert(key, record.clone());
        Ok(())
    }

    async fn get_secret(
        &self,
        application_id: Uuid,
        version: u32,
    ) -> StorageResult<Option<ApplicationSecretRecord>> {
        Ok(self.records.read().get(&(application_id, version)).cloned())
    }

    async fn latest_version(&self, application_id: Uuid) -> StorageResult<Option<u32>> {
        Ok(self
            .records
            .read()
            .keys()
            .filter(|(app, _)| *app == application_id)
            .map(|(_, version)| *version)
            .max())
    }

    async fn set_active(
        &self,
        application_id: Uuid,
        version: u32,
        is_active: bool,
    ) -> StorageResult<()> {
        let mut records = self.records.write();
        match records.get_mut(&(application_id, version)) {
            Some(record) => {
                record.is_active = is_active;
                Ok(())
            }
            None => Err(StorageError::not_found(format!(
                "secrets/{application_id}:v{version}"
            ))),
        }
    }
}

/// In-memory [`DataKeyStore`].
#[derive(Default)]
pub struct MemoryDataKeyStore {
    records: RwLock<HashMap<(Uuid, u32), ApplicationDataKeyRecord>>,
}

impl MemoryDataKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DataKeyStore for MemoryDataKeyStore {
    async fn create_key(&self, record: &ApplicationDataKeyRecord) -> StorageResult<()> {
        let mut records = self.records.write();
        let key = (record.application_id, record.key_version);
        if records.contains_key(&key) {
            return Err(StorageError::already_exists(record.storage_key()));
        }
        records.insert(key, record.clone());
        Ok(())
    }

    async fn get_key(
        &self,
        application_id: Uuid,
        key_version: u32,
    ) -> StorageResult<Option<ApplicationDataKeyRecord>> {
        Ok(self
            .records
            .read()
            .get(&(application_id, key_version))
            .cloned())
    }
}

/// In-memory [`NonceStore`].
///
/// A record past its `expires_at` counts as absent: re-inserting it
/// succeeds. This matches the conceptual garbage collection: an expired
/// nonce is unusable anyway because the request timestamp window has
/// already closed.
#[derive(Default)]
pub struct MemoryNonceStore {
    records: RwLock<HashMap<(Uuid, String), DateTime<Utc>>>,
}

impl MemoryNonceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (non-expired) records. Test helper.
    pub fn len(&self) -> usize {
        let now = Utc::now();
        self.records
            .read()
            .values()
            .filter(|expires_at| **expires_at > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl NonceStore for MemoryNonceStore {
    async fn try_insert(&self, record: &NonceRecord) -> StorageResult<()> {
        let mut records = self.records.write();
        let key = (record.application_id, record.nonce.clone());
        if let Some(existing) = records.get(&key) {
            if *existing > Utc::now() {
                return Err(StorageError::already_exists(record.storage_key()));
            }
        }
        records.insert(key, record.expires_at);
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> StorageResult<u64> {
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|_, expires_at| *expires_at > now);
        Ok((before - records.len()) as u64)
    }
}
