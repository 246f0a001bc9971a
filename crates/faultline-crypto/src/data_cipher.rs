//! Per-application data encryption.
//!
//! Stored message and payload text is never encrypted under the master key
//! directly. Each application gets its own 256-bit data key, created lazily
//! on first use and persisted wrapped through [`EnvelopeKeyManager`]. The
//! blast radius of one compromised data key is that application's stored
//! log bodies and nothing else.
//!
//! Unwrapped keys are cached in memory with a bounded TTL and capacity to
//! avoid an unwrap round-trip per request. There is no explicit
//! invalidation channel: data keys are never rotated in this design, so TTL
//! expiry is the only eviction. If rotation is ever added, the cache key
//! must become `(application_id, key_version)`.

use std::sync::Arc;
use std::time::Duration;

use aes_gcm::aead::KeyInit;
use aes_gcm::Aes256Gcm;
use chrono::Utc;
use faultline_store::{ApplicationDataKeyRecord, DataKeyStore, StorageError};
use moka::future::Cache;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::envelope::{generate_key, open_blob, seal_blob, EnvelopeKeyManager};
use crate::error::CryptoError;
use crate::types::AES_KEY_LENGTH;

/// Wrap context for application data keys.
pub const DATA_KEY_CONTEXT: &[u8] = b"app-encryption-key";

/// The only data-key version this design ever writes. The storage shape is
/// version-aware so rotation can be added without a migration.
pub const DATA_KEY_VERSION: u32 = 1;

/// Default TTL for cached unwrapped data keys (10 minutes).
pub const DEFAULT_KEY_TTL: Duration = Duration::from_secs(600);

/// Default maximum number of cached data keys.
pub const DEFAULT_KEY_CACHE_CAPACITY: u64 = 10_000;

/// Encrypts and decrypts stored payload text with per-application keys.
///
/// Blobs use the same `nonce ‖ tag ‖ ciphertext` base64 shape as envelope
/// wrapping, keyed by the application's data key instead of the master key.
///
/// Cloning is cheap and shares the cache.
#[derive(Clone)]
pub struct AppDataCipher {
    envelope: Arc<EnvelopeKeyManager>,
    store: Arc<dyn DataKeyStore>,
    keys: Cache<Uuid, Arc<Zeroizing<[u8; AES_KEY_LENGTH]>>>,
}

impl AppDataCipher {
    /// Create a cipher with the default cache TTL and capacity.
    pub fn new(envelope: Arc<EnvelopeKeyManager>, store: Arc<dyn DataKeyStore>) -> Self {
        Self::with_ttl(envelope, store, DEFAULT_KEY_TTL)
    }

    /// Create a cipher with a custom cache TTL.
    pub fn with_ttl(
        envelope: Arc<EnvelopeKeyManager>,
        store: Arc<dyn DataKeyStore>,
        ttl: Duration,
    ) -> Self {
        let keys = Cache::builder()
            .time_to_live(ttl)
            .max_capacity(DEFAULT_KEY_CACHE_CAPACITY)
            .build();
        Self {
            envelope,
            store,
            keys,
        }
    }

    /// Encrypt plaintext for storage under the application's data key.
    pub async fn encrypt(
        &self,
        application_id: Uuid,
        plaintext: &[u8],
    ) -> Result<String, CryptoError> {
        let key = self.data_key(application_id).await?;
        let cipher = Aes256Gcm::new_from_slice(&key[..])
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
        seal_blob(&cipher, plaintext, b"")
    }

    /// Decrypt a stored blob with the application's data key.
    pub async fn decrypt(
        &self,
        application_id: Uuid,
        blob: &str,
    ) -> Result<Vec<u8>, CryptoError> {
        let key = self.data_key(application_id).await?;
        let cipher = Aes256Gcm::new_from_slice(&key[..])
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
        open_blob(&cipher, blob, b"")
    }

    /// Fetch the application's data key, creating it on first use.
    ///
    /// Cache population may race between concurrent callers; both computed
    /// the same unwrapped value, so last-writer-wins is harmless.
    async fn data_key(
        &self,
        application_id: Uuid,
    ) -> Result<Arc<Zeroizing<[u8; AES_KEY_LENGTH]>>, CryptoError> {
        if let Some(key) = self.keys.get(&application_id).await {
            return Ok(key);
        }
        let key = self.load_or_create(application_id).await?;
        self.keys.insert(application_id, key.clone()).await;
        Ok(key)
    }

    async fn load_or_create(
        &self,
        application_id: Uuid,
    ) -> Result<Arc<Zeroizing<[u8; AES_KEY_LENGTH]>>, CryptoError> {
        let record = match self.store.get_key(application_id, DATA_KEY_VERSION).await? {
            Some(record) => record,
            None => self.create_key(application_id).await?,
        };

        let unwrapped = self.envelope.unwrap(
            std::str::from_utf8(&record.wrapped_key).map_err(|_| CryptoError::BadFormat)?,
            DATA_KEY_CONTEXT,
        )?;
        let key: [u8; AES_KEY_LENGTH] =
            unwrapped
                .as_slice()
                .try_into()
                .map_err(|_| CryptoError::InvalidKeyLength {
                    expected: AES_KEY_LENGTH,
                    got: unwrapped.len(),
                })?;
        Ok(Arc::new(Zeroizing::new(key)))
    }

    async fn create_key(
        &self,
        application_id: Uuid,
    ) -> Result<ApplicationDataKeyRecord, CryptoError> {
        let key = Zeroizing::new(generate_key()?);
        let wrapped = self.envelope.wrap(key.as_ref(), DATA_KEY_CONTEXT)?;
        let record = ApplicationDataKeyRecord {
            application_id,
            key_version: DATA_KEY_VERSION,
            wrapped_key: wrapped.into_bytes(),
            created_at: Utc::now(),
        };

        match self.store.create_key(&record).await {
            Ok(()) => {
                tracing::debug!(%application_id, "created application data key");
                Ok(record)
            }
            // A concurrent creator won the race; their key is the key.
            Err(StorageError::AlreadyExists { .. }) => self
                .store
                .get_key(application_id, DATA_KEY_VERSION)
                .await?
                .ok_or_else(|| {
                    CryptoError::Storage(StorageError::internal(
                        "data key vanished after losing creation race",
                    ))
                }),
            Err(err) => Err(err.into()),
        }
    }
}
