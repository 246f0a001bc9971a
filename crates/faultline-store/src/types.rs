//! Record shapes persisted by the ingestion core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Minimum accepted nonce length in characters.
pub const NONCE_MIN_LEN: usize = 8;

/// Maximum accepted nonce length in characters.
pub const NONCE_MAX_LEN: usize = 128;

/// A versioned, wrapped signing secret for one application.
///
/// `(application_id, version)` is unique. Rows are never mutated after
/// insert except for the `is_active` flag; deactivating a version keeps its
/// history intact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationSecretRecord {
    pub application_id: Uuid,
    /// Version number, starting at 1. Rotation inserts `max + 1`.
    pub version: u32,
    /// Secret wrapped under the master key (base64 blob bytes).
    pub wrapped_secret: Vec<u8>,
    /// Whether this version may be used to verify requests.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// The wrapped data-encryption key for one application.
///
/// At most one record per `(application_id, key_version)`. The current
/// design only ever writes `key_version = 1`; the version column exists so
/// data-key rotation can be added later without a storage migration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationDataKeyRecord {
    pub application_id: Uuid,
    pub key_version: u32,
    /// Key wrapped under the master key (base64 blob bytes).
    pub wrapped_key: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

/// A consumed request nonce.
///
/// `(application_id, nonce)` is unique; a record is inserted exactly once
/// per accepted signed request and never updated. Garbage collection after
/// `expires_at` is a housekeeping concern outside the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NonceRecord {
    pub application_id: Uuid,
    pub nonce: String,
    pub expires_at: DateTime<Utc>,
}

impl ApplicationSecretRecord {
    /// Storage key for logging and error messages.
    pub fn storage_key(&self) -> String {
        format!("secrets/{}:v{}", self.application_id, self.version)
    }
}

impl ApplicationDataKeyRecord {
    /// Storage key for logging and error messages.
    pub fn storage_key(&self) -> String {
        format!("data-keys/{}:v{}", self.application_id, self.key_version)
    }
}

impl NonceRecord {
    /// Storage key for logging and error messages. The nonce itself is part
    /// of the uniqueness key and is not secret.
    pub fn storage_key(&self) -> String {
        format!("nonces/{}:{}", self.application_id, self.nonce)
    }
}
