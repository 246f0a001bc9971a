//! Versioned application signing secrets.
//!
//! Secrets are minted here, stored only in wrapped form, and handed to the
//! client exactly once at issue/rotate time. There is no way to read a
//! plaintext secret back out of storage later except by unwrapping it for
//! signature verification. Multiple versions can be valid concurrently;
//! each can be deactivated independently without deleting history.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use faultline_crypto::{CryptoError, EnvelopeKeyManager};
use faultline_store::{ApplicationSecretRecord, SecretStore};
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::AuthError;

/// Wrap context for a signing secret of a given version.
///
/// Version is part of the context, so a v1 blob can never unwrap as v2
/// even if the stored bytes were swapped.
pub fn secret_context(version: u32) -> Vec<u8> {
    format!("app-secret:v{version}").into_bytes()
}

/// A freshly minted secret. The `secret` field is the only copy of the
/// plaintext that will ever exist outside the client; it is zeroized when
/// this value drops.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct IssuedSecret {
    /// Base64 plaintext the client will sign with. Show it once.
    pub secret: String,
    pub version: u32,
}

impl std::fmt::Debug for IssuedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedSecret")
            .field("secret", &"<redacted>")
            .field("version", &self.version)
            .finish()
    }
}

/// A secret unwrapped for verification.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ResolvedSecret {
    /// Base64 plaintext; its bytes are the HMAC key.
    pub secret: String,
    pub is_active: bool,
}

impl std::fmt::Debug for ResolvedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecret")
            .field("secret", &"<redacted>")
            .field("is_active", &self.is_active)
            .finish()
    }
}

/// Issues, rotates, deactivates, and resolves application signing secrets.
pub struct ApplicationSecretStore {
    envelope: Arc<EnvelopeKeyManager>,
    store: Arc<dyn SecretStore>,
}

impl ApplicationSecretStore {
    pub fn new(envelope: Arc<EnvelopeKeyManager>, store: Arc<dyn SecretStore>) -> Self {
        Self { envelope, store }
    }

    /// Issue the application's first secret (version 1).
    ///
    /// Fails with the store's uniqueness error if the application already
    /// has a version 1. Issuing is a create-time operation, not an upsert.
    pub async fn issue(&self, application_id: Uuid) -> Result<IssuedSecret, AuthError> {
        self.mint(application_id, 1).await
    }

    /// Mint the next secret version. Existing versions stay valid until
    /// explicitly deactivated.
    pub async fn rotate(&self, application_id: Uuid) -> Result<IssuedSecret, AuthError> {
        let latest = self.store.latest_version(application_id).await?.unwrap_or(0);
        self.mint(application_id, latest + 1).await
    }

    /// Toggle whether a version may verify requests. History is never
    /// deleted; a deactivated version can be reactivated.
    pub async fn set_active(
        &self,
        application_id: Uuid,
        version: u32,
        is_active: bool,
    ) -> Result<(), AuthError> {
        self.store
            .set_active(application_id, version, is_active)
            .await?;
        tracing::info!(%application_id, version, is_active, "secret version toggled");
        Ok(())
    }

    /// Unwrap one secret version for verification, or `None` if it was
    /// never issued.
    ///
    /// Deliberately uncached: secrets change activation state and callers
    /// on the hot path are expected to tolerate one unwrap per request.
    pub async fn resolve(
        &self,
        application_id: Uuid,
        version: u32,
    ) -> Result<Option<ResolvedSecret>, AuthError> {
        let record = match self.store.get_secret(application_id, version).await? {
            Some(record) => record,
            None => return Ok(None),
        };

        let blob =
            std::str::from_utf8(&record.wrapped_secret).map_err(|_| CryptoError::BadFormat)?;
        let plaintext = self.envelope.unwrap(blob, &secret_context(version))?;
        let secret = String::from_utf8(plaintext).map_err(|_| CryptoError::BadFormat)?;
        Ok(Some(ResolvedSecret {
            secret,
            is_active: record.is_active,
        }))
    }

    async fn mint(&self, application_id: Uuid, version: u32) -> Result<IssuedSecret, AuthError> {
        let mut raw = [0u8; 32];
        getrandom::getrandom(&mut raw)
            .map_err(|e| CryptoError::RngFailed(e.to_string()))?;
        let secret = BASE64.encode(raw);
        raw.zeroize();

        let wrapped = self
            .envelope
            .wrap(secret.as_bytes(), &secret_context(version))?;
        self.store
            .insert_secret(&ApplicationSecretRecord {
                application_id,
                version,
                wrapped_secret: wrapped.into_bytes(),
                is_active: true,
                created_at: Utc::now(),
            })
            .await?;

        tracing::info!(%application_id, version, "issued signing secret");
        Ok(IssuedSecret { secret, version })
    }
}
