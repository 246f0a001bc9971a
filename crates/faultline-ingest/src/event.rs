//! Encrypted event record assembly.
//!
//! Business logic between the authenticator and the store: once a write is
//! authenticated, its message and payload are sealed under the
//! application's data key and the grouping fingerprint is computed from
//! the plaintext. Fingerprinting after encryption would be impossible,
//! and storing the plaintext alongside would defeat the cipher.

use chrono::{DateTime, Utc};
use faultline_crypto::{AppDataCipher, CryptoError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fingerprint::fingerprint;

/// An inbound error/telemetry event, decoded from an authenticated write.
#[derive(Debug, Clone, Deserialize)]
pub struct NewEvent {
    pub category: String,
    pub level: String,
    pub message: String,
    /// Structured payload (stack trace, request context, breadcrumbs).
    pub payload: Option<serde_json::Value>,
    /// Routing context the event was raised under, if any.
    pub route: Option<String>,
    /// Caller frame identifiers, outermost first.
    #[serde(default)]
    pub frames: Vec<String>,
    pub occurred_at: DateTime<Utc>,
}

/// The persisted shape of an event. Message and payload are stored only as
/// encrypted blobs; the fingerprint is the plaintext-derived grouping key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub application_id: Uuid,
    pub category: String,
    pub level: String,
    pub message_blob: String,
    pub payload_blob: Option<String>,
    pub fingerprint: String,
    pub occurred_at: DateTime<Utc>,
}

/// An event decrypted for a read path.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenedEvent {
    pub message: String,
    pub payload: Option<serde_json::Value>,
}

/// An activity ping. Pings carry no message or payload, so there is
/// nothing to encrypt; they only feed liveness tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingRecord {
    pub application_id: Uuid,
    pub received_at: DateTime<Utc>,
}

/// Seal an authenticated event for persistence.
pub async fn seal_event(
    cipher: &AppDataCipher,
    application_id: Uuid,
    event: &NewEvent,
) -> Result<EventRecord, CryptoError> {
    let fingerprint = fingerprint(
        application_id,
        &event.category,
        &event.level,
        event.route.as_deref(),
        &event.message,
        &event.frames,
    );

    let message_blob = cipher.encrypt(application_id, event.message.as_bytes()).await?;
    let payload_blob = match &event.payload {
        Some(payload) => {
            let bytes = serde_json::to_vec(payload)
                .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
            Some(cipher.encrypt(application_id, &bytes).await?)
        }
        None => None,
    };

    Ok(EventRecord {
        application_id,
        category: event.category.clone(),
        level: event.level.clone(),
        message_blob,
        payload_blob,
        fingerprint,
        occurred_at: event.occurred_at,
    })
}

/// Decrypt a stored event for a read path.
///
/// A record that decrypts but does not parse back is corrupt storage, not
/// a soft miss; it surfaces as a crypto failure.
pub async fn open_event(
    cipher: &AppDataCipher,
    record: &EventRecord,
) -> Result<OpenedEvent, CryptoError> {
    let message_bytes = cipher
        .decrypt(record.application_id, &record.message_blob)
        .await?;
    let message = String::from_utf8(message_bytes).map_err(|_| CryptoError::BadFormat)?;

    let payload = match &record.payload_blob {
        Some(blob) => {
            let bytes = cipher.decrypt(record.application_id, blob).await?;
            Some(serde_json::from_slice(&bytes).map_err(|_| CryptoError::BadFormat)?)
        }
        None => None,
    };

    Ok(OpenedEvent { message, payload })
}
