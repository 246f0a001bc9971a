use faultline_crypto::CryptoError;
use faultline_store::StorageError;
use thiserror::Error;
use uuid::Uuid;

/// Internal authentication error taxonomy.
///
/// The variants exist for audit logging; they all collapse to the same
/// generic response externally via [`public_message`](AuthError::public_message).
/// A caller must never echo the variant to the client; telling an attacker
/// *which* validation step failed is free information.
///
/// No variant carries the supplied signature or any secret material.
#[derive(Debug, Error)]
pub enum AuthError {
    /// A request field failed to parse or type-check.
    #[error("malformed request field: {field}")]
    MalformedRequest { field: &'static str },

    /// Timestamp outside the clock-skew window.
    #[error("stale or future timestamp")]
    StaleTimestamp,

    /// Nonce length outside the accepted range.
    #[error("invalid nonce length: {length}")]
    InvalidNonce { length: usize },

    /// Supplied signature does not match the canonical string.
    #[error("invalid signature")]
    InvalidSignature,

    /// Nonce already consumed within its validity window.
    #[error("nonce already used")]
    ReplayedNonce,

    /// No secret exists for the declared version, or it was deactivated.
    #[error("unknown or inactive key version {version} for application {application_id}")]
    UnknownOrInactiveKeyVersion {
        application_id: Uuid,
        version: u32,
    },

    /// Stored secret failed to unwrap (tampered row, wrong master key).
    /// Non-retryable: a corrupted secret is never "temporarily unavailable".
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// The backing store failed for a reason other than the expected
    /// unique-constraint signals. Fails the request closed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AuthError {
    /// The only classification callers may expose to clients.
    pub fn public_message(&self) -> &'static str {
        "unauthorized"
    }
}
