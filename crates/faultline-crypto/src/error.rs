use faultline_store::StorageError;
use thiserror::Error;

/// Errors from the encryption-at-rest layer.
///
/// An `AuthFailed` or `BadFormat` on stored material is fatal for the
/// request that hit it: a row that is readable but will not decrypt under
/// the configured master key must stop processing, never fall back to
/// treating the bytes as plaintext, and never be retried as if transient.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key material had the wrong length.
    #[error("invalid key length: expected {expected} bytes, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    /// Blob is not valid base64 or has an impossible structure.
    #[error("malformed encrypted blob")]
    BadFormat,

    /// Blob is shorter than nonce + tag.
    #[error("encrypted blob too short")]
    DataTooShort,

    /// Authentication failed: wrong key, wrong context, or tampered data.
    #[error("decryption authentication failed")]
    AuthFailed,

    /// The underlying cipher rejected the operation.
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// Random number generation failed.
    #[error("random number generation failed: {0}")]
    RngFailed(String),

    /// Key persistence failed.
    #[error("key storage error: {0}")]
    Storage(#[from] StorageError),
}
