use thiserror::Error;

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors produced by the persistence contracts.
///
/// `AlreadyExists` is load-bearing: it is the expected signal for nonce
/// replay detection and for the loser of a concurrent data-key creation
/// race. Callers must not log it as an error. Every other variant is a hard
/// failure and requests relying on the store must fail closed.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The requested record does not exist.
    #[error("record not found: {key}")]
    NotFound { key: String },

    /// A record with the same unique key already exists.
    ///
    /// Raised by the backing store's atomic uniqueness check, never by a
    /// check-then-insert sequence.
    #[error("record already exists: {key}")]
    AlreadyExists { key: String },

    /// Data could not be encoded for storage or decoded when read back.
    #[error("serialization error: {message}")]
    Serialization { message: String },

    /// Backend-specific failure that fits no other category.
    #[error("storage backend error: {message}")]
    Internal { message: String },
}

impl StorageError {
    /// Convenience constructor for [`StorageError::NotFound`].
    pub fn not_found(key: impl Into<String>) -> Self {
        StorageError::NotFound { key: key.into() }
    }

    /// Convenience constructor for [`StorageError::AlreadyExists`].
    pub fn already_exists(key: impl Into<String>) -> Self {
        StorageError::AlreadyExists { key: key.into() }
    }

    /// Convenience constructor for [`StorageError::Internal`].
    pub fn internal(message: impl Into<String>) -> Self {
        StorageError::Internal {
            message: message.into(),
        }
    }

    /// True when this error is the unique-constraint signal.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, StorageError::AlreadyExists { .. })
    }
}
