/// Master key length in bytes (256 bits). Enforced at construction.
pub const MASTER_KEY_LENGTH: usize = 32;

/// Data/secret key length in bytes (256 bits).
pub const AES_KEY_LENGTH: usize = 32;

/// AES-GCM nonce length in bytes (96 bits per NIST recommendation).
pub const AES_GCM_NONCE_LENGTH: usize = 12;

/// AES-GCM tag length in bytes (128 bits).
pub const AES_GCM_TAG_LENGTH: usize = 16;

/// Smallest possible wrapped blob: nonce + tag with empty ciphertext.
pub const MIN_BLOB_LENGTH: usize = AES_GCM_NONCE_LENGTH + AES_GCM_TAG_LENGTH;
