//! Encryption-at-rest layer for the faultline ingestion core.
//!
//! Three ciphers with three jobs:
//!
//! - [`envelope`]: wraps keys and secrets under the 256-bit master key
//!   (AES-256-GCM, context bound as associated data). Nothing sensitive is
//!   ever persisted unwrapped.
//! - [`data_cipher`]: one lazily-created data key per application, itself
//!   stored wrapped, used to encrypt stored message/payload text.
//! - [`deterministic`]: fixed-IV encryption for the few globally-unique
//!   lookup fields that must stay searchable. Deliberately trades semantic
//!   security for equality search; read that module's docs before use.

pub mod data_cipher;
pub mod deterministic;
pub mod envelope;
pub mod error;
pub mod types;

pub use data_cipher::{AppDataCipher, DATA_KEY_CONTEXT, DATA_KEY_VERSION, DEFAULT_KEY_TTL};
pub use deterministic::{decrypt_deterministic, encrypt_deterministic};
pub use envelope::{generate_key, EnvelopeKeyManager};
pub use error::CryptoError;
pub use types::{
    AES_GCM_NONCE_LENGTH, AES_GCM_TAG_LENGTH, AES_KEY_LENGTH, MASTER_KEY_LENGTH, MIN_BLOB_LENGTH,
};
