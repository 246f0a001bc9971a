//! Record shapes and persistence contracts for the faultline ingestion core.
//!
//! The core never talks to a database directly; it goes through the traits
//! in [`traits`]. Production deployments use the SQLite implementation (the
//! `sqlite` feature, on by default); tests use the in-memory stores.
//!
//! The one property every backend must provide is an **atomic
//! unique-insert**: replay detection and the data-key creation race both
//! resolve through the store's uniqueness constraint, not through
//! in-process locking. See [`traits::NonceStore`].

pub mod error;
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod traits;
pub mod types;

pub use error::{StorageError, StorageResult};
pub use memory::{MemoryDataKeyStore, MemoryNonceStore, MemorySecretStore};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
pub use traits::{DataKeyStore, NonceStore, SecretStore};
pub use types::{
    ApplicationDataKeyRecord, ApplicationSecretRecord, NonceRecord, NONCE_MAX_LEN, NONCE_MIN_LEN,
};
