//! Envelope encryption under the master key.
//!
//! Every key and secret this system persists is stored wrapped: encrypted
//! with AES-256-GCM under a single 256-bit master key supplied at process
//! start. The wrap context is bound as associated data, so a blob wrapped
//! for one purpose (or one secret version) cannot be silently unwrapped as
//! another even if the raw bytes collide.
//!
//! Blob wire format, base64-encoded: `nonce(12) ‖ tag(16) ‖ ciphertext`.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::error::CryptoError;
use crate::types::{
    AES_GCM_NONCE_LENGTH, AES_GCM_TAG_LENGTH, AES_KEY_LENGTH, MASTER_KEY_LENGTH, MIN_BLOB_LENGTH,
};

/// Generate a random 256-bit key.
pub fn generate_key() -> Result<[u8; AES_KEY_LENGTH], CryptoError> {
    let mut key = [0u8; AES_KEY_LENGTH];
    getrandom::getrandom(&mut key).map_err(|e| CryptoError::RngFailed(e.to_string()))?;
    Ok(key)
}

fn generate_nonce() -> Result<[u8; AES_GCM_NONCE_LENGTH], CryptoError> {
    let mut nonce = [0u8; AES_GCM_NONCE_LENGTH];
    getrandom::getrandom(&mut nonce).map_err(|e| CryptoError::RngFailed(e.to_string()))?;
    Ok(nonce)
}

/// Encrypt `plaintext` into the `nonce ‖ tag ‖ ciphertext` base64 blob.
///
/// Shared by master-key wrapping and the per-application data cipher; the
/// two differ only in which key the cipher holds and what goes into `aad`.
pub(crate) fn seal_blob(
    cipher: &Aes256Gcm,
    plaintext: &[u8],
    aad: &[u8],
) -> Result<String, CryptoError> {
    let nonce = generate_nonce()?;
    let sealed = cipher
        .encrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    // aes-gcm appends the tag; the wire format wants it up front.
    let tag_start = sealed.len() - AES_GCM_TAG_LENGTH;
    let mut blob = Vec::with_capacity(AES_GCM_NONCE_LENGTH + sealed.len());
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&sealed[tag_start..]);
    blob.extend_from_slice(&sealed[..tag_start]);
    Ok(BASE64.encode(blob))
}

/// Decrypt a `nonce ‖ tag ‖ ciphertext` base64 blob.
pub(crate) fn open_blob(
    cipher: &Aes256Gcm,
    blob: &str,
    aad: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let raw = BASE64.decode(blob).map_err(|_| CryptoError::BadFormat)?;
    if raw.len() < MIN_BLOB_LENGTH {
        return Err(CryptoError::DataTooShort);
    }
    let nonce = &raw[..AES_GCM_NONCE_LENGTH];
    let tag = &raw[AES_GCM_NONCE_LENGTH..MIN_BLOB_LENGTH];
    let ciphertext = &raw[MIN_BLOB_LENGTH..];

    // Reassemble ciphertext ‖ tag, the layout the cipher expects.
    let mut sealed = Vec::with_capacity(ciphertext.len() + AES_GCM_TAG_LENGTH);
    sealed.extend_from_slice(ciphertext);
    sealed.extend_from_slice(tag);

    cipher
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: &sealed,
                aad,
            },
        )
        .map_err(|_| CryptoError::AuthFailed)
}

/// Wraps and unwraps keys and secrets under the master key.
///
/// The master key is an explicit constructor input, never ambient state, so
/// the crypto boundary stays testable with injected keys. It is never
/// persisted by this subsystem.
pub struct EnvelopeKeyManager {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for EnvelopeKeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvelopeKeyManager")
            .field("cipher", &"<redacted>")
            .finish()
    }
}

impl EnvelopeKeyManager {
    /// Create a manager from the 32-byte master key.
    ///
    /// Fails fast on any other length; a misconfigured master key must stop
    /// the process at startup, not surface per-request.
    pub fn new(master_key: &[u8]) -> Result<Self, CryptoError> {
        if master_key.len() != MASTER_KEY_LENGTH {
            return Err(CryptoError::InvalidKeyLength {
                expected: MASTER_KEY_LENGTH,
                got: master_key.len(),
            });
        }
        let cipher = Aes256Gcm::new_from_slice(master_key)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
        Ok(Self { cipher })
    }

    /// Wrap `plaintext` for storage at rest.
    ///
    /// `context` must differ per use-site (`app-encryption-key` for data
    /// keys, `app-secret:v{version}` for signing secrets); it is bound as
    /// associated data and checked again on unwrap.
    pub fn wrap(&self, plaintext: &[u8], context: &[u8]) -> Result<String, CryptoError> {
        seal_blob(&self.cipher, plaintext, context)
    }

    /// Unwrap a blob previously produced by [`wrap`](Self::wrap) with the
    /// same context.
    ///
    /// # Errors
    ///
    /// `BadFormat` / `DataTooShort` for malformed blobs, `AuthFailed` when
    /// the master key or context does not match or the blob was tampered
    /// with.
    pub fn unwrap(&self, blob: &str, context: &[u8]) -> Result<Vec<u8>, CryptoError> {
        open_blob(&self.cipher, blob, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> EnvelopeKeyManager {
        EnvelopeKeyManager::new(&[0x42u8; 32]).unwrap()
    }

    #[test]
    fn rejects_short_master_key() {
        let err = EnvelopeKeyManager::new(&[0u8; 16]).unwrap_err();
        assert!(matches!(
            err,
            CryptoError::InvalidKeyLength {
                expected: 32,
                got: 16
            }
        ));
        assert!(EnvelopeKeyManager::new(&[0u8; 33]).is_err());
    }

    #[test]
    fn wrap_unwrap_round_trip() {
        let m = manager();
        for len in [0usize, 1, 16, 31, 32, 33, 1024, 4096] {
            let plaintext = vec![0xABu8; len];
            let blob = m.wrap(&plaintext, b"test-context").unwrap();
            let unwrapped = m.unwrap(&blob, b"test-context").unwrap();
            assert_eq!(unwrapped, plaintext, "length {len}");
        }
    }

    #[test]
    fn blob_layout_is_nonce_tag_ciphertext() {
        let m = manager();
        let blob = m.wrap(b"hello", b"ctx").unwrap();
        let raw = BASE64.decode(blob).unwrap();
        assert_eq!(raw.len(), 12 + 16 + 5);
    }

    #[test]
    fn fresh_nonce_per_call() {
        let m = manager();
        let a = m.wrap(b"same bytes", b"ctx").unwrap();
        let b = m.wrap(b"same bytes", b"ctx").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_context_fails_authentication() {
        let m = manager();
        let blob = m.wrap(b"secret-v1", b"app-secret:v1").unwrap();
        let err = m.unwrap(&blob, b"app-secret:v2").unwrap_err();
        assert!(matches!(err, CryptoError::AuthFailed));
    }

    #[test]
    fn wrong_master_key_fails_authentication() {
        let blob = manager().wrap(b"payload", b"ctx").unwrap();
        let other = EnvelopeKeyManager::new(&[0x43u8; 32]).unwrap();
        assert!(matches!(
            other.unwrap(&blob, b"ctx").unwrap_err(),
            CryptoError::AuthFailed
        ));
    }

    #[test]
    fn tampered_blob_fails_authentication() {
        let m = manager();
        let blob = m.wrap(b"payload", b"ctx").unwrap();
        let mut raw = BASE64.decode(&blob).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let tampered = BASE64.encode(raw);
        assert!(matches!(
            m.unwrap(&tampered, b"ctx").unwrap_err(),
            CryptoError::AuthFailed
        ));
    }

    #[test]
    fn malformed_base64_is_bad_format() {
        let err = manager().unwrap("not base64!!!", b"ctx").unwrap_err();
        assert!(matches!(err, CryptoError::BadFormat));
    }

    #[test]
    fn truncated_blob_is_too_short() {
        let short = BASE64.encode([0u8; 27]);
        let err = manager().unwrap(&short, b"ctx").unwrap_err();
        assert!(matches!(err, CryptoError::DataTooShort));
    }

    #[test]
    fn generated_keys_are_unique() {
        assert_ne!(generate_key().unwrap(), generate_key().unwrap());
    }
}
