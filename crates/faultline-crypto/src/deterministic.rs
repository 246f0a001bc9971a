//! Deterministic encryption for exact-match lookup fields.
//!
//! **This cipher is intentionally not semantically secure.** It encrypts
//! with AES-256-CBC under a fixed all-zero IV, so equal plaintexts always
//! produce equal ciphertexts. That is the point: fields like the normalized
//! email address are the uniqueness/login key, and equality search against
//! stored ciphertexts only works if encryption is a pure function of
//! `(field_key, plaintext)`. The cost is that anyone who can read the
//! column learns which rows share a value.
//!
//! Existing stored data depends on this exact construction; changing it to
//! a randomized mode would break every lookup. Use it only for low-entropy,
//! non-secret-equivalent fields. Secrets and key material go through
//! [`crate::envelope`] instead, which uses fresh nonces.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sha2::{Digest, Sha256};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const ZERO_IV: [u8; 16] = [0u8; 16];

/// Derive the AES key for a field from its field key string.
fn derive_key(field_key: &str) -> [u8; 32] {
    Sha256::digest(field_key.as_bytes()).into()
}

/// Encrypt a lookup field deterministically.
///
/// Pure function of `(field_key, plaintext)`: the same inputs always
/// produce the same base64 ciphertext, and different field keys produce
/// unrelated ciphertexts for the same plaintext.
pub fn encrypt_deterministic(field_key: &str, plaintext: &str) -> String {
    let key = derive_key(field_key);
    let ciphertext = Aes256CbcEnc::new(&key.into(), &ZERO_IV.into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
    BASE64.encode(ciphertext)
}

/// Invert [`encrypt_deterministic`].
///
/// Returns `None` on malformed input (bad base64, wrong block length, bad
/// padding, non-UTF-8 plaintext) instead of an error: absent/garbage values
/// in lookup columns are a normal control-flow case for callers.
pub fn decrypt_deterministic(field_key: &str, blob: &str) -> Option<String> {
    let raw = BASE64.decode(blob).ok()?;
    if raw.is_empty() || raw.len() % 16 != 0 {
        return None;
    }
    let key = derive_key(field_key);
    let plaintext = Aes256CbcDec::new(&key.into(), &ZERO_IV.into())
        .decrypt_padded_vec_mut::<Pkcs7>(&raw)
        .ok()?;
    String::from_utf8(plaintext).ok()
}
