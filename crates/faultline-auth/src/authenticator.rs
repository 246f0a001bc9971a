//! The signed-request authentication protocol.
//!
//! Clients hold a long-lived application secret and sign every write with
//! it. The signature covers the application identity, key version,
//! timestamp, nonce, HTTP method, the full path+query (including any
//! gateway prefix), and a SHA-256 hash of the exact body bytes, so a
//! captured request cannot be replayed against another path or resigned
//! with altered content.
//!
//! Verification order matters and is normative: cheap shape checks first,
//! then the signature, and the nonce is consumed only after the signature
//! matched. Consuming earlier would let an attacker burn a victim's nonce
//! with a garbage signature.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use faultline_store::{NONCE_MAX_LEN, NONCE_MIN_LEN};

use crate::error::AuthError;
use crate::replay::NonceReplayGuard;
use crate::secrets::ApplicationSecretStore;

type HmacSha256 = Hmac<Sha256>;

/// Request header carrying the application id (uuid).
pub const HEADER_APP_ID: &str = "X-App-Id";
/// Request header carrying the secret version (positive integer).
pub const HEADER_KEY_VERSION: &str = "X-Key-Version";
/// Request header carrying the unix-millisecond timestamp.
pub const HEADER_TIMESTAMP: &str = "X-Timestamp";
/// Request header carrying the nonce (8..=128 chars).
pub const HEADER_NONCE: &str = "X-Nonce";
/// Request header carrying the base64 HMAC-SHA256 signature.
pub const HEADER_SIGNATURE: &str = "X-Signature";

/// Accepted difference in milliseconds between request timestamp and
/// server time. Boundary inclusive: a request exactly this old is still
/// valid. Doubles as the nonce retention window: a nonce only needs to be
/// remembered while its timestamp could still pass this check.
pub const CLOCK_SKEW_MS: i64 = 5 * 60 * 1000;

/// One inbound write request, as read from transport metadata.
///
/// `body` must be the raw, unmodified bytes. The hash is computed before
/// any downstream parsing, so transports must buffer the body for re-read.
pub struct SignedRequest<'a> {
    pub app_id: &'a str,
    pub key_version: &'a str,
    pub timestamp: &'a str,
    pub nonce: &'a str,
    pub signature: &'a str,
    pub method: &'a str,
    /// Gateway prefix + path + query, exactly as the client signed it.
    pub path_and_query: &'a str,
    pub body: &'a [u8],
}

impl std::fmt::Debug for SignedRequest<'_> {
    // Manual impl so a debug-logged request never prints the signature.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedRequest")
            .field("app_id", &self.app_id)
            .field("key_version", &self.key_version)
            .field("timestamp", &self.timestamp)
            .field("nonce", &self.nonce)
            .field("signature", &"<redacted>")
            .field("method", &self.method)
            .field("path_and_query", &self.path_and_query)
            .field("body_len", &self.body.len())
            .finish()
    }
}

/// Identity established by a successful verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedApp {
    pub application_id: Uuid,
    pub key_version: u32,
}

/// Build the canonical string a signature covers.
///
/// Newline-joined, exactly seven fields, in this exact order. Any change
/// here is a wire-protocol break for every client.
pub fn canonical_string(
    app_id: &str,
    key_version: &str,
    timestamp: &str,
    nonce: &str,
    method: &str,
    path_and_query: &str,
    body: &[u8],
) -> String {
    let body_hash = hex::encode(Sha256::digest(body));
    format!(
        "{app_id}\n{key_version}\n{timestamp}\n{nonce}\n{method}\n{path_and_query}\n{body_hash}",
        method = method.to_uppercase(),
    )
}

/// Compute the base64 signature for a canonical string. Used by clients
/// and tests; the verifier recomputes this and compares in constant time.
pub fn sign_canonical(secret: &[u8], canonical: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret)
        .expect("HMAC-SHA256 accepts keys of any length");
    mac.update(canonical.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

/// Verifies signed write requests against stored application secrets.
pub struct SignedRequestAuthenticator {
    secrets: ApplicationSecretStore,
    replay: NonceReplayGuard,
}

impl SignedRequestAuthenticator {
    pub fn new(secrets: ApplicationSecretStore, replay: NonceReplayGuard) -> Self {
        Self { secrets, replay }
    }

    /// Authenticate a request against the current server time.
    pub async fn authenticate(
        &self,
        request: &SignedRequest<'_>,
    ) -> Result<AuthenticatedApp, AuthError> {
        self.authenticate_at(request, Utc::now()).await
    }

    /// Authenticate against an explicit `now`, for deterministic tests.
    pub async fn authenticate_at(
        &self,
        request: &SignedRequest<'_>,
        now: DateTime<Utc>,
    ) -> Result<AuthenticatedApp, AuthError> {
        match self.verify(request, now).await {
            Ok(identity) => {
                tracing::debug!(
                    application_id = %identity.application_id,
                    key_version = identity.key_version,
                    "signed request accepted"
                );
                Ok(identity)
            }
            Err(err) => {
                // Audit trail only; the client sees err.public_message().
                tracing::warn!(
                    app_id = request.app_id,
                    error = %err,
                    "signed request rejected"
                );
                Err(err)
            }
        }
    }

    async fn verify(
        &self,
        request: &SignedRequest<'_>,
        now: DateTime<Utc>,
    ) -> Result<AuthenticatedApp, AuthError> {
        // 1. Shape checks. Every failure is the same generic rejection
        //    externally; the field name feeds the audit log only.
        let application_id = Uuid::parse_str(request.app_id)
            .map_err(|_| AuthError::MalformedRequest { field: HEADER_APP_ID })?;
        let key_version: u32 = request
            .key_version
            .parse()
            .ok()
            .filter(|v| *v >= 1)
            .ok_or(AuthError::MalformedRequest {
                field: HEADER_KEY_VERSION,
            })?;
        let timestamp_ms: i64 = request.timestamp.parse().map_err(|_| {
            AuthError::MalformedRequest {
                field: HEADER_TIMESTAMP,
            }
        })?;
        if request.signature.is_empty() {
            return Err(AuthError::MalformedRequest {
                field: HEADER_SIGNATURE,
            });
        }
        if request.method.is_empty() {
            return Err(AuthError::MalformedRequest { field: "method" });
        }
        if !request.path_and_query.starts_with('/') {
            return Err(AuthError::MalformedRequest { field: "path" });
        }

        // 2. Clock-skew window, inclusive on the boundary.
        let skew = (now.timestamp_millis() - timestamp_ms).abs();
        if skew > CLOCK_SKEW_MS {
            return Err(AuthError::StaleTimestamp);
        }

        // 3. Nonce shape.
        let nonce_len = request.nonce.chars().count();
        if !(NONCE_MIN_LEN..=NONCE_MAX_LEN).contains(&nonce_len) {
            return Err(AuthError::InvalidNonce { length: nonce_len });
        }

        // 4–5. Body hash and canonical string.
        let canonical = canonical_string(
            request.app_id,
            request.key_version,
            request.timestamp,
            request.nonce,
            request.method,
            request.path_and_query,
            request.body,
        );

        // 6. Resolve the declared secret version.
        let resolved = self
            .secrets
            .resolve(application_id, key_version)
            .await?
            .filter(|secret| secret.is_active)
            .ok_or(AuthError::UnknownOrInactiveKeyVersion {
                application_id,
                version: key_version,
            })?;

        // 7–8. Constant-time signature comparison: one length check, then
        //    a full comparison with no early exit.
        let expected = sign_canonical(resolved.secret.as_bytes(), &canonical);
        if expected.len() != request.signature.len()
            || expected
                .as_bytes()
                .ct_eq(request.signature.as_bytes())
                .unwrap_u8()
                == 0
        {
            return Err(AuthError::InvalidSignature);
        }

        // 9. Consume the nonce only after the signature matched.
        let consumed = self
            .replay
            .try_consume(
                application_id,
                request.nonce,
                now + Duration::milliseconds(CLOCK_SKEW_MS),
            )
            .await?;
        if !consumed {
            return Err(AuthError::ReplayedNonce);
        }

        Ok(AuthenticatedApp {
            application_id,
            key_version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_string_has_exactly_seven_fields() {
        let canonical = canonical_string(
            "7e57ed11-0000-4000-8000-000000000000",
            "1",
            "1700000000000",
            "nonce-123",
            "post",
            "/api/v1/events",
            b"{}",
        );
        let fields: Vec<&str> = canonical.split('\n').collect();
        assert_eq!(fields.len(), 7);
        assert_eq!(fields[1], "1");
        assert_eq!(fields[4], "POST", "method is uppercased");
        assert_eq!(fields[5], "/api/v1/events");
        // SHA-256 of the body, lowercase hex.
        assert_eq!(fields[6], hex::encode(Sha256::digest(b"{}")));
    }

    #[test]
    fn canonical_string_covers_body_bytes_exactly() {
        let base = canonical_string("a", "1", "0", "n", "POST", "/p", b"{\"k\":1}");
        let altered = canonical_string("a", "1", "0", "n", "POST", "/p", b"{\"k\": 1}");
        assert_ne!(base, altered, "whitespace in the body changes the hash");
    }

    #[test]
    fn signature_is_deterministic_per_secret() {
        let canonical = "a\n1\n0\nnonce\nPOST\n/p\nabc";
        assert_eq!(
            sign_canonical(b"secret-a", canonical),
            sign_canonical(b"secret-a", canonical)
        );
        assert_ne!(
            sign_canonical(b"secret-a", canonical),
            sign_canonical(b"secret-b", canonical)
        );
    }

    #[test]
    fn debug_redacts_signature() {
        let request = SignedRequest {
            app_id: "app",
            key_version: "1",
            timestamp: "0",
            nonce: "nonce-123",
            signature: "super-secret-signature",
            method: "POST",
            path_and_query: "/p",
            body: b"",
        };
        let debug = format!("{request:?}");
        assert!(!debug.contains("super-secret-signature"));
        assert!(debug.contains("<redacted>"));
    }
}
