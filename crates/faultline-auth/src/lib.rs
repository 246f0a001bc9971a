//! Signed-request authentication for the faultline ingestion service.
//!
//! Client applications do not log in. Each holds a long-lived symmetric
//! secret, issued once and stored only envelope-wrapped, and proves every
//! write by HMAC-signing a canonical description of the request. Replay is
//! prevented by a per-request nonce consumed through the store's atomic
//! unique-insert.
//!
//! Entry point: [`SignedRequestAuthenticator`]. Secret lifecycle:
//! [`ApplicationSecretStore`]. Wire contract (header names, canonical
//! string): [`authenticator`] module constants.

pub mod authenticator;
pub mod error;
pub mod replay;
pub mod secrets;

pub use authenticator::{
    canonical_string, sign_canonical, AuthenticatedApp, SignedRequest,
    SignedRequestAuthenticator, CLOCK_SKEW_MS, HEADER_APP_ID, HEADER_KEY_VERSION, HEADER_NONCE,
    HEADER_SIGNATURE, HEADER_TIMESTAMP,
};
pub use error::AuthError;
pub use replay::NonceReplayGuard;
pub use secrets::{secret_context, ApplicationSecretStore, IssuedSecret, ResolvedSecret};
