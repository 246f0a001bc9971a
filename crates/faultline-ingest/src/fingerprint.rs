//! Stable fingerprints for grouping duplicate error events.
//!
//! Two occurrences of the "same" error rarely carry byte-identical
//! messages: ids, emails, URLs, and counters differ per occurrence. The
//! fingerprint normalizes those volatile literals to a placeholder before
//! hashing, so `user 123 not found` and `user 456 not found` group
//! together. That collapse is the intended deduplication behavior.
//!
//! Fingerprints are grouping keys only, never security decisions.

use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Replacement token for volatile literals in messages.
const PLACEHOLDER: &str = "*";

/// Maximum number of structural frames that participate in the hash.
const MAX_FRAMES: usize = 3;

/// Frame prefixes belonging to platforms/runtimes rather than the
/// application. Filtered out so a runtime upgrade does not regroup every
/// event. Callers supply identifier names, not line numbers, for the same
/// reason.
const RUNTIME_FRAME_PREFIXES: &[&str] = &[
    "System.",
    "Microsoft.",
    "java.",
    "javax.",
    "kotlin.",
    "android.",
    "node:internal",
    "std::",
    "core::",
    "alloc::",
    "tokio::",
];

// Order matters: UUIDs and URLs contain bare integers and would be
// shredded if integers were replaced first.
static UUID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .expect("uuid regex")
});
static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}").expect("email regex"));
static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s]+").expect("url regex"));
static INTEGER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d+\b").expect("int regex"));
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("ws regex"));

/// Normalize a log message for fingerprinting: volatile literals become
/// placeholders, whitespace collapses, ends are trimmed.
pub fn normalize_message(message: &str) -> String {
    let msg = UUID_RE.replace_all(message, PLACEHOLDER);
    let msg = EMAIL_RE.replace_all(&msg, PLACEHOLDER);
    let msg = URL_RE.replace_all(&msg, PLACEHOLDER);
    let msg = INTEGER_RE.replace_all(&msg, PLACEHOLDER);
    let msg = WHITESPACE_RE.replace_all(&msg, " ");
    msg.trim().to_owned()
}

/// Keep the first [`MAX_FRAMES`] application frames, dropping
/// platform/runtime internals.
fn structural_frames(frames: &[String]) -> Vec<&str> {
    frames
        .iter()
        .map(String::as_str)
        .filter(|frame| {
            !RUNTIME_FRAME_PREFIXES
                .iter()
                .any(|prefix| frame.starts_with(prefix))
        })
        .take(MAX_FRAMES)
        .collect()
}

/// Compute the grouping fingerprint for an event.
///
/// Pure function: equal inputs (after message normalization and frame
/// filtering) always hash to the same lowercase-hex SHA-256.
///
/// `route` is the routing context the event was raised under (an HTTP
/// route or transaction name), empty when the event has none.
pub fn fingerprint(
    application_id: Uuid,
    category: &str,
    level: &str,
    route: Option<&str>,
    message: &str,
    frames: &[String],
) -> String {
    let normalized = normalize_message(message);
    let frames = structural_frames(frames).join(">");
    let input = format!(
        "{application_id}|{category}|{level}|{route}|{normalized}|{frames}",
        route = route.unwrap_or(""),
    );
    hex::encode(Sha256::digest(input.as_bytes()))
}
