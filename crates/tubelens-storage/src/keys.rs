//! Cache key derivation.
//!
//! Identical logical requests must map to identical keys, so parameters
//! are serialized in sorted order before hashing.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

/// Stable key for a request of `kind` against `provider` with `params`.
///
/// Format: `{kind}:{sha256 hex}`, where the digest covers
/// `kind:provider:{params as sorted JSON}`.
pub fn cache_key(kind: &str, provider: &str, params: &BTreeMap<String, String>) -> String {
    // BTreeMap serializes in key order
    let params_json = serde_json::to_string(params).unwrap_or_default();
    let digest = Sha256::digest(format!("{}:{}:{}", kind, provider, params_json).as_bytes());
    format!("{}:{:x}", kind, digest)
}

/// Make a key safe to use as a file name.
///
/// Keeps `[A-Za-z0-9_:.-]` and replaces everything else with `_`.
pub fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | ':' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
