//! Content-addressed cache keys for resolved ad responses
//!
//! Keys are the lowercase hex SHA-256 of the canonical JSON object
//! `{"args": [...], "kwargs": {...}}` with kwargs keys sorted, so the same
//! parameters supplied in any order always derive the same key.

use crate::error::{CacheError, CacheResult};
use serde_json::Value;
use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

/// Builder for deterministic response cache keys
///
/// Positional values go through [`ResponseKey::arg`], named values through
/// [`ResponseKey::kwarg`]. Named values are held in a sorted map, so insertion
/// order never affects the digest.
#[derive(Debug, Clone, Default)]
pub struct ResponseKey {
    args: Vec<Value>,
    kwargs: BTreeMap<String, Value>,
}

impl ResponseKey {
    /// Create an empty key builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional value
    #[must_use]
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Add a named value
    #[must_use]
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(name.into(), value.into());
        self
    }

    /// Derive the lowercase hex SHA-256 digest of the canonical encoding
    pub fn hex_digest(&self) -> CacheResult<String> {
        let canonical = serde_json::json!({
            "args": self.args,
            "kwargs": self.kwargs,
        });
        let encoded = serde_json::to_vec(&canonical)
            .map_err(|e| CacheError::Serialization(e.to_string()))?;

        let mut hasher = Sha256::new();
        hasher.update(&encoded);
        Ok(hex::encode(hasher.finalize()))
    }
}

/// Derive a cache key from named parameters only
///
/// Convenience wrapper for the common case where every parameter is named.
pub fn generate_key<I, K, V>(params: I) -> CacheResult<String>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    let mut key = ResponseKey::new();
    for (name, value) in params {
        key = key.kwarg(name, value);
    }
    key.hex_digest()
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_order_independence() {
        let a = generate_key([("a", 1), ("b", 2)]).expect("Operation should succeed");
        let b = generate_key([("b", 2), ("a", 1)]).expect("Operation should succeed");
        assert_eq!(a, b);
    }

    #[test]
    fn test_distinct_params_distinct_keys() {
        let a = generate_key([("a", 1), ("b", 2)]).expect("Operation should succeed");
        let b = generate_key([("a", 1), ("b", 3)]).expect("Operation should succeed");
        assert_ne!(a, b);
    }

    #[test]
    fn test_args_and_kwargs_both_contribute() {
        let args_only = ResponseKey::new()
            .arg("vast")
            .hex_digest()
            .expect("Operation should succeed");
        let with_kwarg = ResponseKey::new()
            .arg("vast")
            .kwarg("user_id", "alice")
            .hex_digest()
            .expect("Operation should succeed");
        assert_ne!(args_only, with_kwarg);
    }

    #[test]
    fn test_digest_is_lowercase_hex_sha256() {
        let digest = generate_key([("a", 1)]).expect("Operation should succeed");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(digest, digest.to_lowercase());
    }

    #[test]
    fn test_known_canonical_encoding() {
        // {"args":[],"kwargs":{"a":1,"b":2}} hashed with SHA-256
        let digest = generate_key([("b", 2), ("a", 1)]).expect("Operation should succeed");

        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(br#"{"args":[],"kwargs":{"a":1,"b":2}}"#);
        assert_eq!(digest, hex::encode(hasher.finalize()));
    }

    #[test]
    fn test_mixed_value_types() {
        let digest = ResponseKey::new()
            .kwarg("user_id", "alice")
            .kwarg("width", 640)
            .kwarg("secure", true)
            .hex_digest()
            .expect("Operation should succeed");
        assert_eq!(digest.len(), 64);
    }
}
