//! Per-request session context
//!
//! A [`SessionContext`] is created once per logical ad request and never
//! mutated afterwards. It carries the identifiers used for macro substitution
//! and log correlation. The cookie map is frozen at construction; deriving a
//! context with an extra cookie copies the map rather than mutating it.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Immutable per-request session state
#[derive(Debug, Clone)]
pub struct SessionContext {
    timestamp_ms: u64,
    correlator: Uuid,
    cachebusting: Uuid,
    cookies: Arc<BTreeMap<String, String>>,
    request_id: String,
}

impl SessionContext {
    /// Create a fresh context stamped with the current time
    pub fn new() -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        let correlator = Uuid::new_v4();

        Self {
            timestamp_ms,
            correlator,
            cachebusting: Uuid::new_v4(),
            cookies: Arc::new(BTreeMap::new()),
            request_id: correlator.to_string(),
        }
    }

    /// Create a context with an explicit request id and cookie set
    pub fn with_request(request_id: impl Into<String>, cookies: BTreeMap<String, String>) -> Self {
        Self {
            request_id: request_id.into(),
            cookies: Arc::new(cookies),
            ..Self::new()
        }
    }

    /// Unix timestamp in milliseconds at context creation
    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    /// Correlation id shared across every call made for this request
    pub fn correlator(&self) -> Uuid {
        self.correlator
    }

    /// Stable per-session cachebusting id
    pub fn cachebusting(&self) -> Uuid {
        self.cachebusting
    }

    /// Cookie value, if present
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// The frozen cookie map
    pub fn cookies(&self) -> &BTreeMap<String, String> {
        &self.cookies
    }

    /// Request identifier for logging
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Derive a context carrying one additional cookie (copy-on-write)
    #[must_use]
    pub fn with_cookie(&self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut cookies = (*self.cookies).clone();
        cookies.insert(name.into(), value.into());
        Self {
            cookies: Arc::new(cookies),
            ..self.clone()
        }
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_contexts_have_distinct_correlators() {
        let a = SessionContext::new();
        let b = SessionContext::new();
        assert_ne!(a.correlator(), b.correlator());
        assert_ne!(a.cachebusting(), b.cachebusting());
    }

    #[test]
    fn test_request_id_defaults_to_correlator() {
        let ctx = SessionContext::new();
        assert_eq!(ctx.request_id(), ctx.correlator().to_string());
    }

    #[test]
    fn test_with_cookie_is_copy_on_write() {
        let base = SessionContext::with_request(
            "req-1",
            BTreeMap::from([("sid".to_string(), "abc".to_string())]),
        );
        let derived = base.with_cookie("uid", "42");

        assert!(base.cookie("uid").is_none());
        assert_eq!(derived.cookie("uid"), Some("42"));
        assert_eq!(derived.cookie("sid"), Some("abc"));
        assert_eq!(derived.request_id(), "req-1");
        // Identity fields carry over unchanged
        assert_eq!(base.correlator(), derived.correlator());
        assert_eq!(base.timestamp_ms(), derived.timestamp_ms());
    }
}
