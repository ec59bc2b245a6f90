//! Shared newtypes used across the engine

use std::fmt;

/// Canonical identity of a cacheable request: the HTTP method qualified URL.
///
/// Two requests share a cache entry only if both method and URL match,
/// so a `GET /room/5/` never collides with a `HEAD /room/5/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Build a key from a method name and URL
    pub fn new(method: &str, url: &str) -> Self {
        Self(format!("{} {}", method, url))
    }

    /// Get the key as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
