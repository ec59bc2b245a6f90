//! Request/response model for the single-origin request path
//!
//! Bodies are plain byte buffers so the health classifier can inspect a
//! response without consuming what the caller receives. Synthetic
//! responses (offline placeholder, structured offline error, resource
//! unavailable) are constructed here so every fallback path produces a
//! clearly labeled result instead of a silent empty body.

use crate::types::CacheKey;
use serde::Serialize;
use std::borrow::Cow;
use std::collections::HashMap;

/// HTTP method subset used by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// Method name in wire form
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Parse a method name (case-insensitive); unknown names map to None
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Some(Self::Get),
            "HEAD" => Some(Self::Head),
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            "PATCH" => Some(Self::Patch),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }

    /// Whether this method mutates origin state (never cached)
    #[must_use]
    pub fn is_mutation(&self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch | Self::Delete)
    }
}

/// An outbound request against the single configured origin
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// Origin-relative URL, e.g. `/room/5/`
    pub url: String,
    pub headers: HashMap<String, String>,
    /// JSON payload for mutating requests
    pub payload: Option<serde_json::Value>,
}

impl Request {
    /// Create a request with no headers or payload
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            payload: None,
        }
    }

    /// Convenience constructor for GET requests
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    /// Builder-style header attachment
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Builder-style payload attachment
    #[must_use]
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Look up a header by case-insensitive name
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Whether the client accepts an HTML document in response
    #[must_use]
    pub fn accepts_html(&self) -> bool {
        self.header("accept").is_some_and(|v| v.contains("text/html"))
    }

    /// Canonical cache identity for this request
    #[must_use]
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(self.method.as_str(), &self.url)
    }
}

/// Where a response body actually came from.
///
/// The host UI uses this to distinguish fresh data from cached data, and
/// cached-because-offline from cached-because-server-down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedFrom {
    /// Fresh response from the origin
    Network,
    /// Cache hit on the normal cache-first path
    Cache,
    /// Cache fallback because the origin is failing behind a live transport
    CacheServerOffline,
    /// Cache fallback because the network itself is unreachable
    CacheNetworkOffline,
    /// The designated offline placeholder page
    OfflinePlaceholder,
    /// Synthesized by the engine (no origin and no cache)
    Synthetic,
}

impl ServedFrom {
    /// Marker value exposed to the host (mirrors an `X-Served-From` header)
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Cache => "cache",
            Self::CacheServerOffline => "cache-server-offline",
            Self::CacheNetworkOffline => "cache-network-offline",
            Self::OfflinePlaceholder => "offline-placeholder",
            Self::Synthetic => "synthetic",
        }
    }

    /// True for any variant that did not come from a live origin response
    #[must_use]
    pub fn is_from_cache(&self) -> bool {
        !matches!(self, Self::Network | Self::Synthetic)
    }
}

/// Body of the structured offline error response
#[derive(Debug, Serialize)]
struct OfflineErrorBody<'a> {
    error: &'a str,
    message: &'a str,
    cached: bool,
}

/// A response flowing back to the caller
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub served_from: ServedFrom,
}

impl Response {
    /// Create a fresh network response
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Vec::new(),
            served_from: ServedFrom::Network,
        }
    }

    /// Builder-style header attachment
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Builder-style body attachment
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Mark where this response was served from
    #[must_use]
    pub fn served_from(mut self, source: ServedFrom) -> Self {
        self.served_from = source;
        self
    }

    /// Look up a header by case-insensitive name
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Whether the status is in the 2xx range
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Content type header, if present
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Whether the response claims to carry an HTML document
    #[must_use]
    pub fn is_html(&self) -> bool {
        self.content_type().is_some_and(|ct| ct.contains("text/html"))
    }

    /// Body decoded as UTF-8, lossily.
    ///
    /// Reads from the buffer without consuming it; the classifier and the
    /// downstream caller can both inspect the same response.
    #[must_use]
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Whether this response came from any cache layer
    #[must_use]
    pub fn from_cache(&self) -> bool {
        self.served_from.is_from_cache()
    }

    /// Synthetic 503 for a cache-first miss whose network fetch failed.
    ///
    /// Cache-first never falls through to stale data: if the entry existed
    /// it would already have been served.
    #[must_use]
    pub fn resource_unavailable() -> Self {
        Self::new(503)
            .with_header("content-type", "text/plain")
            .with_body("Offline - Resource not available")
            .served_from(ServedFrom::Synthetic)
    }

    /// Structured JSON error for non-HTML requests when the origin is
    /// failing and nothing is cached
    #[must_use]
    pub fn server_offline_error() -> Self {
        Self::offline_json(
            "Server Offline",
            "Server is temporarily unavailable. Cached content not available.",
        )
    }

    /// Structured JSON error for non-HTML requests when the network itself
    /// is unreachable and nothing is cached
    #[must_use]
    pub fn network_offline_error() -> Self {
        Self::offline_json(
            "Offline",
            "You are currently offline. Please check your connection.",
        )
    }

    fn offline_json(error: &str, message: &str) -> Self {
        let body = OfflineErrorBody {
            error,
            message,
            cached: false,
        };
        // Serializing a struct of two strings and a bool cannot fail
        let bytes = serde_json::to_vec(&body).unwrap_or_default();
        Self::new(503)
            .with_header("content-type", "application/json")
            .with_body(bytes)
            .served_from(ServedFrom::Synthetic)
    }
}
