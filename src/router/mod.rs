//! Request classification and cache-strategy routing
//!
//! Every request is classified from its URL, method and Accept header,
//! and the class picks one of three strategies:
//!
//! - cache-first for immutable assets and user media,
//! - network-first for pages and API data,
//! - network-only for mutations.
//!
//! Network-first is where offline resilience lives: a failed or unhealthy
//! network attempt falls back through the cache, then the offline
//! placeholder page for navigations, then a structured offline error.
//! The fallback marks whether the cache was used because the network was
//! unreachable or because the origin was failing behind a live transport.

mod classify;

pub use classify::{classify, RequestClass};

use crate::cache::{BoundedCacheStore, CacheEntry, Partition};
use crate::config::StoreConfig;
use crate::health::{OriginHealth, ServerHealthClassifier, Verdict};
use crate::http::{Request, Response, ServedFrom};
use crate::transport::Transport;
use crate::types::CacheKey;
use std::sync::Arc;
use tracing::{debug, warn};

/// Strategy chosen for a request class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Serve from the partition if cached, else fetch and cache
    CacheFirst(Partition),
    /// Fetch fresh, cache on success, fall back to cache on failure
    NetworkFirst(Partition),
    /// Always hit the origin; never cached
    NetworkOnly,
}

/// Why a network-first attempt did not produce a usable response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureKind {
    /// The transport itself failed; nothing reached the origin
    NetworkDown,
    /// The transport delivered a response but the origin is failing
    ServerDown,
}

/// Routes requests through the strategy picked by their class
pub struct StrategyRouter {
    cache: Arc<BoundedCacheStore>,
    classifier: ServerHealthClassifier,
    health: Arc<OriginHealth>,
    transport: Arc<dyn Transport>,
    /// URL of the cached offline placeholder page
    offline_page: String,
}

impl StrategyRouter {
    /// Assemble a router over the shared cache, health tracker and transport
    pub fn new(
        cache: Arc<BoundedCacheStore>,
        classifier: ServerHealthClassifier,
        health: Arc<OriginHealth>,
        transport: Arc<dyn Transport>,
        store_config: &StoreConfig,
    ) -> Self {
        Self {
            cache,
            classifier,
            health,
            transport,
            offline_page: store_config.offline_page.clone(),
        }
    }

    /// Route a request; never fails, every failure mode has a fallback
    pub async fn handle(&self, request: &Request) -> Response {
        let class = classify(request);
        debug!(
            method = request.method.as_str(),
            url = %request.url,
            class = ?class,
            "routing request"
        );
        match class.strategy() {
            Strategy::CacheFirst(partition) => self.cache_first(request, partition).await,
            Strategy::NetworkFirst(partition) => self.network_first(request, partition).await,
            Strategy::NetworkOnly => self.network_only(request).await,
        }
    }

    /// Cache-first: a hit short-circuits the network entirely.
    ///
    /// A miss that also fails on the network yields the synthetic
    /// resource-unavailable response; there is no stale entry to fall
    /// back to, or the hit path would have served it.
    async fn cache_first(&self, request: &Request, partition: Partition) -> Response {
        let key = request.cache_key();
        if let Some(entry) = self.cache.get(partition, &key) {
            debug!(url = %request.url, partition = partition.as_str(), "cache-first hit");
            return entry.to_response(ServedFrom::Cache);
        }

        match self.fetch(request).await {
            Ok(response) => {
                self.cache_success(partition, &key, &response);
                response
            }
            Err(kind) => {
                warn!(url = %request.url, failure = ?kind, "cache-first miss with no network");
                Response::resource_unavailable()
            }
        }
    }

    /// Network-first: fresh data when possible, cache when not
    async fn network_first(&self, request: &Request, partition: Partition) -> Response {
        let key = request.cache_key();
        match self.fetch(request).await {
            Ok(response) => {
                self.cache_success(partition, &key, &response);
                response
            }
            Err(kind) => self.fallback(request, &key, kind),
        }
    }

    /// Network-only: mutations are never cached and never served stale
    async fn network_only(&self, request: &Request) -> Response {
        match self.fetch(request).await {
            Ok(response) => response,
            Err(FailureKind::NetworkDown) => Response::network_offline_error(),
            Err(FailureKind::ServerDown) => Response::server_offline_error(),
        }
    }

    /// Send the request and fold transport errors and unhealthy origin
    /// responses into a failure kind. Every delivered response feeds the
    /// health tracker, so recovery is noticed on the first good response.
    async fn fetch(&self, request: &Request) -> Result<Response, FailureKind> {
        match self.transport.send(request).await {
            Ok(response) => {
                let verdict = self.classifier.classify(&response);
                self.health.record(&verdict);
                match verdict {
                    Verdict::Healthy => Ok(response),
                    Verdict::Unhealthy(reason) => {
                        warn!(url = %request.url, %reason, "origin response classified unhealthy");
                        Err(FailureKind::ServerDown)
                    }
                }
            }
            Err(err) => {
                if err.is_network_error() {
                    debug!(url = %request.url, error = %err, "transport unreachable");
                    Err(FailureKind::NetworkDown)
                } else {
                    warn!(url = %request.url, error = %err, "transport error");
                    Err(FailureKind::NetworkDown)
                }
            }
        }
    }

    /// Cache a successful GET response and schedule the overflow check
    fn cache_success(&self, partition: Partition, key: &CacheKey, response: &Response) {
        if !response.is_success() || has_no_store(response) {
            return;
        }
        self.cache
            .put(partition, key.clone(), CacheEntry::from_response(response));
        self.cache.spawn_evict(partition);
    }

    /// The offline fallback chain for a failed network-first attempt
    fn fallback(&self, request: &Request, key: &CacheKey, kind: FailureKind) -> Response {
        let cache_marker = match kind {
            FailureKind::NetworkDown => ServedFrom::CacheNetworkOffline,
            FailureKind::ServerDown => ServedFrom::CacheServerOffline,
        };

        // Any partition may hold the page we need
        if let Some(entry) = self.cache.get_any(key) {
            debug!(url = %request.url, marker = cache_marker.as_str(), "serving cached fallback");
            return entry.to_response(cache_marker);
        }

        // Navigations get the offline placeholder, then the cached root page
        if request.accepts_html() {
            for page in [self.offline_page.as_str(), "/"] {
                let page_key = CacheKey::new("GET", page);
                if let Some(entry) = self.cache.get_any(&page_key) {
                    debug!(url = %request.url, placeholder = page, "serving offline placeholder");
                    return entry.to_response(ServedFrom::OfflinePlaceholder);
                }
            }
        }

        match kind {
            FailureKind::NetworkDown => Response::network_offline_error(),
            FailureKind::ServerDown => Response::server_offline_error(),
        }
    }
}

/// Responses carrying explicit no-store semantics are never cached
fn has_no_store(response: &Response) -> bool {
    response
        .header("cache-control")
        .is_some_and(|v| v.contains("no-store"))
}
