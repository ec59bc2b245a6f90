//! Server health classification
//!
//! Transport success does not imply the origin is up: tunnels and reverse
//! proxies answer with status 200 and an embedded error page when the
//! server behind them is gone. The classifier inspects status codes first
//! and then, for HTML responses, matches the body against intermediary
//! error fingerprints. Classification reads the body buffer without
//! consuming it, so the caller still gets the original response.
//!
//! The [`OriginHealth`] tracker turns per-response verdicts into edge
//! events: healthy->unhealthy broadcasts `ServerOffline`, the reverse
//! broadcasts `ServerRecovered` (which the engine uses to drain the
//! pending-action queue).

mod types;

pub use types::{HealthEvent, UnhealthyReason, Verdict};

use crate::config::HealthConfig;
use crate::http::Response;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Canonical gateway error codes, kept as an explicit rule so gateway
/// codes stay unhealthy even if the general 5xx rule is ever narrowed
const GATEWAY_ERROR_CODES: [u16; 3] = [502, 503, 504];

/// Pluggable detector for disguised-failure pages.
///
/// Returns a human-readable detail string when the response body looks
/// like an intermediary error page, `None` otherwise. Implementations
/// must not mutate the response.
pub trait DisguisedFailureDetector: Send + Sync {
    /// Inspect an HTML response body for intermediary error fingerprints
    fn detect(&self, response: &Response) -> Option<String>;
}

/// Default fingerprint rules, built from [`HealthConfig`].
///
/// Matches, in order: exact error-code tokens; the vendor keyword
/// combined with any configured phrase group; a suspiciously small body
/// that mentions the vendor at all.
#[derive(Debug, Clone)]
pub struct FingerprintRules {
    config: HealthConfig,
}

impl FingerprintRules {
    /// Build the rule set from configuration
    #[must_use]
    pub fn new(config: HealthConfig) -> Self {
        Self { config }
    }
}

impl Default for FingerprintRules {
    fn default() -> Self {
        Self::new(HealthConfig::default())
    }
}

impl DisguisedFailureDetector for FingerprintRules {
    fn detect(&self, response: &Response) -> Option<String> {
        let text = response.body_text();
        let lower = text.to_lowercase();

        // Exact error-code tokens are case-sensitive on purpose: they are
        // machine codes, not prose
        for token in &self.config.error_tokens {
            if text.contains(token.as_str()) {
                return Some(format!("error token '{}'", token));
            }
        }

        let keyword = self.config.vendor_keyword.to_lowercase();
        if lower.contains(&keyword) {
            for phrase_group in &self.config.vendor_phrases {
                let all_present = phrase_group
                    .iter()
                    .all(|phrase| lower.contains(&phrase.to_lowercase()));
                if !phrase_group.is_empty() && all_present {
                    return Some(format!(
                        "vendor '{}' with phrase group {:?}",
                        self.config.vendor_keyword, phrase_group
                    ));
                }
            }

            // Real pages are big; a tiny HTML body naming the vendor is
            // almost certainly its error page
            if text.len() < self.config.small_body_threshold {
                return Some(format!(
                    "small body ({} bytes) mentioning '{}'",
                    text.len(),
                    self.config.vendor_keyword
                ));
            }
        }

        None
    }
}

/// Classifies origin responses as healthy or unhealthy
pub struct ServerHealthClassifier {
    detector: Arc<dyn DisguisedFailureDetector>,
}

impl ServerHealthClassifier {
    /// Classifier with the default fingerprint rules
    #[must_use]
    pub fn new(config: HealthConfig) -> Self {
        Self {
            detector: Arc::new(FingerprintRules::new(config)),
        }
    }

    /// Classifier with a custom disguised-failure detector
    #[must_use]
    pub fn with_detector(detector: Arc<dyn DisguisedFailureDetector>) -> Self {
        Self { detector }
    }

    /// Classify a response.
    ///
    /// 1. status >= 500 -> unhealthy
    /// 2. canonical gateway codes -> unhealthy
    /// 3. HTML body matching an intermediary fingerprint -> unhealthy
    /// 4. otherwise healthy
    #[must_use]
    pub fn classify(&self, response: &Response) -> Verdict {
        if GATEWAY_ERROR_CODES.contains(&response.status) {
            return Verdict::Unhealthy(UnhealthyReason::GatewayError(response.status));
        }
        if response.status >= 500 {
            return Verdict::Unhealthy(UnhealthyReason::ServerError(response.status));
        }

        if response.is_html() {
            if let Some(detail) = self.detector.detect(response) {
                return Verdict::Unhealthy(UnhealthyReason::DisguisedFailure(detail));
            }
        }

        Verdict::Healthy
    }
}

/// Tracks the origin's health and broadcasts transitions.
///
/// Starts optimistic (healthy). Subscribers that lag miss events rather
/// than blocking the request path.
#[derive(Debug)]
pub struct OriginHealth {
    healthy: AtomicBool,
    events: broadcast::Sender<HealthEvent>,
}

impl OriginHealth {
    /// Create a tracker in the optimistic healthy state
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            healthy: AtomicBool::new(true),
            events,
        }
    }

    /// Whether the origin is currently believed healthy
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    /// Subscribe to health transition events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<HealthEvent> {
        self.events.subscribe()
    }

    /// Record a verdict; returns the transition event if state changed
    pub fn record(&self, verdict: &Verdict) -> Option<HealthEvent> {
        let now_healthy = verdict.is_healthy();
        let was_healthy = self.healthy.swap(now_healthy, Ordering::AcqRel);

        if was_healthy == now_healthy {
            return None;
        }

        let event = if now_healthy {
            info!("origin recovered");
            HealthEvent::ServerRecovered
        } else {
            warn!("origin went offline (transport still up)");
            HealthEvent::ServerOffline
        };
        // Nobody listening is fine; the state flag alone is still useful
        let _ = self.events.send(event);
        Some(event)
    }
}

impl Default for OriginHealth {
    fn default() -> Self {
        Self::new()
    }
}
