//! Health classification types

use std::fmt;

/// Result of classifying a single origin response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The origin produced this response and is functioning
    Healthy,
    /// The origin is down, even if the transport delivered a response
    Unhealthy(UnhealthyReason),
}

impl Verdict {
    /// Whether this verdict is healthy
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }
}

/// Why a response was classified unhealthy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnhealthyReason {
    /// Status in the 5xx range
    ServerError(u16),
    /// Canonical gateway error code (502, 503, 504)
    GatewayError(u16),
    /// Transport-successful response carrying an intermediary error page
    DisguisedFailure(String),
}

impl fmt::Display for UnhealthyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServerError(status) => write!(f, "server error status {}", status),
            Self::GatewayError(status) => write!(f, "gateway error status {}", status),
            Self::DisguisedFailure(detail) => write!(f, "disguised failure: {}", detail),
        }
    }
}

/// Origin health state change, broadcast to all interested parties
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthEvent {
    /// healthy -> unhealthy transition
    ServerOffline,
    /// unhealthy -> healthy transition; queued writes should be drained
    ServerRecovered,
}
