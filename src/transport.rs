//! Origin transport seam and its error taxonomy
//!
//! The engine never talks to a socket directly; everything that reaches
//! the origin goes through the [`Transport`] trait. A transport failure
//! (no response at all) is a different animal from an origin failure
//! (a response that indicates the server behind the tunnel is down), and
//! the router treats them differently, so the error type keeps the
//! distinction explicit.

use crate::http::{Request, Response};
use async_trait::async_trait;
use std::time::Duration;

/// Errors that can occur while reaching the origin
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TransportError {
    /// Could not establish a connection (DNS failure, refused, no route)
    #[error("failed to connect to origin: {reason}")]
    ConnectFailed { reason: String },

    /// The request was sent but no response arrived in time
    #[error("origin request timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// Connection dropped mid-exchange
    #[error("I/O error talking to origin: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Whether this failure means the network path itself is down
    #[must_use]
    pub fn is_network_error(&self) -> bool {
        matches!(self, Self::ConnectFailed { .. } | Self::Timeout { .. })
    }

    /// Log level appropriate for this failure
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        match self {
            // Connect failures are expected while offline
            Self::ConnectFailed { .. } => tracing::Level::DEBUG,
            Self::Timeout { .. } => tracing::Level::WARN,
            Self::Io(_) => tracing::Level::WARN,
        }
    }
}

/// Request/response access to the single configured origin
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue a request and wait for the complete response.
    ///
    /// Returns `Err` only for transport-level failures; any response the
    /// origin (or an intermediary) produced comes back as `Ok`, including
    /// error statuses. Health classification happens downstream.
    async fn send(&self, request: &Request) -> Result<Response, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_failed_is_network_error() {
        let err = TransportError::ConnectFailed {
            reason: "connection refused".to_string(),
        };
        assert!(err.is_network_error());
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_timeout_is_network_error() {
        let err = TransportError::Timeout {
            timeout: Duration::from_secs(5),
        };
        assert!(err.is_network_error());
    }

    #[test]
    fn test_io_error_is_not_network_error() {
        let err = TransportError::Io(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "broken pipe",
        ));
        assert!(!err.is_network_error());
        assert_eq!(err.log_level(), tracing::Level::WARN);
    }

    #[test]
    fn test_connect_failed_logs_at_debug() {
        let err = TransportError::ConnectFailed {
            reason: "no route".to_string(),
        };
        assert_eq!(err.log_level(), tracing::Level::DEBUG);
    }
}
