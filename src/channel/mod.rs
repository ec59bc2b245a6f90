//! Realtime channel with graceful degradation
//!
//! The manager prefers a streaming connection for unread-count updates.
//! When the stream cannot be (re)established it backs off exponentially;
//! after too many consecutive failures it stops burning reconnect
//! attempts and degrades to periodic polling of the status endpoint.
//! Subscribers see one unified series of counts and never learn which
//! mode produced a value.

mod state;

pub use state::{backoff_delay, on_connect_failure, ChannelState};

use crate::config::ChannelConfig;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

/// Errors from the realtime channel
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("stream connection failed: {reason}")]
    ConnectFailed { reason: String },

    #[error("stream closed by peer")]
    StreamClosed,

    #[error("status endpoint failed: {reason}")]
    StatusFailed { reason: String },
}

/// A transport that can open a message stream to the origin
#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// Open a stream of raw text messages; resolves once connected
    async fn connect(&self) -> Result<BoxStream<'static, Result<String, ChannelError>>, ChannelError>;
}

/// Fallback status endpoint polled once streaming has degraded
#[async_trait]
pub trait StatusEndpoint: Send + Sync {
    /// Fetch the current unread count
    async fn unread_count(&self) -> Result<u64, ChannelError>;
}

/// Wire shape of a streamed message
#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(rename = "type")]
    kind: String,
    count: Option<u64>,
}

/// Manages the streaming connection and its polling fallback
pub struct ChannelManager {
    config: ChannelConfig,
    stream: Arc<dyn StreamTransport>,
    status: Arc<dyn StatusEndpoint>,
    counts: broadcast::Sender<u64>,
    state_tx: watch::Sender<ChannelState>,
    shutdown_tx: watch::Sender<bool>,
}

impl ChannelManager {
    /// Create a manager; nothing connects until [`run`](Self::run) is called
    #[must_use]
    pub fn new(
        config: ChannelConfig,
        stream: Arc<dyn StreamTransport>,
        status: Arc<dyn StatusEndpoint>,
    ) -> Self {
        let (counts, _) = broadcast::channel(64);
        let (state_tx, _) = watch::channel(ChannelState::Reconnecting {
            attempt: 1,
            delay: std::time::Duration::ZERO,
        });
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            config,
            stream,
            status,
            counts,
            state_tx,
            shutdown_tx,
        }
    }

    /// Subscribe to the unified unread-count series
    #[must_use]
    pub fn subscribe_counts(&self) -> broadcast::Receiver<u64> {
        self.counts.subscribe()
    }

    /// Observe connection state changes
    #[must_use]
    pub fn state(&self) -> watch::Receiver<ChannelState> {
        self.state_tx.subscribe()
    }

    /// Stop the run loop. Idempotent.
    pub fn disconnect(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Drive the channel until [`disconnect`](Self::disconnect).
    ///
    /// Owns the connect/stream/backoff/poll cycle described in the module
    /// docs. Intended to be spawned as a task.
    pub async fn run(&self) {
        let mut shutdown = self.shutdown_tx.subscribe();
        let mut failures: u32 = 0;

        loop {
            if *shutdown.borrow() {
                return;
            }

            match self.stream.connect().await {
                Ok(stream) => {
                    info!("realtime stream connected");
                    self.set_state(ChannelState::Streaming);
                    failures = 0;
                    if self.stream_messages(stream, &mut shutdown).await {
                        return;
                    }
                    // An established connection dropping is the first
                    // failure of the next reconnect cycle
                    failures = 1;
                }
                Err(err) => {
                    failures += 1;
                    debug!(failures, error = %err, "stream connect failed");
                }
            }

            match on_connect_failure(&self.config, failures) {
                ChannelState::Polling => {
                    warn!(
                        failures,
                        "giving up on streaming; degrading to status polling"
                    );
                    self.set_state(ChannelState::Polling);
                    match self.poll_loop(&mut shutdown).await {
                        PollOutcome::Shutdown => return,
                        PollOutcome::TryStreaming => {
                            info!("attempting to resume streaming");
                            failures = 0;
                        }
                    }
                }
                next @ ChannelState::Reconnecting { attempt, delay } => {
                    debug!(attempt, ?delay, "scheduling reconnect");
                    self.set_state(next);
                    tokio::select! {
                        _ = shutdown.changed() => return,
                        () = tokio::time::sleep(delay) => {}
                    }
                }
                ChannelState::Streaming => unreachable!("failure never yields streaming"),
            }
        }
    }

    /// Consume stream messages until the stream ends or shutdown.
    /// Returns true if shutdown was requested.
    async fn stream_messages(
        &self,
        mut stream: BoxStream<'static, Result<String, ChannelError>>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> bool {
        loop {
            tokio::select! {
                _ = shutdown.changed() => return true,
                message = stream.next() => match message {
                    Some(Ok(text)) => self.handle_message(&text),
                    Some(Err(err)) => {
                        warn!(error = %err, "stream error; reconnecting");
                        return false;
                    }
                    None => {
                        info!("stream closed; reconnecting");
                        return false;
                    }
                },
            }
        }
    }

    /// Parse and dispatch one streamed message. Unknown message types and
    /// malformed payloads are dropped, not fatal.
    fn handle_message(&self, text: &str) {
        match serde_json::from_str::<WireMessage>(text) {
            Ok(message) if message.kind == "unread_count" => {
                if let Some(count) = message.count {
                    let _ = self.counts.send(count);
                } else {
                    debug!("unread_count message without a count");
                }
            }
            Ok(message) => {
                debug!(kind = %message.kind, "ignoring unhandled message type");
            }
            Err(err) => {
                debug!(error = %err, "ignoring malformed stream message");
            }
        }
    }

    /// Poll the status endpoint on the configured interval.
    ///
    /// Polls immediately on entry so degradation does not open a silent
    /// gap. A poll failure is logged and the loop keeps its cadence.
    async fn poll_loop(&self, shutdown: &mut watch::Receiver<bool>) -> PollOutcome {
        let mut completed: u32 = 0;
        loop {
            match self.status.unread_count().await {
                Ok(count) => {
                    let _ = self.counts.send(count);
                }
                Err(err) => {
                    debug!(error = %err, "status poll failed");
                }
            }

            completed = completed.saturating_add(1);
            if let Some(resume_after) = self.config.resume_streaming_after {
                if completed >= resume_after {
                    return PollOutcome::TryStreaming;
                }
            }

            tokio::select! {
                _ = shutdown.changed() => return PollOutcome::Shutdown,
                () = tokio::time::sleep(self.config.poll_interval()) => {}
            }
        }
    }

    fn set_state(&self, state: ChannelState) {
        let _ = self.state_tx.send(state);
    }
}

/// Why the poll loop returned control
enum PollOutcome {
    Shutdown,
    TryStreaming,
}
