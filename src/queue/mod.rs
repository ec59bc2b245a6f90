//! Pending-write queue: persist while offline, replay in order later
//!
//! Mutations attempted while disconnected are persisted through
//! [`DurableStore`] before the caller is acknowledged, so a crash between
//! enqueue and drain loses nothing. Draining walks the queue in enqueue
//! order and retires each action only after the origin confirms it with a
//! success status. A failed replay leaves its action queued for the next
//! drain; it never blocks the actions behind it.

use crate::http::{Method, Request};
use crate::store::{DurableStore, PendingAction, StoreError};
use crate::transport::Transport;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of a single drain pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Actions replayed and retired
    pub replayed: usize,
    /// Actions that failed and remain queued
    pub failed: usize,
}

impl DrainReport {
    /// Whether every queued action was retired
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// Durable FIFO queue of writes awaiting replay
pub struct PendingActionQueue {
    store: Arc<DurableStore>,
}

impl PendingActionQueue {
    /// Create a queue over the given store
    #[must_use]
    pub fn new(store: Arc<DurableStore>) -> Self {
        Self { store }
    }

    /// Persist a write for later replay; returns the assigned id.
    ///
    /// The action is committed before this returns, so the caller may
    /// acknowledge it as accepted.
    pub fn enqueue(
        &self,
        url: &str,
        method: Method,
        payload: serde_json::Value,
    ) -> Result<i64, StoreError> {
        let id = self.store.insert_pending(url, method, &payload)?;
        info!(id, url, method = method.as_str(), "queued pending action");
        Ok(id)
    }

    /// All queued actions in enqueue order
    pub fn actions(&self) -> Result<Vec<PendingAction>, StoreError> {
        self.store.pending_actions()
    }

    /// Number of actions still queued
    pub fn len(&self) -> Result<usize, StoreError> {
        self.store.pending_count()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.store.pending_count()? == 0)
    }

    /// Replay every queued action through the transport.
    ///
    /// Actions are sent in enqueue order. An action is retired only on a
    /// success status; transport errors and non-2xx responses leave it
    /// queued. Failures are isolated per action, so one broken replay
    /// does not stall the rest of the queue.
    pub async fn drain(&self, transport: &dyn Transport) -> Result<DrainReport, StoreError> {
        let actions = self.store.pending_actions()?;
        if actions.is_empty() {
            return Ok(DrainReport::default());
        }
        info!(count = actions.len(), "draining pending actions");

        let mut report = DrainReport::default();
        for action in actions {
            match self.replay(transport, &action).await {
                Ok(true) => {
                    self.store.delete_pending(action.id)?;
                    debug!(id = action.id, url = %action.url, "pending action replayed");
                    report.replayed += 1;
                }
                Ok(false) => {
                    report.failed += 1;
                }
                Err(err) => {
                    warn!(id = action.id, url = %action.url, error = %err, "replay failed");
                    report.failed += 1;
                }
            }
        }

        info!(
            replayed = report.replayed,
            failed = report.failed,
            "drain pass complete"
        );
        Ok(report)
    }

    async fn replay(
        &self,
        transport: &dyn Transport,
        action: &PendingAction,
    ) -> Result<bool, crate::transport::TransportError> {
        let request = Request::new(action.method, &action.url)
            .with_header("content-type", "application/json")
            .with_payload(action.payload.clone());

        let response = transport.send(&request).await?;
        if response.is_success() {
            Ok(true)
        } else {
            warn!(
                id = action.id,
                url = %action.url,
                status = response.status,
                "origin rejected replayed action; keeping it queued"
            );
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Response;
    use crate::transport::TransportError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Transport that answers from a script and records every request
    struct ScriptedTransport {
        script: Mutex<Vec<Result<Response, TransportError>>>,
        seen: Mutex<Vec<(Method, String)>>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Result<Response, TransportError>>) -> Self {
            Self {
                script: Mutex::new(script),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn seen(&self) -> Vec<(Method, String)> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, request: &Request) -> Result<Response, TransportError> {
            self.seen
                .lock()
                .unwrap()
                .push((request.method, request.url.clone()));
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                Ok(Response::new(200))
            } else {
                script.remove(0)
            }
        }
    }

    fn queue() -> PendingActionQueue {
        PendingActionQueue::new(Arc::new(DurableStore::open_in_memory().unwrap()))
    }

    fn connect_failed() -> TransportError {
        TransportError::ConnectFailed {
            reason: "refused".to_string(),
        }
    }

    #[tokio::test]
    async fn test_enqueue_then_drain_retires_in_order() {
        let queue = queue();
        queue
            .enqueue("/room/1/message/", Method::Post, json!({"body": "a"}))
            .unwrap();
        queue
            .enqueue("/room/2/message/", Method::Post, json!({"body": "b"}))
            .unwrap();
        assert_eq!(queue.len().unwrap(), 2);

        let transport = ScriptedTransport::new(vec![]);
        let report = queue.drain(&transport).await.unwrap();

        assert_eq!(report, DrainReport { replayed: 2, failed: 0 });
        assert!(queue.is_empty().unwrap());
        assert_eq!(
            transport.seen(),
            vec![
                (Method::Post, "/room/1/message/".to_string()),
                (Method::Post, "/room/2/message/".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_replay_stays_queued() {
        let queue = queue();
        queue.enqueue("/a/", Method::Post, json!({})).unwrap();
        queue.enqueue("/b/", Method::Post, json!({})).unwrap();

        // First replay fails at the transport, second succeeds
        let transport =
            ScriptedTransport::new(vec![Err(connect_failed()), Ok(Response::new(201))]);
        let report = queue.drain(&transport).await.unwrap();

        assert_eq!(report, DrainReport { replayed: 1, failed: 1 });
        let remaining = queue.actions().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].url, "/a/");
    }

    #[tokio::test]
    async fn test_non_success_status_keeps_action() {
        let queue = queue();
        queue.enqueue("/a/", Method::Post, json!({})).unwrap();

        let transport = ScriptedTransport::new(vec![Ok(Response::new(500))]);
        let report = queue.drain(&transport).await.unwrap();

        assert_eq!(report, DrainReport { replayed: 0, failed: 1 });
        assert_eq!(queue.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_drain_empty_queue_is_noop() {
        let queue = queue();
        let transport = ScriptedTransport::new(vec![]);
        let report = queue.drain(&transport).await.unwrap();

        assert_eq!(report, DrainReport::default());
        assert!(report.is_clean());
        assert!(transport.seen().is_empty());
    }

    #[tokio::test]
    async fn test_retired_action_not_replayed_twice() {
        let queue = queue();
        queue.enqueue("/a/", Method::Post, json!({})).unwrap();

        let transport = ScriptedTransport::new(vec![]);
        queue.drain(&transport).await.unwrap();
        queue.drain(&transport).await.unwrap();

        assert_eq!(transport.seen().len(), 1);
    }
}
