//! Engine composition root
//!
//! [`OfflineEngine`] wires the durable store, cache, health tracker,
//! router and pending queue together and owns the connection state. It
//! is the whole downstream contract: hosts route requests through
//! [`handle_request`](OfflineEngine::handle_request), persist data
//! through `save_data`/`get_data`, and subscribe to notifications and
//! connection changes. Everything is explicitly constructed; there are
//! no globals.

use crate::cache::BoundedCacheStore;
use crate::config::Config;
use crate::health::{HealthEvent, OriginHealth, ServerHealthClassifier};
use crate::http::{Request, Response, ServedFrom};
use crate::queue::{DrainReport, PendingActionQueue};
use crate::router::StrategyRouter;
use crate::store::{DurableStore, Record, StoreError};
use crate::transport::Transport;
use anyhow::{Context, Result};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};

/// Notification severity, for the host's presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// A one-shot message for the host to surface to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub severity: Severity,
}

impl Notification {
    /// Build a notification
    pub fn new(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            severity,
        }
    }
}

/// The offline-resilience engine
pub struct OfflineEngine {
    store: Arc<DurableStore>,
    cache: Arc<BoundedCacheStore>,
    health: Arc<OriginHealth>,
    router: StrategyRouter,
    queue: PendingActionQueue,
    transport: Arc<dyn Transport>,
    notifications: broadcast::Sender<Notification>,
    /// Whether the network itself is believed reachable. Optimistic.
    connection: watch::Sender<bool>,
}

impl OfflineEngine {
    /// Build an engine, opening the durable store at the configured path
    pub fn new(config: Config, transport: Arc<dyn Transport>) -> Result<Arc<Self>> {
        config.validate()?;
        let store = DurableStore::open(&config.store.path)
            .with_context(|| format!("opening durable store at {:?}", config.store.path))?;
        Ok(Self::with_store(config, transport, Arc::new(store)))
    }

    /// Build an engine over an already-open store
    pub fn with_store(
        config: Config,
        transport: Arc<dyn Transport>,
        store: Arc<DurableStore>,
    ) -> Arc<Self> {
        let cache = Arc::new(BoundedCacheStore::new(config.cache.clone()));
        let health = Arc::new(OriginHealth::new());
        let router = StrategyRouter::new(
            Arc::clone(&cache),
            ServerHealthClassifier::new(config.health.clone()),
            Arc::clone(&health),
            Arc::clone(&transport),
            &config.store,
        );
        let queue = PendingActionQueue::new(Arc::clone(&store));
        let (notifications, _) = broadcast::channel(64);
        let (connection, _) = watch::channel(true);

        Arc::new(Self {
            store,
            cache,
            health,
            router,
            queue,
            transport,
            notifications,
            connection,
        })
    }

    /// Spawn the background listener that reacts to origin health
    /// transitions. Call once after construction.
    pub fn start(self: &Arc<Self>) {
        let engine = Arc::clone(self);
        let mut events = self.health.subscribe();
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                match event {
                    HealthEvent::ServerOffline => {
                        engine.notify(
                            "Server is offline. Showing cached data where available.",
                            Severity::Warning,
                        );
                    }
                    HealthEvent::ServerRecovered => {
                        engine.notify("Server is back online. Syncing...", Severity::Success);
                        if let Err(err) = engine.sync_now().await {
                            warn!(error = %err, "drain after recovery failed");
                        }
                    }
                }
            }
        });
    }

    /// Route a request through the strategy router.
    ///
    /// Mutations attempted while the network is unreachable never hit the
    /// doomed transport: they are diverted to the pending queue and
    /// acknowledged with a synthetic 202.
    pub async fn handle_request(&self, request: &Request) -> Response {
        if request.method.is_mutation() && !self.network_reachable() {
            return self.divert_to_queue(request);
        }
        self.router.handle(request).await
    }

    fn divert_to_queue(&self, request: &Request) -> Response {
        let payload = request.payload.clone().unwrap_or(serde_json::Value::Null);
        match self.queue.enqueue(&request.url, request.method, payload) {
            Ok(id) => {
                self.notify(
                    "Saved offline. Will sync when you're back online.",
                    Severity::Info,
                );
                Response::new(202)
                    .with_header("content-type", "application/json")
                    .with_body(serde_json::to_vec(&json!({"queued": true, "id": id}))
                        .unwrap_or_default())
                    .served_from(ServedFrom::Synthetic)
            }
            Err(err) => {
                warn!(url = %request.url, error = %err, "failed to queue offline mutation");
                self.notify("Could not save your change offline.", Severity::Error);
                Response::network_offline_error()
            }
        }
    }

    /// Durably queue a write for later replay
    pub fn queue_action(
        &self,
        url: &str,
        method: crate::http::Method,
        payload: serde_json::Value,
    ) -> Result<i64, StoreError> {
        self.queue.enqueue(url, method, payload)
    }

    /// Replay all queued writes now; notifies on progress
    pub async fn sync_now(&self) -> Result<DrainReport, StoreError> {
        let report = self.queue.drain(self.transport.as_ref()).await?;
        if report.replayed > 0 {
            self.notify(
                format!("Synced {} queued change(s).", report.replayed),
                Severity::Success,
            );
        }
        if report.failed > 0 {
            self.notify(
                format!("{} change(s) could not be synced yet.", report.failed),
                Severity::Warning,
            );
        }
        Ok(report)
    }

    /// Persist a typed record
    pub fn save_data<T: Record>(&self, record: &T) -> Result<(), StoreError> {
        self.store.save(record)
    }

    /// Persist a batch of typed records
    pub fn save_data_batch<T: Record>(&self, records: &[T]) -> Result<(), StoreError> {
        self.store.save_many(records)
    }

    /// Fetch a typed record by key
    pub fn get_data<T: Record>(&self, key: &str) -> Result<Option<T>, StoreError> {
        self.store.get(key)
    }

    /// Fetch every record of a typed collection
    pub fn get_all_data<T: Record>(&self) -> Result<Vec<T>, StoreError> {
        self.store.get_all()
    }

    /// Broadcast a one-shot notification to the host
    pub fn notify(&self, message: impl Into<String>, severity: Severity) {
        let notification = Notification::new(message, severity);
        info!(
            severity = ?notification.severity,
            message = %notification.message,
            "notification"
        );
        // No subscribers is fine
        let _ = self.notifications.send(notification);
    }

    /// Subscribe to host notifications
    #[must_use]
    pub fn subscribe_notifications(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    /// Observe network-reachability changes
    #[must_use]
    pub fn subscribe_connection_change(&self) -> watch::Receiver<bool> {
        self.connection.subscribe()
    }

    /// Whether the network is currently believed reachable
    #[must_use]
    pub fn network_reachable(&self) -> bool {
        *self.connection.borrow()
    }

    /// Origin health tracker, for hosts that want transition events
    #[must_use]
    pub fn health(&self) -> &Arc<OriginHealth> {
        &self.health
    }

    /// Shared response cache
    #[must_use]
    pub fn cache(&self) -> &Arc<BoundedCacheStore> {
        &self.cache
    }

    /// Report a network reachability change from the host.
    ///
    /// Going offline warns the user; coming back online announces the
    /// sync and drains the queue in the background.
    pub fn set_network_reachable(self: &Arc<Self>, reachable: bool) {
        let changed = self.connection.send_if_modified(|current| {
            if *current == reachable {
                false
            } else {
                *current = reachable;
                true
            }
        });
        if !changed {
            return;
        }

        if reachable {
            info!("network back online");
            self.notify("Back online. Syncing your changes...", Severity::Success);
            let engine = Arc::clone(self);
            tokio::spawn(async move {
                if let Err(err) = engine.sync_now().await {
                    warn!(error = %err, "drain after reconnect failed");
                }
            });
        } else {
            info!("network went offline");
            self.notify(
                "You are offline. Changes will be saved and synced when you reconnect.",
                Severity::Warning,
            );
        }
    }
}
