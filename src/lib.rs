//! origin-shield: an offline-resilience engine for single-origin clients
//!
//! Routes every request through a cache-strategy router backed by bounded
//! FIFO cache partitions, detects origins that fail behind a healthy
//! transport (tunnel and reverse-proxy error pages), durably queues writes
//! attempted while disconnected and replays them on reconnect, and keeps a
//! realtime unread-count channel alive by degrading from streaming to
//! polling with exponential backoff.
//!
//! [`engine::OfflineEngine`] is the composition root and the surface hosts
//! talk to; the traits in [`transport`] and [`channel`] are the seams where
//! real network implementations plug in.

pub mod cache;
pub mod channel;
pub mod config;
pub mod engine;
pub mod health;
pub mod http;
pub mod logging;
pub mod queue;
pub mod router;
pub mod store;
pub mod transport;
pub mod types;

pub use cache::{BoundedCacheStore, CacheEntry, Partition};
pub use channel::{ChannelError, ChannelManager, ChannelState, StatusEndpoint, StreamTransport};
pub use config::{load_config, Config};
pub use engine::{Notification, OfflineEngine, Severity};
pub use health::{
    DisguisedFailureDetector, HealthEvent, OriginHealth, ServerHealthClassifier, UnhealthyReason,
    Verdict,
};
pub use http::{Method, Request, Response, ServedFrom};
pub use queue::{DrainReport, PendingActionQueue};
pub use router::{RequestClass, Strategy, StrategyRouter};
pub use store::{DurableStore, PendingAction, Record, StoreError};
pub use transport::{Transport, TransportError};
pub use types::CacheKey;
