//! Channel degradation timing, verified against a paused clock


use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use origin_shield::config::ChannelConfig;
use origin_shield::{ChannelError, ChannelManager, StatusEndpoint, StreamTransport};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Stream transport that always fails, recording when each attempt happened
struct FailingStream {
    attempts: Mutex<Vec<Instant>>,
}

impl FailingStream {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            attempts: Mutex::new(Vec::new()),
        })
    }

    fn attempt_times(&self) -> Vec<Instant> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl StreamTransport for FailingStream {
    async fn connect(&self) -> Result<BoxStream<'static, Result<String, ChannelError>>, ChannelError> {
        self.attempts.lock().unwrap().push(Instant::now());
        Err(ChannelError::ConnectFailed {
            reason: "refused".to_string(),
        })
    }
}

/// Status endpoint recording when each poll happened
struct TimedStatus {
    polls: Mutex<Vec<Instant>>,
    count: AtomicU64,
}

impl TimedStatus {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            polls: Mutex::new(Vec::new()),
            count: AtomicU64::new(0),
        })
    }

    fn poll_times(&self) -> Vec<Instant> {
        self.polls.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatusEndpoint for TimedStatus {
    async fn unread_count(&self) -> Result<u64, ChannelError> {
        self.polls.lock().unwrap().push(Instant::now());
        Ok(self.count.fetch_add(1, Ordering::SeqCst))
    }
}

/// Stream transport that connects and streams one scripted batch per call
struct BatchStream {
    batches: Mutex<Vec<Vec<String>>>,
    connects: AtomicUsize,
}

impl BatchStream {
    fn new(batches: Vec<Vec<String>>) -> Arc<Self> {
        Arc::new(Self {
            batches: Mutex::new(batches),
            connects: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl StreamTransport for BatchStream {
    async fn connect(&self) -> Result<BoxStream<'static, Result<String, ChannelError>>, ChannelError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let mut batches = self.batches.lock().unwrap();
        if batches.is_empty() {
            return Ok(futures::stream::pending().boxed());
        }
        let batch = batches.remove(0);
        Ok(futures::stream::iter(batch.into_iter().map(Ok)).boxed())
    }
}

#[tokio::test(start_paused = true)]
async fn test_backoff_schedule_is_one_then_two_seconds_then_polling() {
    let stream = FailingStream::new();
    let status = TimedStatus::new();
    let manager = Arc::new(ChannelManager::new(
        ChannelConfig::default(),
        Arc::clone(&stream) as Arc<dyn StreamTransport>,
        Arc::clone(&status) as Arc<dyn StatusEndpoint>,
    ));

    let mut counts = manager.subscribe_counts();
    let runner = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.run().await })
    };

    // Wait until polling has produced a few values
    for _ in 0..3 {
        counts.recv().await.unwrap();
    }
    manager.disconnect();
    runner.await.unwrap();

    // Exactly three connection attempts, spaced 1s then 2s apart
    let attempts = stream.attempt_times();
    assert_eq!(attempts.len(), 3);
    assert_eq!(attempts[1] - attempts[0], Duration::from_millis(1000));
    assert_eq!(attempts[2] - attempts[1], Duration::from_millis(2000));

    // First poll fires immediately after degrading, then every 5s
    let polls = status.poll_times();
    assert!(polls.len() >= 3);
    assert_eq!(polls[0] - attempts[2], Duration::ZERO);
    assert_eq!(polls[1] - polls[0], Duration::from_secs(5));
    assert_eq!(polls[2] - polls[1], Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_backoff_respects_the_configured_cap() {
    let stream = FailingStream::new();
    let config = ChannelConfig {
        initial_delay_ms: 1000,
        max_delay_ms: 2500,
        max_attempts: 5,
        ..ChannelConfig::default()
    };
    let manager = Arc::new(ChannelManager::new(
        config,
        Arc::clone(&stream) as Arc<dyn StreamTransport>,
        TimedStatus::new(),
    ));

    let mut counts = manager.subscribe_counts();
    let runner = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.run().await })
    };
    counts.recv().await.unwrap();
    manager.disconnect();
    runner.await.unwrap();

    // 1000, 2000, then clamped to 2500
    let attempts = stream.attempt_times();
    assert_eq!(attempts.len(), 5);
    assert_eq!(attempts[1] - attempts[0], Duration::from_millis(1000));
    assert_eq!(attempts[2] - attempts[1], Duration::from_millis(2000));
    assert_eq!(attempts[3] - attempts[2], Duration::from_millis(2500));
    assert_eq!(attempts[4] - attempts[3], Duration::from_millis(2500));
}

#[tokio::test(start_paused = true)]
async fn test_streamed_and_polled_counts_are_one_series() {
    // One good connection that drops after two messages, then failures
    // until the manager degrades to polling
    struct DropThenFail {
        inner: Arc<BatchStream>,
        connects: AtomicUsize,
    }

    #[async_trait]
    impl StreamTransport for DropThenFail {
        async fn connect(
            &self,
        ) -> Result<BoxStream<'static, Result<String, ChannelError>>, ChannelError> {
            if self.connects.fetch_add(1, Ordering::SeqCst) == 0 {
                self.inner.connect().await
            } else {
                Err(ChannelError::ConnectFailed {
                    reason: "gone".to_string(),
                })
            }
        }
    }

    let stream = Arc::new(DropThenFail {
        inner: BatchStream::new(vec![vec![
            "{\"type\":\"unread_count\",\"count\":1}".to_string(),
            "{\"type\":\"unread_count\",\"count\":2}".to_string(),
        ]]),
        connects: AtomicUsize::new(0),
    });
    let status = TimedStatus::new();
    status.count.store(3, Ordering::SeqCst);

    let manager = Arc::new(ChannelManager::new(
        ChannelConfig::default(),
        stream,
        Arc::clone(&status) as Arc<dyn StatusEndpoint>,
    ));

    let mut counts = manager.subscribe_counts();
    let runner = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.run().await })
    };

    // Subscribers see streamed values, then polled values, seamlessly
    assert_eq!(counts.recv().await.unwrap(), 1);
    assert_eq!(counts.recv().await.unwrap(), 2);
    assert_eq!(counts.recv().await.unwrap(), 3);
    assert_eq!(counts.recv().await.unwrap(), 4);

    manager.disconnect();
    runner.await.unwrap();
}
