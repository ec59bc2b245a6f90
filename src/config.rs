//! Configuration module
//!
//! This module handles all configuration types and loading
//! for the offline-resilience engine.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default capacity for the dynamic-pages cache partition
fn default_dynamic_limit() -> usize {
    50
}

/// Default capacity for the api-responses cache partition
fn default_api_limit() -> usize {
    100
}

/// Default durable store path
fn default_store_path() -> PathBuf {
    PathBuf::from("offline.db")
}

/// Default URL of the offline placeholder page
fn default_offline_page() -> String {
    "/offline/".to_string()
}

/// Default intermediary error-code tokens (ngrok error pages)
fn default_error_tokens() -> Vec<String> {
    vec![
        "ERR_NGROK_8012".to_string(),
        "ERR_NGROK_3200".to_string(),
        "ERR_NGROK_3208".to_string(),
        "ERR_NGROK".to_string(),
    ]
}

/// Default intermediary vendor keyword
fn default_vendor_keyword() -> String {
    "ngrok".to_string()
}

/// Default vendor phrase combinations (every word in a group must appear)
fn default_vendor_phrases() -> Vec<Vec<String>> {
    vec![
        vec!["endpoint".to_string(), "offline".to_string()],
        vec!["tunnel".to_string(), "not found".to_string()],
        vec!["failed to complete tunnel connection".to_string()],
    ]
}

/// Default body-size threshold below which a vendor mention is suspicious
fn default_small_body_threshold() -> usize {
    1000
}

/// Default initial reconnect delay in milliseconds
fn default_initial_delay_ms() -> u64 {
    1000
}

/// Default reconnect delay ceiling in milliseconds
fn default_max_delay_ms() -> u64 {
    30_000
}

/// Default number of failed (re)connections before degrading to polling
fn default_max_attempts() -> u32 {
    3
}

/// Default polling interval in seconds
fn default_poll_interval_secs() -> u64 {
    5
}

/// Main engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    /// Cache partition limits
    #[serde(default)]
    pub cache: CacheConfig,
    /// Disguised-failure detection rules
    #[serde(default)]
    pub health: HealthConfig,
    /// Realtime channel backoff and polling behavior
    #[serde(default)]
    pub channel: ChannelConfig,
    /// Durable store location
    #[serde(default)]
    pub store: StoreConfig,
}

/// Cache partition capacity limits.
///
/// Static assets are intentionally unbounded: the asset set is fixed at
/// deploy time and must survive offline, so evicting it would defeat the
/// point. Only the partitions that grow with browsing get limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    /// Maximum entries in the dynamic-pages partition (HTML pages, media)
    #[serde(default = "default_dynamic_limit")]
    pub dynamic_limit: usize,
    /// Maximum entries in the api-responses partition
    #[serde(default = "default_api_limit")]
    pub api_limit: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dynamic_limit: default_dynamic_limit(),
            api_limit: default_api_limit(),
        }
    }
}

/// Disguised-failure fingerprint configuration.
///
/// Intermediaries (reverse proxies, tunnels) can answer with transport
/// success and an embedded error page; these rules describe what such
/// pages look like so the classifier can spot them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthConfig {
    /// Exact error-code tokens whose presence marks a disguised failure
    #[serde(default = "default_error_tokens")]
    pub error_tokens: Vec<String>,
    /// Vendor keyword that must appear alongside a phrase combination
    #[serde(default = "default_vendor_keyword")]
    pub vendor_keyword: String,
    /// Phrase groups: unhealthy if the vendor keyword and every word of
    /// any one group appear (case-insensitive)
    #[serde(default = "default_vendor_phrases")]
    pub vendor_phrases: Vec<Vec<String>>,
    /// HTML bodies smaller than this that mention the vendor are treated
    /// as error pages (real pages are larger)
    #[serde(default = "default_small_body_threshold")]
    pub small_body_threshold: usize,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            error_tokens: default_error_tokens(),
            vendor_keyword: default_vendor_keyword(),
            vendor_phrases: default_vendor_phrases(),
            small_body_threshold: default_small_body_threshold(),
        }
    }
}

/// Realtime channel reconnect/backoff configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelConfig {
    /// Initial reconnect delay in milliseconds
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Reconnect delay ceiling in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Consecutive failed (re)connections before switching to polling
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Status-poll interval in seconds once degraded
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// After this many completed polls, make one fresh streaming attempt.
    /// Unset means stay on polling for the rest of the session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_streaming_after: Option<u32>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
            poll_interval_secs: default_poll_interval_secs(),
            resume_streaming_after: None,
        }
    }
}

impl ChannelConfig {
    /// Initial reconnect delay as a Duration
    #[must_use]
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Reconnect delay ceiling as a Duration
    #[must_use]
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Polling interval as a Duration
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Durable store configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreConfig {
    /// Path of the SQLite database file
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    /// URL of the offline placeholder page served when nothing is cached
    #[serde(default = "default_offline_page")]
    pub offline_page: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            offline_page: default_offline_page(),
        }
    }
}

impl Config {
    /// Validate configuration for correctness
    ///
    /// Checks for:
    /// - Zero cache partition limits
    /// - Zero or inverted backoff delays
    /// - Zero reconnect attempts or polling interval
    pub fn validate(&self) -> Result<()> {
        if self.cache.dynamic_limit == 0 {
            return Err(anyhow::anyhow!("cache.dynamic_limit must be > 0"));
        }
        if self.cache.api_limit == 0 {
            return Err(anyhow::anyhow!("cache.api_limit must be > 0"));
        }

        if self.channel.initial_delay_ms == 0 {
            return Err(anyhow::anyhow!("channel.initial_delay_ms must be > 0"));
        }
        if self.channel.max_delay_ms < self.channel.initial_delay_ms {
            return Err(anyhow::anyhow!(
                "channel.max_delay_ms must be >= channel.initial_delay_ms"
            ));
        }
        if self.channel.max_attempts == 0 {
            return Err(anyhow::anyhow!("channel.max_attempts must be > 0"));
        }
        if self.channel.poll_interval_secs == 0 {
            return Err(anyhow::anyhow!("channel.poll_interval_secs must be > 0"));
        }

        if self.health.vendor_keyword.trim().is_empty() {
            return Err(anyhow::anyhow!("health.vendor_keyword cannot be empty"));
        }

        Ok(())
    }
}

/// Load configuration from a TOML file
pub fn load_config(config_path: &str) -> Result<Config> {
    let config_content = std::fs::read_to_string(config_path)
        .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", config_path, e))?;

    let config: Config = toml::from_str(&config_content)
        .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", config_path, e))?;

    config.validate()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache.dynamic_limit, 50);
        assert_eq!(config.cache.api_limit, 100);
        assert_eq!(config.channel.max_attempts, 3);
        assert_eq!(config.channel.initial_delay_ms, 1000);
        assert_eq!(config.channel.max_delay_ms, 30_000);
        assert_eq!(config.channel.poll_interval_secs, 5);
        assert!(config.channel.resume_streaming_after.is_none());
    }

    #[test]
    fn test_default_fingerprints_cover_ngrok_codes() {
        let health = HealthConfig::default();
        assert!(health.error_tokens.iter().any(|t| t == "ERR_NGROK_3200"));
        assert!(health.error_tokens.iter().any(|t| t == "ERR_NGROK_8012"));
        assert_eq!(health.vendor_keyword, "ngrok");
        assert_eq!(health.small_body_threshold, 1000);
    }

    #[test]
    fn test_zero_cache_limit_rejected() {
        let mut config = Config::default();
        config.cache.dynamic_limit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let mut config = Config::default();
        config.channel.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_delays_rejected() {
        let mut config = Config::default();
        config.channel.initial_delay_ms = 5000;
        config.channel.max_delay_ms = 1000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_channel_durations() {
        let channel = ChannelConfig::default();
        assert_eq!(channel.initial_delay(), Duration::from_millis(1000));
        assert_eq!(channel.max_delay(), Duration::from_secs(30));
        assert_eq!(channel.poll_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_load_config_from_file() -> Result<()> {
        let toml_str = r#"
[cache]
dynamic_limit = 25
api_limit = 200

[channel]
max_attempts = 5
resume_streaming_after = 12

[store]
path = "/tmp/engine.db"
"#;
        let mut temp_file = NamedTempFile::new()?;
        write!(temp_file, "{}", toml_str)?;

        let config = load_config(temp_file.path().to_str().unwrap())?;

        assert_eq!(config.cache.dynamic_limit, 25);
        assert_eq!(config.cache.api_limit, 200);
        assert_eq!(config.channel.max_attempts, 5);
        assert_eq!(config.channel.resume_streaming_after, Some(12));
        // Unspecified sections fall back to defaults
        assert_eq!(config.channel.initial_delay_ms, 1000);
        assert_eq!(config.store.offline_page, "/offline/");

        Ok(())
    }

    #[test]
    fn test_load_config_nonexistent_file() {
        let result = load_config("/nonexistent/path/config.toml");
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Failed to read config file"));
    }

    #[test]
    fn test_load_config_invalid_toml() -> Result<()> {
        let mut temp_file = NamedTempFile::new()?;
        write!(temp_file, "invalid toml content [[[")?;

        let result = load_config(temp_file.path().to_str().unwrap());
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Failed to parse config file"));

        Ok(())
    }

    #[test]
    fn test_config_serialization_roundtrip() -> Result<()> {
        let config = Config::default();
        let toml_string = toml::to_string_pretty(&config)?;
        let deserialized: Config = toml::from_str(&toml_string)?;
        assert_eq!(deserialized, config);
        Ok(())
    }

    #[test]
    fn test_custom_vendor_rules_parse() -> Result<()> {
        let toml_str = r#"
[health]
error_tokens = ["ERR_TUNNEL_502"]
vendor_keyword = "cloudflared"
vendor_phrases = [["argo", "tunnel", "down"]]
small_body_threshold = 2048
"#;
        let config: Config = toml::from_str(toml_str)?;
        assert_eq!(config.health.vendor_keyword, "cloudflared");
        assert_eq!(config.health.vendor_phrases.len(), 1);
        assert_eq!(config.health.small_body_threshold, 2048);
        Ok(())
    }
}
