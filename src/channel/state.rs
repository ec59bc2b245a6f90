//! Channel connection state machine
//!
//! Pure transition logic, separated from the async run loop so the
//! backoff schedule is testable without time.

use crate::config::ChannelConfig;
use std::time::Duration;

/// Where the realtime channel currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Connected; updates arrive as they happen
    Streaming,
    /// Disconnected; waiting out a backoff delay before retrying
    Reconnecting { attempt: u32, delay: Duration },
    /// Gave up on streaming; polling the status endpoint instead
    Polling,
}

impl ChannelState {
    /// Whether the channel is live-streaming updates
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming)
    }

    /// Whether the channel has degraded to polling
    #[must_use]
    pub fn is_polling(&self) -> bool {
        matches!(self, Self::Polling)
    }
}

/// Backoff delay before reconnect `attempt` (1-based): doubles from the
/// initial delay, clamped at the ceiling
#[must_use]
pub fn backoff_delay(config: &ChannelConfig, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(32);
    let factor = 1u64.checked_shl(exponent).unwrap_or(u64::MAX);
    let millis = config
        .initial_delay_ms
        .saturating_mul(factor)
        .min(config.max_delay_ms);
    Duration::from_millis(millis)
}

/// Next state after a failed connection attempt.
///
/// `failures` counts consecutive failures including this one. Reaching
/// the configured maximum degrades to polling instead of scheduling
/// another retry; otherwise the wait before attempt `failures + 1` is
/// the backoff for how many times we have already failed.
#[must_use]
pub fn on_connect_failure(config: &ChannelConfig, failures: u32) -> ChannelState {
    if failures >= config.max_attempts {
        ChannelState::Polling
    } else {
        ChannelState::Reconnecting {
            attempt: failures + 1,
            delay: backoff_delay(config, failures),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ChannelConfig {
        ChannelConfig::default()
    }

    #[test]
    fn test_backoff_doubles_from_initial() {
        let config = config();
        assert_eq!(backoff_delay(&config, 1), Duration::from_millis(1000));
        assert_eq!(backoff_delay(&config, 2), Duration::from_millis(2000));
        assert_eq!(backoff_delay(&config, 3), Duration::from_millis(4000));
        assert_eq!(backoff_delay(&config, 4), Duration::from_millis(8000));
    }

    #[test]
    fn test_backoff_is_capped() {
        let config = config();
        assert_eq!(backoff_delay(&config, 6), Duration::from_millis(30_000));
        assert_eq!(backoff_delay(&config, 60), Duration::from_millis(30_000));
    }

    #[test]
    fn test_backoff_is_monotonic() {
        let config = config();
        let mut last = Duration::ZERO;
        for attempt in 1..20 {
            let delay = backoff_delay(&config, attempt);
            assert!(delay >= last);
            last = delay;
        }
    }

    #[test]
    fn test_degrades_to_polling_after_max_attempts() {
        let config = config();

        // First failure: wait 1s, second: wait 2s, third: give up
        assert_eq!(
            on_connect_failure(&config, 1),
            ChannelState::Reconnecting {
                attempt: 2,
                delay: Duration::from_millis(1000),
            }
        );
        assert_eq!(
            on_connect_failure(&config, 2),
            ChannelState::Reconnecting {
                attempt: 3,
                delay: Duration::from_millis(2000),
            }
        );
        assert_eq!(on_connect_failure(&config, 3), ChannelState::Polling);
    }

    #[test]
    fn test_state_predicates() {
        assert!(ChannelState::Streaming.is_streaming());
        assert!(!ChannelState::Streaming.is_polling());
        assert!(ChannelState::Polling.is_polling());
        assert!(!ChannelState::Reconnecting {
            attempt: 1,
            delay: Duration::from_secs(1)
        }
        .is_streaming());
    }
}
