//! Automatic reconnection policy.

use std::time::Duration;

use broadcast_config::ReconnectionConfig;

/// Decides whether and when to retry after a disconnect.
///
/// Attempts are counted from zero after the first disconnect. The delay is
/// the configured interval for every attempt; there is no backoff.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy;

impl ReconnectPolicy {
    /// Check if another attempt is allowed.
    pub fn should_retry(attempt: u32, config: &ReconnectionConfig) -> bool {
        config.enabled && attempt < config.max_retries
    }

    /// Delay before the given attempt.
    pub fn next_delay(_attempt: u32, config: &ReconnectionConfig) -> Duration {
        config.retry_interval
    }
}
