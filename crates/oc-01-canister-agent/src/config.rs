//! # Canister Agent Configuration
//!
//! Retry ceiling, backoff base, poll strategy and codec layout.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::codec::RecordEncoding;

/// Query retry ceiling in production.
pub const PRODUCTION_MAX_RETRIES: u32 = 7;

/// Query retry ceiling in development.
pub const DEVELOPMENT_MAX_RETRIES: u32 = 3;

/// Base backoff delay in milliseconds.
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 100;

/// Canister agent configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Retries after the first query attempt.
    pub max_query_retries: u32,

    /// Delay before retry `n` is `retry_base_delay_ms * 2^n`.
    pub retry_base_delay_ms: u64,

    /// Poll strategy for accepted update calls.
    pub poll: PollConfig,

    /// Record layout used when encoding requests.
    #[serde(default)]
    pub record_encoding: RecordEncoding,

    /// Root-of-trust key. Fetched from the transport once when absent.
    #[serde(default)]
    pub root_key: Option<Vec<u8>>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::production()
    }
}

impl AgentConfig {
    /// Production settings.
    pub fn production() -> Self {
        Self {
            max_query_retries: PRODUCTION_MAX_RETRIES,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            poll: PollConfig::default(),
            record_encoding: RecordEncoding::Positional,
            root_key: None,
        }
    }

    /// Development settings (local replica).
    pub fn development() -> Self {
        Self {
            max_query_retries: DEVELOPMENT_MAX_RETRIES,
            ..Self::production()
        }
    }

    /// Create a config for testing (short delays).
    pub fn for_testing() -> Self {
        Self {
            max_query_retries: DEVELOPMENT_MAX_RETRIES,
            retry_base_delay_ms: 10,
            poll: PollConfig {
                initial_delay_ms: 10,
                multiplier: 1.2,
                max_delay_ms: 100,
                timeout_ms: 5_000,
            },
            record_encoding: RecordEncoding::Positional,
            root_key: None,
        }
    }

    /// Base backoff delay.
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

/// Poll strategy for update calls answered with "accepted".
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PollConfig {
    /// Delay before the first status request.
    pub initial_delay_ms: u64,

    /// Growth factor applied after each poll.
    pub multiplier: f64,

    /// Cap on a single poll delay.
    pub max_delay_ms: u64,

    /// Hard timeout measured from submission.
    pub timeout_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1_000,
            multiplier: 1.2,
            max_delay_ms: 30_000,
            timeout_ms: 5 * 60 * 1_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_production() {
        let config = AgentConfig::default();
        assert_eq!(config, AgentConfig::production());
        assert_eq!(config.max_query_retries, 7);
        assert_eq!(config.retry_base_delay_ms, 100);
        assert_eq!(config.record_encoding, RecordEncoding::Positional);
        assert!(config.root_key.is_none());
    }

    #[test]
    fn test_development_config() {
        let config = AgentConfig::development();
        assert_eq!(config.max_query_retries, 3);
        assert_eq!(config.poll, PollConfig::default());
    }

    #[test]
    fn test_poll_defaults() {
        let poll = PollConfig::default();
        assert_eq!(poll.initial_delay_ms, 1_000);
        assert_eq!(poll.timeout_ms, 300_000);
    }
}
