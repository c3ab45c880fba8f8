//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for a client.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::http::headers::{header_map, HeaderSource};
use crate::http::request::CommonParams;
use crate::resilience::RetryStrategy;
use crate::transport::{FetchOptions, SocketOptions};

/// Root configuration for a network client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Total and read-inactivity timeouts.
    pub timeouts: TimeoutConfig,

    /// Retry budget and backoff.
    pub retries: RetryConfig,

    /// Socket pool sizing (socket transport only).
    pub pool: PoolConfig,

    /// Which transport to use.
    pub transport: TransportConfig,

    /// Explicit `User-Agent`. Overrides the transport default.
    pub user_agent: Option<String>,

    /// Service name appended to the default socket user agent.
    pub service_name: Option<String>,

    /// Headers sent with every request.
    pub headers: BTreeMap<String, String>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl ClientConfig {
    /// Client-level request defaults.
    ///
    /// Settings left at their defaults stay unset, so `NetworkClient::augment` can still
    /// fill them.
    pub fn common_params(&self) -> Result<CommonParams> {
        let headers = if self.headers.is_empty() {
            None
        } else {
            Some(HeaderSource::from(header_map(&self.headers)?))
        };

        let timeouts = TimeoutConfig::default();
        let retries = RetryConfig::default();

        Ok(CommonParams {
            timeout: (self.timeouts.request_ms != timeouts.request_ms)
                .then(|| Duration::from_millis(self.timeouts.request_ms)),
            read_timeout: (self.timeouts.read_ms != timeouts.read_ms)
                .then(|| Duration::from_millis(self.timeouts.read_ms)),
            retry_attempts: (self.retries.attempts != retries.attempts)
                .then_some(self.retries.attempts),
            retry_strategy: (!self.retries.same_schedule(&retries)).then(|| self.retries.strategy()),
            headers,
            decoder: None,
        })
    }

    pub fn socket_options(&self) -> SocketOptions {
        SocketOptions {
            max_sockets: self.pool.max_sockets,
            max_idle_sockets: self.pool.max_idle_sockets,
            active_timeout: Duration::from_millis(self.pool.active_timeout_ms),
            idle_timeout: Duration::from_millis(self.pool.idle_timeout_ms),
        }
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            buffer_streams: self.transport.buffer_streams,
        }
    }
}

/// Timeout configuration. Zero disables a timeout.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Time allowed to receive response headers, in milliseconds.
    pub request_ms: u64,

    /// Maximum gap between streamed chunks, in milliseconds.
    pub read_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_ms: 60_000,
            read_ms: 20_000,
        }
    }
}

/// Backoff schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RetryStrategyKind {
    /// `base_delay_ms * attempt`.
    #[default]
    Linear,
    /// Doubling from `base_delay_ms`, capped at `max_delay_ms`, with jitter.
    Exponential,
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts for retryable requests, including the first.
    pub attempts: u32,

    pub strategy: RetryStrategyKind,

    /// Linear step or exponential base, in milliseconds.
    pub base_delay_ms: u64,

    /// Exponential cap, in milliseconds.
    pub max_delay_ms: u64,
}

impl RetryConfig {
    fn same_schedule(&self, other: &RetryConfig) -> bool {
        self.strategy == other.strategy
            && self.base_delay_ms == other.base_delay_ms
            && (self.strategy == RetryStrategyKind::Linear || self.max_delay_ms == other.max_delay_ms)
    }

    pub fn strategy(&self) -> RetryStrategy {
        let base = Duration::from_millis(self.base_delay_ms);
        match self.strategy {
            RetryStrategyKind::Linear => RetryStrategy::linear(base),
            RetryStrategyKind::Exponential => {
                RetryStrategy::exponential(base, Duration::from_millis(self.max_delay_ms))
            }
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 1,
            strategy: RetryStrategyKind::Linear,
            base_delay_ms: 200,
            max_delay_ms: 2000,
        }
    }
}

/// Keep-alive socket pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum concurrent exchanges.
    pub max_sockets: usize,

    /// Idle sockets kept per host.
    pub max_idle_sockets: usize,

    /// Keep-alive for active sockets, in milliseconds.
    pub active_timeout_ms: u64,

    /// Idle socket lifetime, in milliseconds.
    pub idle_timeout_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_sockets: 100,
            max_idle_sockets: 10,
            active_timeout_ms: 60_000,
            idle_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Socket,
    Fetch,
}

/// Transport selection.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    pub kind: TransportKind,

    /// Buffer streamed request bodies before sending (fetch transport only).
    pub buffer_streams: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportKind::Socket,
            buffer_streams: true,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_engine_defaults() {
        let config = ClientConfig::default();
        let params = config.common_params().unwrap();
        assert_eq!(params.timeout(), Duration::from_secs(60));
        assert_eq!(params.read_timeout(), Duration::from_secs(20));
        assert_eq!(params.retry_attempts(), 1);
        assert!(params.timeout.is_none());
        assert!(params.read_timeout.is_none());
        assert!(params.retry_attempts.is_none());
        assert!(params.retry_strategy.is_none());
        assert!(params.headers.is_none());
        assert_eq!(config.socket_options(), SocketOptions::default());
        assert!(config.fetch_options().buffer_streams);
    }

    #[test]
    fn changed_settings_are_set() {
        let config = ClientConfig {
            timeouts: TimeoutConfig {
                request_ms: 5_000,
                ..Default::default()
            },
            retries: RetryConfig {
                attempts: 3,
                base_delay_ms: 50,
                ..Default::default()
            },
            ..Default::default()
        };

        let params = config.common_params().unwrap();
        assert_eq!(params.timeout, Some(Duration::from_millis(5_000)));
        assert!(params.read_timeout.is_none());
        assert_eq!(params.retry_attempts, Some(3));
        assert_eq!(
            params.retry_strategy.unwrap().delay(2),
            Duration::from_millis(100)
        );
    }

    #[test]
    fn exponential_strategy_from_config() {
        let retries = RetryConfig {
            strategy: RetryStrategyKind::Exponential,
            base_delay_ms: 100,
            max_delay_ms: 400,
            ..Default::default()
        };
        assert!(retries.strategy().delay(5) < Duration::from_millis(440));
    }
}
