//! Configuration schema definitions.
//!
//! These are the values a bootstrap accumulates before assembly. Every
//! field is optional or defaulted so partial configs (and partial TOML
//! files) are valid; `resolve.rs` turns them into effective values.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for a requester.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct RequesterConfig {
    /// Reactor (runtime) settings, passed through unmodified.
    pub io_reactor: IoReactorConfig,

    /// Per-connection codec settings, passed through unmodified.
    pub connection: ConnectionConfig,

    /// Capacity per route. `None` or a non-positive value means default (20).
    pub default_max_per_route: Option<i64>,

    /// Global capacity. `None` or a non-positive value means default (50).
    pub max_total: Option<i64>,

    /// Pooled entry time-to-live in `time_unit`s. Zero or `None`: never expires.
    pub time_to_live: Option<u64>,

    /// Unit for `time_to_live` (default: milliseconds).
    pub time_unit: Option<TimeUnit>,

    /// Logging settings for hosts that let the requester install a subscriber.
    pub observability: ObservabilityConfig,
}

/// Reactor-level settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct IoReactorConfig {
    /// TCP connect (and TLS handshake) timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// Response timeout in milliseconds. 0 disables it.
    pub so_timeout_ms: u64,

    /// Interval of the background eviction sweep in milliseconds.
    pub select_interval_ms: u64,

    /// Set TCP_NODELAY on new sockets.
    pub tcp_nodelay: bool,
}

impl IoReactorConfig {
    /// Get the TCP connect timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Response timeout; `None` when zero (unbounded).
    pub fn so_timeout(&self) -> Option<Duration> {
        (self.so_timeout_ms > 0).then(|| Duration::from_millis(self.so_timeout_ms))
    }

    /// Eviction interval, never shorter than 1ms.
    pub fn select_interval(&self) -> Duration {
        Duration::from_millis(self.select_interval_ms.max(1))
    }
}

impl Default for IoReactorConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 30_000,
            so_timeout_ms: 0,
            select_interval_ms: 1_000,
            tcp_nodelay: true,
        }
    }
}

/// HTTP/1.1 codec settings for each connection.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Read buffer ceiling in bytes (minimum 8 KiB).
    pub buffer_size: usize,

    /// Write header names in Title-Case.
    pub title_case_headers: bool,
}

impl ConnectionConfig {
    pub const MIN_BUFFER_SIZE: usize = 8 * 1024;

    /// Buffer size, raised to the minimum when configured below it.
    pub fn effective_buffer_size(&self) -> usize {
        self.buffer_size.max(Self::MIN_BUFFER_SIZE)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            buffer_size: Self::MIN_BUFFER_SIZE,
            title_case_headers: false,
        }
    }
}

/// Time unit for the entry TTL.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    #[default]
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Convert `value` in this unit, saturating at `u64::MAX` seconds.
    pub fn to_duration(self, value: u64) -> Duration {
        match self {
            TimeUnit::Nanoseconds => Duration::from_nanos(value),
            TimeUnit::Microseconds => Duration::from_micros(value),
            TimeUnit::Milliseconds => Duration::from_millis(value),
            TimeUnit::Seconds => Duration::from_secs(value),
            TimeUnit::Minutes => Duration::from_secs(value.saturating_mul(60)),
            TimeUnit::Hours => Duration::from_secs(value.saturating_mul(3_600)),
            TimeUnit::Days => Duration::from_secs(value.saturating_mul(86_400)),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "async_requester=info".to_string(),
        }
    }
}
