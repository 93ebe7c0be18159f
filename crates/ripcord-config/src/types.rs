//! Configuration types

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Main configuration
///
/// Every section has defaults, so an empty document is a valid config.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Listener and event loop
    #[serde(default)]
    pub server: ServerConfig,

    /// Request and concurrency limits
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Shutdown and check-point timing
    #[serde(default)]
    pub timeouts: TimeoutsConfig,

    /// Application lifespan hooks
    #[serde(default)]
    pub lifespan: LifespanMode,

    /// OS signal handling
    #[serde(default)]
    pub signals: SignalConfig,

    /// Observability
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// Event loop flavor used when the server owns the runtime
    #[serde(default)]
    pub event_loop: LoopKind,

    /// Worker threads for the multi-threaded loop (0 = auto)
    #[serde(default)]
    pub workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            event_loop: LoopKind::default(),
            workers: 0,
        }
    }
}

/// Event loop flavor
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LoopKind {
    /// Multi-threaded when more than one CPU is available
    #[default]
    Auto,
    /// Single-threaded cooperative loop
    CurrentThread,
    /// Work-stealing multi-threaded loop
    MultiThread,
}

/// Request and concurrency limits
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LimitsConfig {
    /// Stop serving after this many requests (None = unbounded)
    pub max_requests: Option<u64>,

    /// Maximum concurrently executing requests before answering 503
    pub concurrency: Option<usize>,
}

/// Timing configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeoutsConfig {
    /// Grace period for in-flight work during shutdown (None = unbounded)
    #[serde(default = "default_graceful_shutdown", with = "humantime_serde")]
    pub graceful_shutdown: Option<Duration>,

    /// Idle tick that guarantees shutdown requests are observed without traffic
    #[serde(default = "default_tick_interval", with = "humantime_serde")]
    pub tick_interval: Duration,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            graceful_shutdown: default_graceful_shutdown(),
            tick_interval: default_tick_interval(),
        }
    }
}

/// Lifespan hook policy
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LifespanMode {
    /// Run the hooks, tolerate applications without lifespan support
    #[default]
    Auto,
    /// Run the hooks, applications must support lifespan
    On,
    /// Never run the hooks
    Off,
}

/// Signal handling configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignalConfig {
    /// Install interrupt/terminate handlers while serving
    #[serde(default = "default_true")]
    pub install: bool,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self { install: true }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json, text)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default functions
fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8000))
}

fn default_graceful_shutdown() -> Option<Duration> {
    Some(Duration::from_secs(30))
}

fn default_tick_interval() -> Duration {
    Duration::from_millis(100)
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}
