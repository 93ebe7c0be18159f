//! Configuration builder

use crate::types::{Config, LifespanMode, LoopKind};
use std::net::SocketAddr;
use std::time::Duration;

/// Builder for constructing configuration programmatically
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set listen address
    pub fn listen(mut self, addr: SocketAddr) -> Self {
        self.config.server.listen = addr;
        self
    }

    /// Set event loop flavor
    pub fn event_loop(mut self, kind: LoopKind) -> Self {
        self.config.server.event_loop = kind;
        self
    }

    /// Set worker thread count (0 = auto)
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.server.workers = workers;
        self
    }

    /// Stop serving after `limit` requests
    pub fn max_requests(mut self, limit: Option<u64>) -> Self {
        self.config.limits.max_requests = limit;
        self
    }

    /// Answer 503 beyond `limit` concurrently executing requests
    pub fn concurrency(mut self, limit: Option<usize>) -> Self {
        self.config.limits.concurrency = limit;
        self
    }

    /// Set the graceful shutdown grace period (None = unbounded)
    pub fn graceful_shutdown(mut self, grace: impl Into<Option<Duration>>) -> Self {
        self.config.timeouts.graceful_shutdown = grace.into();
        self
    }

    /// Set the idle check-point tick
    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.config.timeouts.tick_interval = interval;
        self
    }

    /// Set lifespan mode
    pub fn lifespan(mut self, mode: LifespanMode) -> Self {
        self.config.lifespan = mode;
        self
    }

    /// Enable or disable OS signal handlers while serving
    pub fn install_signals(mut self, install: bool) -> Self {
        self.config.signals.install = install;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> ripcord_core::Result<Config> {
        crate::validator::validate_config(&self.config)?;
        Ok(self.config)
    }
}
