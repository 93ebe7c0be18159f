//! Event loop selection

use ripcord_config::{LoopKind, ServerConfig};
use ripcord_core::{Error, Result};

/// Event loop the server runs on when it owns the runtime
///
/// Embedders that already have a tokio runtime call `Server::serve` on it
/// directly and never build one of these.
#[derive(Debug, Clone)]
pub struct EventLoop {
    kind: LoopKind,
    threads: usize,
    thread_name: String,
}

impl EventLoop {
    /// Event loop described by the server configuration
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            kind: config.event_loop,
            threads: config.workers,
            thread_name: "ripcord-worker".to_string(),
        }
    }

    /// Override the worker thread name prefix
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Worker threads the loop will use
    pub fn worker_count(&self) -> usize {
        match self.resolved_kind() {
            LoopKind::CurrentThread => 1,
            _ if self.threads == 0 => num_cpus::get(),
            _ => self.threads,
        }
    }

    /// The flavor after resolving `auto`
    pub fn resolved_kind(&self) -> LoopKind {
        match self.kind {
            LoopKind::Auto if num_cpus::get() > 1 => LoopKind::MultiThread,
            LoopKind::Auto => LoopKind::CurrentThread,
            other => other,
        }
    }

    /// Build the runtime
    pub fn build(&self) -> Result<tokio::runtime::Runtime> {
        let kind = self.resolved_kind();
        let mut builder = match kind {
            LoopKind::CurrentThread => tokio::runtime::Builder::new_current_thread(),
            _ => {
                let mut builder = tokio::runtime::Builder::new_multi_thread();
                builder.worker_threads(self.worker_count());
                builder
            }
        };

        let runtime = builder
            .enable_all()
            .thread_name(self.thread_name.clone())
            .build()
            .map_err(|e| Error::Runtime(format!("Failed to build event loop: {}", e)))?;

        tracing::debug!(
            event_loop = ?kind,
            workers = self.worker_count(),
            "Event loop ready"
        );

        Ok(runtime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(kind: LoopKind, workers: usize) -> ServerConfig {
        ServerConfig {
            event_loop: kind,
            workers,
            ..Default::default()
        }
    }

    #[test]
    fn test_auto_threads() {
        let event_loop = EventLoop::from_config(&config(LoopKind::MultiThread, 0));
        assert_eq!(event_loop.worker_count(), num_cpus::get());
    }

    #[test]
    fn test_custom_threads() {
        let event_loop = EventLoop::from_config(&config(LoopKind::MultiThread, 4));
        assert_eq!(event_loop.worker_count(), 4);
    }

    #[test]
    fn test_current_thread_ignores_workers() {
        let event_loop = EventLoop::from_config(&config(LoopKind::CurrentThread, 8));
        assert_eq!(event_loop.worker_count(), 1);
        assert_eq!(event_loop.resolved_kind(), LoopKind::CurrentThread);
    }

    #[test]
    fn test_auto_resolves() {
        let event_loop = EventLoop::from_config(&config(LoopKind::Auto, 0));
        assert_ne!(event_loop.resolved_kind(), LoopKind::Auto);
    }

    #[test]
    fn test_build_runs_futures() {
        for kind in [LoopKind::CurrentThread, LoopKind::MultiThread] {
            let runtime = EventLoop::from_config(&config(kind, 2)).build().unwrap();
            assert_eq!(runtime.block_on(async { 21 * 2 }), 42);
        }
    }
}
