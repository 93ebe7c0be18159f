//! Application lifespan hooks

use ripcord_config::LifespanMode;
use ripcord_core::{Application, Error, LifespanSupport, Result};
use std::sync::Arc;

/// Runs the application's startup and shutdown hooks according to the
/// configured mode. Shutdown only runs if startup completed with support.
pub(crate) struct Lifespan {
    mode: LifespanMode,
    app: Arc<dyn Application>,
    started: bool,
}

impl Lifespan {
    pub(crate) fn new(mode: LifespanMode, app: Arc<dyn Application>) -> Self {
        Self {
            mode,
            app,
            started: false,
        }
    }

    pub(crate) async fn startup(&mut self) -> Result<()> {
        if self.mode == LifespanMode::Off {
            return Ok(());
        }

        tracing::info!("Waiting for application startup");
        match self.app.startup().await {
            Ok(LifespanSupport::Supported) => {
                self.started = true;
                tracing::info!("Application startup complete");
                Ok(())
            }
            Ok(LifespanSupport::Unsupported) if self.mode == LifespanMode::On => Err(
                Error::Startup("lifespan is required but the application does not support it".to_string()),
            ),
            Ok(LifespanSupport::Unsupported) => {
                tracing::info!("Lifespan unsupported by the application, continuing");
                Ok(())
            }
            Err(e) => Err(Error::Startup(format!("Application startup failed: {e}"))),
        }
    }

    /// Errors are logged; teardown continues regardless
    pub(crate) async fn shutdown(&mut self) {
        if !self.started {
            return;
        }
        self.started = false;

        tracing::info!("Waiting for application shutdown");
        match self.app.shutdown().await {
            Ok(_) => tracing::info!("Application shutdown complete"),
            Err(e) => tracing::error!(error = %e, "Application shutdown failed"),
        }
    }
}

impl std::fmt::Debug for Lifespan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifespan")
            .field("mode", &self.mode)
            .field("started", &self.started)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use http::{Request, Response};
    use ripcord_core::{responses, Body};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct HookApp {
        supported: bool,
        fail_startup: bool,
        fail_shutdown: bool,
        startups: AtomicUsize,
        shutdowns: AtomicUsize,
    }

    #[async_trait]
    impl Application for HookApp {
        async fn handle(&self, _request: Request<Bytes>) -> Result<Response<Body>> {
            responses::no_content()
        }

        async fn startup(&self) -> Result<LifespanSupport> {
            self.startups.fetch_add(1, Ordering::SeqCst);
            if self.fail_startup {
                return Err(Error::Lifespan("database unreachable".to_string()));
            }
            Ok(if self.supported {
                LifespanSupport::Supported
            } else {
                LifespanSupport::Unsupported
            })
        }

        async fn shutdown(&self) -> Result<LifespanSupport> {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
            if self.fail_shutdown {
                return Err(Error::Lifespan("flush failed".to_string()));
            }
            Ok(LifespanSupport::Supported)
        }
    }

    #[tokio::test]
    async fn test_supported_app_runs_both_hooks_once() {
        let app = Arc::new(HookApp {
            supported: true,
            ..Default::default()
        });
        let mut lifespan = Lifespan::new(LifespanMode::Auto, app.clone());

        lifespan.startup().await.unwrap();
        lifespan.shutdown().await;
        lifespan.shutdown().await;

        assert_eq!(app.startups.load(Ordering::SeqCst), 1);
        assert_eq!(app.shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_auto_tolerates_unsupported() {
        let app = Arc::new(HookApp::default());
        let mut lifespan = Lifespan::new(LifespanMode::Auto, app.clone());

        lifespan.startup().await.unwrap();
        lifespan.shutdown().await;
        assert_eq!(app.shutdowns.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_on_requires_support() {
        let app = Arc::new(HookApp::default());
        let mut lifespan = Lifespan::new(LifespanMode::On, app);

        let err = lifespan.startup().await.unwrap_err();
        assert!(err.is_startup_failure());
    }

    #[tokio::test]
    async fn test_off_skips_hooks() {
        let app = Arc::new(HookApp {
            supported: true,
            ..Default::default()
        });
        let mut lifespan = Lifespan::new(LifespanMode::Off, app.clone());

        lifespan.startup().await.unwrap();
        lifespan.shutdown().await;
        assert_eq!(app.startups.load(Ordering::SeqCst), 0);
        assert_eq!(app.shutdowns.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_startup_error_is_startup_failure() {
        let app = Arc::new(HookApp {
            fail_startup: true,
            ..Default::default()
        });
        let mut lifespan = Lifespan::new(LifespanMode::Auto, app);

        let err = lifespan.startup().await.unwrap_err();
        assert!(err.is_startup_failure());
        assert!(err.to_string().contains("database unreachable"));
    }

    #[tokio::test]
    async fn test_shutdown_error_is_not_fatal() {
        let app = Arc::new(HookApp {
            supported: true,
            fail_shutdown: true,
            ..Default::default()
        });
        let mut lifespan = Lifespan::new(LifespanMode::On, app.clone());

        lifespan.startup().await.unwrap();
        lifespan.shutdown().await;
        assert_eq!(app.shutdowns.load(Ordering::SeqCst), 1);
    }
}
