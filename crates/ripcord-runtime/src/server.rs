//! HTTP server implementation

use crate::connection::{ConnectionEnd, ConnectionHandler};
use crate::handle::ServerHandle;
use crate::lifespan::Lifespan;
use crate::signal::SignalRegistration;
use crate::state::{LifecyclePhase, ServerState};
use crate::trigger::{ExitCause, ExitTrigger, TriggerOutcome};
use crate::worker::EventLoop;
use ripcord_config::Config;
use ripcord_core::{Application, Error, Result};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Pause after a failed accept, so a persistent error such as EMFILE does
/// not spin the loop
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Summary of a completed serve call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServeOutcome {
    /// The trigger that stopped the server
    pub cause: ExitCause,
    /// Whether in-flight work was abandoned instead of drained
    pub forced: bool,
    /// Requests admitted over the server's lifetime
    pub requests: u64,
    /// Connections dropped with work in flight
    pub abandoned: u64,
    /// Time from `serve()` to `stopped`
    pub duration: Duration,
    /// Whether signals could reach the server while it ran
    pub signals_installed: bool,
}

impl ServeOutcome {
    /// Process exit status when the server is the top-level entry point
    pub fn exit_code(&self) -> u8 {
        self.cause.exit_code()
    }

    /// Whether a signal stopped the server
    pub fn interrupted(&self) -> bool {
        matches!(self.cause, ExitCause::Signal(_))
    }
}

/// HTTP server driving one application through one lifecycle
///
/// A server serves at most once; construct a new one to serve again.
pub struct Server {
    config: Arc<Config>,
    app: Arc<dyn Application>,
    state: Arc<ServerState>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("phase", &self.state.phase())
            .field("total_requests", &self.state.requests().total())
            .finish()
    }
}

enum Bind {
    Address(SocketAddr),
    Listener(TcpListener),
}

/// Advances to `Stopped` when the serve future completes or is dropped
struct StopOnDrop<'a>(&'a ServerState);

impl Drop for StopOnDrop<'_> {
    fn drop(&mut self) {
        self.0.advance(LifecyclePhase::Stopped);
    }
}

impl Server {
    /// Create a new server builder
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Handle for observing and stopping this server from elsewhere
    pub fn handle(&self) -> ServerHandle {
        ServerHandle::new(Arc::clone(&self.state))
    }

    /// Configuration the server was built with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// True once startup has completed
    pub fn started(&self) -> bool {
        self.state.started()
    }

    /// True once an exit has been requested
    pub fn should_exit(&self) -> bool {
        self.state.should_exit()
    }

    /// Request a graceful stop
    pub fn stop(&self) -> TriggerOutcome {
        self.state.trigger(ExitTrigger::ExplicitStop)
    }

    /// Serve on the configured listen address until an exit trigger fires
    ///
    /// Runs on the ambient tokio runtime alongside any other tasks. An
    /// interrupt completes normally with `ExitCause::Signal`; only startup
    /// failures and misuse return `Err`.
    pub async fn serve(&self) -> Result<ServeOutcome> {
        self.serve_inner(Bind::Address(self.config.server.listen))
            .await
    }

    /// Serve on an already bound listener
    pub async fn serve_with_listener(&self, listener: TcpListener) -> Result<ServeOutcome> {
        self.serve_inner(Bind::Listener(listener)).await
    }

    /// Build the configured event loop and serve on it, blocking the caller
    pub fn run(&self) -> Result<ServeOutcome> {
        let event_loop = EventLoop::from_config(&self.config.server);
        tracing::info!(
            event_loop = ?event_loop.resolved_kind(),
            workers = event_loop.worker_count(),
            "Starting event loop"
        );
        let runtime = event_loop.build()?;
        runtime.block_on(self.serve())
    }

    async fn serve_inner(&self, bind: Bind) -> Result<ServeOutcome> {
        if !self.state.begin() {
            return Err(Error::Lifecycle(
                "server has already been served; construct a new one to serve again".to_string(),
            ));
        }
        let _stopped = StopOnDrop(&self.state);
        let start = Instant::now();

        tracing::info!(
            lifespan = ?self.config.lifespan,
            max_requests = ?self.config.limits.max_requests,
            "Server starting"
        );

        let signals = if self.config.signals.install {
            SignalRegistration::install(Arc::clone(&self.state))
        } else {
            SignalRegistration::disabled()
        };
        let signals_installed = signals.is_installed();

        let mut lifespan = Lifespan::new(self.config.lifespan, Arc::clone(&self.app));
        let (listener, local_addr) = match self.startup(&mut lifespan, bind).await {
            Ok(bound) => bound,
            Err(e) => {
                tracing::error!(error = %e, "Server failed to start");
                lifespan.shutdown().await;
                drop(signals);
                self.state.advance(LifecyclePhase::Stopped);
                return Err(e);
            }
        };

        self.state.mark_started(local_addr);
        tracing::info!(
            "Server running on http://{} (Press CTRL+C to quit)",
            local_addr
        );

        let handler = ConnectionHandler::new(
            Arc::clone(&self.app),
            Arc::clone(&self.state),
            self.config.limits.concurrency,
        );
        let tracker = TaskTracker::new();
        let drain = CancellationToken::new();
        let abort = self.state.force_token().child_token();
        let _drain_guard = drain.clone().drop_guard();
        let _abort_guard = abort.clone().drop_guard();
        let abandoned = Arc::new(AtomicU64::new(0));

        self.accept_loop(&listener, &tracker, |stream, peer| {
            let handler = handler.clone();
            let drain = drain.clone();
            let abort = abort.clone();
            let abandoned = Arc::clone(&abandoned);
            async move {
                if handler.serve(stream, peer, drain, abort).await == ConnectionEnd::Abandoned {
                    abandoned.fetch_add(1, Ordering::Relaxed);
                }
            }
        })
        .await;

        self.state.advance(LifecyclePhase::ShuttingDown);
        drop(listener);
        tracing::info!(
            cause = %self.state.exit_cause(),
            connections = tracker.len(),
            active_requests = handler.active_requests(),
            "Server shutting down"
        );

        drain.cancel();
        tracker.close();
        self.drain(&tracker).await;

        lifespan.shutdown().await;
        drop(signals);

        let outcome = ServeOutcome {
            cause: self.state.exit_cause(),
            forced: self.state.force_exit(),
            requests: self.state.requests().total(),
            abandoned: abandoned.load(Ordering::Relaxed),
            duration: start.elapsed(),
            signals_installed,
        };
        self.state.advance(LifecyclePhase::Stopped);

        tracing::info!(
            cause = %outcome.cause,
            requests = outcome.requests,
            abandoned = outcome.abandoned,
            forced = outcome.forced,
            shutdown_duration_ms = outcome.duration.as_millis(),
            "Server stopped"
        );

        Ok(outcome)
    }

    async fn startup(
        &self,
        lifespan: &mut Lifespan,
        bind: Bind,
    ) -> Result<(TcpListener, SocketAddr)> {
        lifespan.startup().await?;

        let listener = match bind {
            Bind::Listener(listener) => listener,
            Bind::Address(addr) => TcpListener::bind(addr)
                .await
                .map_err(|e| Error::Startup(format!("Failed to bind to {}: {}", addr, e)))?,
        };
        let local_addr = listener
            .local_addr()
            .map_err(|e| Error::Startup(format!("Failed to read listener address: {}", e)))?;

        Ok((listener, local_addr))
    }

    /// Accept until an exit is requested
    ///
    /// The exit flags are re-checked after every accepted connection and on
    /// every idle tick.
    async fn accept_loop<F, Fut>(&self, listener: &TcpListener, tracker: &TaskTracker, mut on_accept: F)
    where
        F: FnMut(tokio::net::TcpStream, SocketAddr) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let exit = self.state.exit_token();
        let mut tick = tokio::time::interval(self.config.timeouts.tick_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if !self.state.should_exit() && self.state.requests().is_exhausted() {
                self.state.trigger(ExitTrigger::RequestLimit);
            }
            if self.state.should_exit() {
                break;
            }

            tokio::select! {
                biased;
                _ = exit.cancelled() => {}
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        tracing::trace!("Accepted connection from {}", peer);
                        tracker.spawn(on_accept(stream, peer));
                    }
                    Err(e) => {
                        tracing::error!("Failed to accept connection: {}", e);
                        accept_backoff(&exit).await;
                    }
                },
                _ = tick.tick() => {}
            }
        }
    }

    /// Wait for connections to close, bounded by the grace period
    ///
    /// A forced exit, or running out of grace, aborts whatever is left.
    async fn drain(&self, tracker: &TaskTracker) {
        let force = self.state.force_token();
        let grace = self.config.timeouts.graceful_shutdown;

        if !tracker.is_empty() {
            tracing::info!(
                connections = tracker.len(),
                timeout_secs = grace.map(|g| g.as_secs()),
                "Waiting for in-flight requests to complete"
            );
        }

        let grace_elapsed = async {
            match grace {
                Some(grace) => tokio::time::sleep(grace).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = tracker.wait() => return,
            _ = force.cancelled() => {
                tracing::warn!(connections = tracker.len(), "Forced exit, abandoning in-flight requests");
            }
            _ = grace_elapsed => {
                tracing::warn!(
                    connections = tracker.len(),
                    "Shutdown timeout reached, forcing shutdown"
                );
                self.state.escalate();
            }
        }

        tracker.wait().await;
    }
}

/// Server builder
pub struct ServerBuilder {
    config: Option<Config>,
    app: Option<Arc<dyn Application>>,
}

impl std::fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerBuilder")
            .field("config", &self.config)
            .field("has_app", &self.app.is_some())
            .finish()
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    /// Create a new server builder
    pub fn new() -> Self {
        Self {
            config: None,
            app: None,
        }
    }

    /// Set configuration; defaults apply when omitted
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the application to serve
    pub fn app(mut self, app: impl Application) -> Self {
        self.app = Some(Arc::new(app));
        self
    }

    /// Set an application that is shared with other owners
    pub fn shared_app(mut self, app: Arc<dyn Application>) -> Self {
        self.app = Some(app);
        self
    }

    /// Build the server
    pub fn build(self) -> Result<Server> {
        let app = self
            .app
            .ok_or_else(|| Error::Config("an application is required".to_string()))?;
        let config = self.config.unwrap_or_default();
        ripcord_config::validate_config(&config)?;

        tracing::debug!(
            listen = %config.server.listen,
            signals = config.signals.install,
            concurrency = ?config.limits.concurrency,
            "Server components initialized"
        );

        Ok(Server {
            state: Arc::new(ServerState::new(config.limits.max_requests)),
            config: Arc::new(config),
            app,
        })
    }
}

/// Sleep for [`ACCEPT_BACKOFF`] unless an exit is requested first
async fn accept_backoff(exit: &CancellationToken) {
    tokio::select! {
        _ = exit.cancelled() => {}
        _ = tokio::time::sleep(ACCEPT_BACKOFF) => {}
    }
}
