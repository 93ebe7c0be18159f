//! Externally visible lifecycle handle

use crate::state::{LifecyclePhase, ServerState};
use crate::trigger::{ExitCause, ExitTrigger, TriggerOutcome};
use std::net::SocketAddr;
use std::sync::Arc;

/// Handle for observing and stopping a server from other tasks or threads
///
/// `ServerHandle` is `Clone + Send + Sync`. Every getter is a plain atomic
/// load and never blocks or fails.
///
/// # Example
///
/// ```no_run
/// use ripcord_core::{app_fn, responses};
/// use ripcord_runtime::Server;
///
/// # async fn demo() -> ripcord_core::Result<()> {
/// let server = Server::builder()
///     .app(app_fn(|_req| async { responses::ok().text("hello") }))
///     .build()?;
/// let handle = server.handle();
///
/// tokio::spawn(async move {
///     if handle.wait_started().await {
///         handle.stop();
///     }
/// });
///
/// let outcome = server.serve().await?;
/// assert_eq!(outcome.exit_code(), 0);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ServerHandle {
    state: Arc<ServerState>,
}

impl ServerHandle {
    pub(crate) fn new(state: Arc<ServerState>) -> Self {
        Self { state }
    }

    /// True once the server has completed startup and is accepting
    ///
    /// Stays true after the server stops.
    pub fn started(&self) -> bool {
        self.state.started()
    }

    /// True once any exit trigger has fired
    pub fn should_exit(&self) -> bool {
        self.state.should_exit()
    }

    /// True once in-flight work is being abandoned rather than drained
    pub fn force_exit(&self) -> bool {
        self.state.force_exit()
    }

    /// The first trigger that requested an exit
    pub fn exit_cause(&self) -> ExitCause {
        self.state.exit_cause()
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> LifecyclePhase {
        self.state.phase()
    }

    /// Number of requests admitted so far
    pub fn total_requests(&self) -> u64 {
        self.state.requests().total()
    }

    /// Address the server is listening on, once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.state.local_addr()
    }

    /// Request a graceful stop
    ///
    /// Idempotent: only the first trigger records the exit cause.
    pub fn stop(&self) -> TriggerOutcome {
        self.state.trigger(ExitTrigger::ExplicitStop)
    }

    /// Request a stop that abandons in-flight work
    pub fn force_stop(&self) {
        self.state.trigger(ExitTrigger::ExplicitStop);
        self.state.escalate();
    }

    /// Wait until the server has started
    ///
    /// Returns false if the server stopped without starting, e.g. after a
    /// startup failure.
    pub async fn wait_started(&self) -> bool {
        let mut rx = self.state.subscribe();
        let _ = rx.wait_for(|phase| *phase >= LifecyclePhase::Started).await;
        self.started()
    }

    /// Wait until the server has released all of its resources
    pub async fn wait_stopped(&self) {
        let mut rx = self.state.subscribe();
        let _ = rx.wait_for(|phase| *phase == LifecyclePhase::Stopped).await;
    }
}
