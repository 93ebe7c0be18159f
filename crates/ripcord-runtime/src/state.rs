//! Server lifecycle state machine
//!
//! The phase only moves forward:
//! `NotStarted -> Starting -> Started -> ShuttingDown -> Stopped`.
//! A startup failure jumps straight from `Starting` to `Stopped`.

use crate::trigger::{ExitCause, ExitLatch, ExitTrigger, RequestCounter, TriggerOutcome};
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::OnceLock;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Phase of a server lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LifecyclePhase {
    /// Constructed, `serve()` not called yet
    NotStarted = 0,
    /// Acquiring signal handlers, running lifespan startup, binding
    Starting = 1,
    /// Accepting and dispatching requests
    Started = 2,
    /// No longer accepting; draining or abandoning in-flight work
    ShuttingDown = 3,
    /// All owned resources released
    Stopped = 4,
}

impl LifecyclePhase {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::NotStarted,
            1 => Self::Starting,
            2 => Self::Started,
            3 => Self::ShuttingDown,
            _ => Self::Stopped,
        }
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "NotStarted"),
            Self::Starting => write!(f, "Starting"),
            Self::Started => write!(f, "Started"),
            Self::ShuttingDown => write!(f, "ShuttingDown"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}

/// State shared between the serve loop and everything that observes or
/// triggers it. Only atomics cross the signal/loop boundary.
#[derive(Debug)]
pub(crate) struct ServerState {
    phase: AtomicU8,
    started: AtomicBool,
    latch: ExitLatch,
    requests: RequestCounter,
    phase_tx: watch::Sender<LifecyclePhase>,
    local_addr: OnceLock<SocketAddr>,
}

impl ServerState {
    pub(crate) fn new(max_requests: Option<u64>) -> Self {
        let (phase_tx, _) = watch::channel(LifecyclePhase::NotStarted);
        Self {
            phase: AtomicU8::new(LifecyclePhase::NotStarted as u8),
            started: AtomicBool::new(false),
            latch: ExitLatch::new(),
            requests: RequestCounter::new(max_requests),
            phase_tx,
            local_addr: OnceLock::new(),
        }
    }

    pub(crate) fn phase(&self) -> LifecyclePhase {
        LifecyclePhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Claim the lifecycle for a serve call; fails if it was already claimed
    pub(crate) fn begin(&self) -> bool {
        let claimed = self
            .phase
            .compare_exchange(
                LifecyclePhase::NotStarted as u8,
                LifecyclePhase::Starting as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if claimed {
            self.publish(LifecyclePhase::Starting);
        }
        claimed
    }

    /// Move forward to `to`; moving backwards or sideways is a no-op
    pub(crate) fn advance(&self, to: LifecyclePhase) -> bool {
        let previous = LifecyclePhase::from_u8(self.phase.fetch_max(to as u8, Ordering::AcqRel));
        if previous >= to {
            return false;
        }
        tracing::trace!(from = %previous, to = %to, "Lifecycle transition");
        self.publish(to);
        true
    }

    fn publish(&self, to: LifecyclePhase) {
        self.phase_tx.send_if_modified(|current| {
            if *current < to {
                *current = to;
                true
            } else {
                false
            }
        });
    }

    /// Flip `started` once the startup handshake has completed
    pub(crate) fn mark_started(&self, local_addr: SocketAddr) {
        let _ = self.local_addr.set(local_addr);
        self.started.store(true, Ordering::Release);
        self.advance(LifecyclePhase::Started);
    }

    pub(crate) fn started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub(crate) fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<LifecyclePhase> {
        self.phase_tx.subscribe()
    }

    /// Feed a trigger into the exit latch
    pub(crate) fn trigger(&self, trigger: ExitTrigger) -> TriggerOutcome {
        let outcome = self.latch.fire(trigger);
        match (outcome, trigger) {
            (TriggerOutcome::First, ExitTrigger::Signal(signal)) => {
                tracing::info!(
                    "Received {}, shutting down gracefully (send it again to force exit)",
                    signal
                );
            }
            (TriggerOutcome::First, ExitTrigger::RequestLimit) => {
                tracing::warn!(
                    "Maximum request limit of {} exceeded. Terminating process.",
                    self.requests.limit().unwrap_or_default()
                );
            }
            (TriggerOutcome::First, ExitTrigger::ExplicitStop) => {
                tracing::info!("Stop requested");
            }
            (TriggerOutcome::Escalated, _) => {
                tracing::warn!(trigger = ?trigger, "Repeated signal, forcing exit");
            }
            (TriggerOutcome::Recorded, _) => {
                tracing::debug!(
                    trigger = ?trigger,
                    cause = %self.latch.cause(),
                    "Exit already requested"
                );
            }
        }
        outcome
    }

    /// Abandon in-flight work; only effective once an exit was requested
    pub(crate) fn escalate(&self) -> bool {
        self.latch.escalate()
    }

    pub(crate) fn should_exit(&self) -> bool {
        self.latch.should_exit()
    }

    pub(crate) fn force_exit(&self) -> bool {
        self.latch.force_exit()
    }

    pub(crate) fn exit_cause(&self) -> ExitCause {
        self.latch.cause()
    }

    pub(crate) fn exit_token(&self) -> CancellationToken {
        self.latch.exit_token()
    }

    pub(crate) fn force_token(&self) -> CancellationToken {
        self.latch.force_token()
    }

    pub(crate) fn requests(&self) -> &RequestCounter {
        &self.requests
    }
}
