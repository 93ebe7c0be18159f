//! Exit triggers and the latch that reconciles them
//!
//! Three independent sources can ask the server to stop: an OS signal, the
//! request counter reaching its limit, and an explicit stop from the
//! embedding caller. The first one to arrive owns the exit cause.

use crate::signal::Signal;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;

const CAUSE_NONE: u32 = 0;
const CAUSE_REQUEST_LIMIT: u32 = 1;
const CAUSE_EXPLICIT_STOP: u32 = 2;
const CAUSE_SIGNAL: u32 = 0x100;

/// A request to stop serving
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitTrigger {
    /// An OS interrupt or terminate signal was delivered
    Signal(Signal),
    /// The request counter reached `limits.max_requests`
    RequestLimit,
    /// The embedding caller asked the server to stop
    ExplicitStop,
}

/// Why the server stopped, fixed by the first trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExitCause {
    /// No trigger has fired yet
    #[default]
    None,
    /// Stopped by an OS signal
    Signal(Signal),
    /// Stopped after serving the configured number of requests
    RequestLimit,
    /// Stopped by an explicit stop call
    ExplicitStop,
}

impl ExitCause {
    /// Process exit status for a top-level server stopped by this cause
    ///
    /// Signals map to `128 + signo`; every other cause is a clean exit.
    pub fn exit_code(&self) -> u8 {
        match self {
            ExitCause::Signal(signal) => signal.exit_code(),
            _ => 0,
        }
    }

    fn encode(self) -> u32 {
        match self {
            ExitCause::None => CAUSE_NONE,
            ExitCause::RequestLimit => CAUSE_REQUEST_LIMIT,
            ExitCause::ExplicitStop => CAUSE_EXPLICIT_STOP,
            ExitCause::Signal(signal) => CAUSE_SIGNAL | signal.as_raw() as u32,
        }
    }

    fn decode(raw: u32) -> Self {
        match raw {
            CAUSE_NONE => ExitCause::None,
            CAUSE_REQUEST_LIMIT => ExitCause::RequestLimit,
            CAUSE_EXPLICIT_STOP => ExitCause::ExplicitStop,
            raw => Signal::from_raw((raw & !CAUSE_SIGNAL) as i32)
                .map(ExitCause::Signal)
                .unwrap_or(ExitCause::None),
        }
    }
}

impl From<ExitTrigger> for ExitCause {
    fn from(trigger: ExitTrigger) -> Self {
        match trigger {
            ExitTrigger::Signal(signal) => ExitCause::Signal(signal),
            ExitTrigger::RequestLimit => ExitCause::RequestLimit,
            ExitTrigger::ExplicitStop => ExitCause::ExplicitStop,
        }
    }
}

impl fmt::Display for ExitCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitCause::None => write!(f, "none"),
            ExitCause::Signal(signal) => write!(f, "signal ({signal})"),
            ExitCause::RequestLimit => write!(f, "request limit"),
            ExitCause::ExplicitStop => write!(f, "explicit stop"),
        }
    }
}

/// What a trigger did to the latch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// This trigger requested the exit and owns the cause
    First,
    /// An exit was already requested; the cause is unchanged
    Recorded,
    /// A repeated signal escalated to a forced exit
    Escalated,
}

/// Single-assignment exit state shared between signal tasks, connection
/// tasks, external handles and the serve loop.
///
/// `should_exit` is derived from the cause word, so flipping the flag and
/// recording the cause is one compare-and-swap.
#[derive(Debug, Default)]
pub(crate) struct ExitLatch {
    cause: AtomicU32,
    signals: AtomicU32,
    force: AtomicBool,
    exit: CancellationToken,
    forced: CancellationToken,
}

impl ExitLatch {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Apply a trigger
    ///
    /// The second recognized signal escalates to force exit. A first signal
    /// after another trigger is only recorded.
    pub(crate) fn fire(&self, trigger: ExitTrigger) -> TriggerOutcome {
        let repeated_signal = matches!(trigger, ExitTrigger::Signal(_))
            && self.signals.fetch_add(1, Ordering::AcqRel) > 0;
        let encoded = ExitCause::from(trigger).encode();
        match self
            .cause
            .compare_exchange(CAUSE_NONE, encoded, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                self.exit.cancel();
                TriggerOutcome::First
            }
            Err(_) if repeated_signal && self.escalate() => TriggerOutcome::Escalated,
            Err(_) => TriggerOutcome::Recorded,
        }
    }

    /// Set `force_exit`; returns whether this call flipped it
    ///
    /// Refuses to force before an exit was requested.
    pub(crate) fn escalate(&self) -> bool {
        if !self.should_exit() {
            return false;
        }
        let flipped = !self.force.swap(true, Ordering::AcqRel);
        self.forced.cancel();
        flipped
    }

    pub(crate) fn should_exit(&self) -> bool {
        self.cause.load(Ordering::Acquire) != CAUSE_NONE
    }

    pub(crate) fn force_exit(&self) -> bool {
        self.force.load(Ordering::Acquire)
    }

    pub(crate) fn cause(&self) -> ExitCause {
        ExitCause::decode(self.cause.load(Ordering::Acquire))
    }

    /// Cancelled once `should_exit` is set
    pub(crate) fn exit_token(&self) -> CancellationToken {
        self.exit.clone()
    }

    /// Cancelled once `force_exit` is set
    pub(crate) fn force_token(&self) -> CancellationToken {
        self.forced.clone()
    }
}

/// Result of asking the counter to admit a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    /// The request may run; `limit_reached` is true for exactly one request
    Accepted {
        /// This request brought the count up to the limit
        limit_reached: bool,
    },
    /// The limit was already reached before this request
    Rejected,
}

/// Monotonic count of requests that began processing
#[derive(Debug)]
pub(crate) struct RequestCounter {
    count: AtomicU64,
    limit: Option<u64>,
}

impl RequestCounter {
    pub(crate) fn new(limit: Option<u64>) -> Self {
        Self {
            count: AtomicU64::new(0),
            limit,
        }
    }

    /// Count a request unless the limit has already been reached
    ///
    /// The limit gates acceptance of further requests only; the request that
    /// reaches it is admitted and runs to completion.
    pub(crate) fn admit(&self) -> Admission {
        let Some(limit) = self.limit else {
            self.count.fetch_add(1, Ordering::AcqRel);
            return Admission::Accepted {
                limit_reached: false,
            };
        };

        let mut current = self.count.load(Ordering::Acquire);
        loop {
            if current >= limit {
                return Admission::Rejected;
            }
            match self.count.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    return Admission::Accepted {
                        limit_reached: current + 1 == limit,
                    }
                }
                Err(actual) => current = actual,
            }
        }
    }

    pub(crate) fn total(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    pub(crate) fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// Whether no further request will be admitted
    pub(crate) fn is_exhausted(&self) -> bool {
        self.limit.is_some_and(|limit| self.total() >= limit)
    }
}
