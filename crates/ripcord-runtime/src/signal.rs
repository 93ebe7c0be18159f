//! Signal bridge
//!
//! Turns SIGINT/SIGTERM into exit triggers on the server state. The raw
//! handler installed through `signal-hook` only records the signal; the
//! trigger itself runs on a tokio task, so nothing but flag-setting happens
//! in signal context.
//!
//! Handlers are held by a [`SignalRegistration`] for the duration of one
//! serve call. Signals are process-wide, so every server holding a
//! registration sees every delivered signal. While no registration is held,
//! signals behave as they did before the first install: a default
//! disposition terminates the process and an existing handler is called.

use crate::state::ServerState;
use crate::trigger::ExitTrigger;
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;

#[cfg(unix)]
use signal_hook::consts::{SIGINT, SIGTERM};

#[cfg(not(unix))]
const SIGINT: i32 = 2;
#[cfg(not(unix))]
const SIGTERM: i32 = 15;

/// Termination signals recognized by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// SIGINT, Ctrl+C
    Interrupt,
    /// SIGTERM
    Terminate,
}

impl Signal {
    /// Every recognized signal
    pub const ALL: [Signal; 2] = [Signal::Interrupt, Signal::Terminate];

    /// Raw signal number
    pub fn as_raw(self) -> i32 {
        match self {
            Signal::Interrupt => SIGINT,
            Signal::Terminate => SIGTERM,
        }
    }

    /// Map a raw signal number to a recognized signal
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            SIGINT => Some(Signal::Interrupt),
            SIGTERM => Some(Signal::Terminate),
            _ => None,
        }
    }

    /// Conventional exit status of a process stopped by this signal
    pub fn exit_code(self) -> u8 {
        128 + self.as_raw() as u8
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Interrupt => write!(f, "SIGINT"),
            Signal::Terminate => write!(f, "SIGTERM"),
        }
    }
}

/// Outcome of installing signal handlers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalSupport {
    /// Handlers are installed and feed the exit latch
    Installed,
    /// Installation was turned off by configuration
    Disabled,
    /// Installation failed; serving continues without signal-triggered shutdown
    Degraded {
        /// Why installation failed
        reason: String,
    },
}

/// Scoped ownership of the process signal handlers
///
/// Dropping the registration unregisters its handlers and, once no
/// registration is left in the process, restores the prior disposition.
pub struct SignalRegistration {
    support: SignalSupport,
    listener: Option<JoinHandle<()>>,
    #[cfg(unix)]
    handle: Option<signal_hook_tokio::Handle>,
    #[cfg(unix)]
    _claim: Option<disposition::Claim>,
}

impl fmt::Debug for SignalRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalRegistration")
            .field("support", &self.support)
            .finish()
    }
}

impl SignalRegistration {
    /// Install handlers forwarding to `state`
    ///
    /// Must be called from within a tokio runtime. Never fails: errors
    /// degrade to serving without signal handling.
    pub(crate) fn install(state: Arc<ServerState>) -> Self {
        #[cfg(unix)]
        {
            Self::install_unix(state)
        }

        #[cfg(not(unix))]
        {
            Self::install_ctrl_c(state)
        }
    }

    /// A registration that holds nothing
    pub(crate) fn disabled() -> Self {
        tracing::debug!("Signal handlers disabled by configuration");
        Self::without_handlers(SignalSupport::Disabled)
    }

    fn degraded(reason: String) -> Self {
        tracing::warn!(
            reason = %reason,
            "Signal handlers unavailable, serving without signal-triggered shutdown"
        );
        Self::without_handlers(SignalSupport::Degraded { reason })
    }

    fn without_handlers(support: SignalSupport) -> Self {
        Self {
            support,
            listener: None,
            #[cfg(unix)]
            handle: None,
            #[cfg(unix)]
            _claim: None,
        }
    }

    #[cfg(unix)]
    fn install_unix(state: Arc<ServerState>) -> Self {
        let claim = match disposition::claim() {
            Ok(claim) => claim,
            Err(e) => return Self::degraded(e.to_string()),
        };

        let signals = match signal_hook_tokio::Signals::new(Signal::ALL.map(Signal::as_raw)) {
            Ok(signals) => signals,
            Err(e) => return Self::degraded(e.to_string()),
        };

        let handle = signals.handle();
        let listener = tokio::spawn(forward_signals(signals, state));
        tracing::debug!("Signal handlers installed");

        Self {
            support: SignalSupport::Installed,
            listener: Some(listener),
            handle: Some(handle),
            _claim: Some(claim),
        }
    }

    #[cfg(not(unix))]
    fn install_ctrl_c(state: Arc<ServerState>) -> Self {
        let listener = tokio::spawn(async move {
            loop {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        state.trigger(ExitTrigger::Signal(Signal::Interrupt));
                    }
                    Err(err) => {
                        tracing::error!("Failed to listen for Ctrl+C: {}", err);
                        break;
                    }
                }
            }
        });

        Self {
            support: SignalSupport::Installed,
            listener: Some(listener),
        }
    }

    /// How installation went
    pub fn support(&self) -> &SignalSupport {
        &self.support
    }

    /// Whether signals will reach the server
    pub fn is_installed(&self) -> bool {
        self.support == SignalSupport::Installed
    }
}

impl Drop for SignalRegistration {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Some(handle) = self.handle.take() {
            handle.close();
        }
        if let Some(listener) = self.listener.take() {
            listener.abort();
            tracing::debug!("Signal handlers released");
        }
    }
}

#[cfg(unix)]
async fn forward_signals(mut signals: signal_hook_tokio::Signals, state: Arc<ServerState>) {
    use futures::StreamExt;

    while let Some(raw) = signals.next().await {
        if let Some(signal) = Signal::from_raw(raw) {
            state.trigger(ExitTrigger::Signal(signal));
        }
    }
}

/// Process-wide fallback for the recognized signals
///
/// `signal-hook` keeps its low-level handler installed once a signal has
/// been registered. On release it chains to whatever handler was there
/// before, but it never runs a default disposition, so an unregistered
/// SIGINT would be swallowed. For each signal whose disposition was the
/// default when first claimed, a conditional default action is registered
/// and armed whenever no registration is held. Signals that already had a
/// handler are left to chaining, so a caller's own handler keeps working.
#[cfg(unix)]
mod disposition {
    use super::Signal;
    use parking_lot::Mutex;
    use std::io;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, OnceLock};

    struct Disposition {
        restore_default: Arc<AtomicBool>,
        owners: usize,
        inspected: Vec<Signal>,
    }

    fn registry() -> &'static Mutex<Disposition> {
        static REGISTRY: OnceLock<Mutex<Disposition>> = OnceLock::new();
        REGISTRY.get_or_init(|| {
            Mutex::new(Disposition {
                restore_default: Arc::new(AtomicBool::new(true)),
                owners: 0,
                inspected: Vec::new(),
            })
        })
    }

    /// Whether `signal` currently has the default disposition
    #[allow(unsafe_code)]
    fn is_default(signal: Signal) -> io::Result<bool> {
        use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet};

        let raw = nix::sys::signal::Signal::try_from(signal.as_raw())?;
        let probe = SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty());
        // SAFETY: the previous action is put back unchanged right away and
        // the probe action runs no code.
        let previous = unsafe { sigaction(raw, &probe) }?;
        unsafe { sigaction(raw, &previous) }?;
        Ok(previous.handler() == SigHandler::SigDfl)
    }

    /// One owner of the recognized signals
    #[derive(Debug)]
    pub(super) struct Claim(());

    pub(super) fn claim() -> io::Result<Claim> {
        let mut disposition = registry().lock();

        for signal in Signal::ALL {
            if disposition.inspected.contains(&signal) {
                continue;
            }
            if is_default(signal)? {
                signal_hook::flag::register_conditional_default(
                    signal.as_raw(),
                    Arc::clone(&disposition.restore_default),
                )?;
            } else {
                tracing::debug!(%signal, "Existing handler found, chaining to it on release");
            }
            disposition.inspected.push(signal);
        }

        disposition.owners += 1;
        disposition.restore_default.store(false, Ordering::SeqCst);
        Ok(Claim(()))
    }

    #[cfg(test)]
    pub(super) fn owners() -> usize {
        registry().lock().owners
    }

    impl Drop for Claim {
        fn drop(&mut self) {
            let mut disposition = registry().lock();
            disposition.owners = disposition.owners.saturating_sub(1);
            if disposition.owners == 0 {
                disposition.restore_default.store(true, Ordering::SeqCst);
            }
        }
    }
}
