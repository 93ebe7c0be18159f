//! # Ripcord Runtime
//!
//! Server lifecycle management with:
//! - A forward-only lifecycle state machine
//! - Exit triggers from signals, a request limit and explicit stops
//! - Graceful draining with a bounded grace period and forced exit
//! - Scoped signal handler ownership
//! - Event loop selection for top-level use

#![deny(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

mod connection;
mod lifespan;

pub mod handle;
pub mod server;
pub mod signal;
pub mod state;
pub mod trigger;
pub mod worker;

pub use handle::ServerHandle;
pub use server::{ServeOutcome, Server, ServerBuilder};
pub use signal::{Signal, SignalRegistration, SignalSupport};
pub use state::LifecyclePhase;
pub use trigger::{ExitCause, ExitTrigger, TriggerOutcome};
pub use worker::EventLoop;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::handle::ServerHandle;
    pub use crate::server::{ServeOutcome, Server, ServerBuilder};
    pub use crate::state::LifecyclePhase;
    pub use crate::trigger::ExitCause;
}
