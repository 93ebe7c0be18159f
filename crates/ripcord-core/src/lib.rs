//! # Ripcord Core
//!
//! Core types, traits, and error handling for the Ripcord server.
//!
//! This crate provides the foundational abstractions shared by the other crates:
//! - The [`Application`] trait and lifespan support
//! - Error types
//! - Response helpers

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod app;
pub mod error;
pub mod response;

pub use app::{app_fn, AppFn, Application, Body, LifespanSupport};
pub use error::{Error, Result};
pub use response::{responses, ResponseBuilder};

// Re-export commonly used HTTP types
pub use bytes::Bytes;
pub use http::{Request, Response, StatusCode};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::app::{app_fn, Application, Body, LifespanSupport};
    pub use crate::error::{Error, Result};
    pub use crate::response::{responses, ResponseBuilder};
}
