//! Shared pieces of the Ripcord binaries

use anyhow::Result;
use ripcord_core::{app_fn, responses, Application, Bytes, Request};
use std::io::IsTerminal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber
///
/// `level` is a default directive; `RUST_LOG` refines it. Output goes to
/// stdout so harnesses can wait for the readiness line.
pub fn init_tracing(level: &str, format: &str) -> Result<()> {
    let filter = match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(filter.into())
        .from_env_lossy();

    let registry = tracing_subscriber::registry().with(filter);
    if format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(false))
            .try_init()?;
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_ansi(std::io::stdout().is_terminal()),
            )
            .try_init()?;
    }

    Ok(())
}

/// Built-in application served by the binaries
pub fn demo_app() -> impl Application {
    app_fn(|request: Request<Bytes>| async move {
        match request.uri().path() {
            "/health" => responses::ok().text("ok"),
            path => responses::ok().text(format!("Hello from ripcord ({} {})", request.method(), path)),
        }
    })
}
