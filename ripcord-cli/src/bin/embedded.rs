//! Runs the server as one task among several on a caller-owned runtime
//!
//! A sibling task keeps ticking while the server serves. On an interrupt
//! the server shuts down, the sibling is left alone, and the process exits
//! with the interrupt's status.

use anyhow::Result;
use clap::Parser;
use ripcord_cli::{demo_app, init_tracing};
use ripcord_config::ConfigBuilder;
use ripcord_runtime::Server;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "ripcord-embedded")]
#[command(about = "Ripcord embedded in a shared event loop", long_about = None)]
struct Args {
    /// Listen address
    #[arg(long, default_value = "127.0.0.1:0")]
    listen: SocketAddr,

    /// Stop after serving this many requests
    #[arg(long)]
    limit_max_requests: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_tracing(&args.log_level, "text")?;

    let config = ConfigBuilder::new()
        .listen(args.listen)
        .max_requests(args.limit_max_requests)
        .build()?;
    let server = Server::builder().config(config).app(demo_app()).build()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let outcome = runtime.block_on(async {
        let ticks = Arc::new(AtomicU64::new(0));
        let ticker = tokio::spawn({
            let ticks = Arc::clone(&ticks);
            async move {
                let mut interval = tokio::time::interval(Duration::from_millis(50));
                loop {
                    interval.tick().await;
                    ticks.fetch_add(1, Ordering::Relaxed);
                }
            }
        });

        let outcome = server.serve().await;

        tracing::info!(
            ticks = ticks.load(Ordering::Relaxed),
            running = !ticker.is_finished(),
            "Sibling task state after serve"
        );
        ticker.abort();
        outcome
    })?;

    tracing::info!(
        cause = %outcome.cause,
        exit_code = outcome.exit_code(),
        "Embedded server finished"
    );
    Ok(ExitCode::from(outcome.exit_code()))
}
