//! Ripcord CLI

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use ripcord_cli::{demo_app, init_tracing};
use ripcord_config::{load_config, Config, LoopKind};
use ripcord_runtime::Server;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "ripcord")]
#[command(about = "Ripcord HTTP server", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the built-in application
    Serve {
        /// Path to configuration file
        #[arg(short, long, env = "RIPCORD_CONFIG")]
        config: Option<PathBuf>,

        /// Listen address, overrides the config file
        #[arg(long)]
        listen: Option<SocketAddr>,

        /// Stop after serving this many requests
        #[arg(long)]
        limit_max_requests: Option<u64>,

        /// Seconds to wait for in-flight requests on shutdown
        #[arg(long)]
        timeout_graceful_shutdown: Option<u64>,

        /// Event loop flavor
        #[arg(long = "loop", value_enum)]
        event_loop: Option<LoopArg>,

        /// Log level (trace, debug, info, warn, error)
        #[arg(short, long)]
        log_level: Option<String>,
    },

    /// Validate configuration file
    Validate {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,
    },

    /// Show version information
    Version,
}

#[derive(Clone, Copy, ValueEnum)]
enum LoopArg {
    Auto,
    CurrentThread,
    MultiThread,
}

impl From<LoopArg> for LoopKind {
    fn from(arg: LoopArg) -> Self {
        match arg {
            LoopArg::Auto => LoopKind::Auto,
            LoopArg::CurrentThread => LoopKind::CurrentThread,
            LoopArg::MultiThread => LoopKind::MultiThread,
        }
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            listen,
            limit_max_requests,
            timeout_graceful_shutdown,
            event_loop,
            log_level,
        } => {
            let mut cfg = match &config {
                Some(path) => load_config(path)?,
                None => Config::default(),
            };

            if let Some(listen) = listen {
                cfg.server.listen = listen;
            }
            if limit_max_requests.is_some() {
                cfg.limits.max_requests = limit_max_requests;
            }
            if let Some(secs) = timeout_graceful_shutdown {
                cfg.timeouts.graceful_shutdown = Some(Duration::from_secs(secs));
            }
            if let Some(event_loop) = event_loop {
                cfg.server.event_loop = event_loop.into();
            }

            let level = log_level.unwrap_or_else(|| cfg.observability.logging.level.clone());
            init_tracing(&level, &cfg.observability.logging.format)?;

            if let Some(path) = &config {
                tracing::info!("Config file: {}", path.display());
            }

            let server = Server::builder().config(cfg).app(demo_app()).build()?;
            let outcome = server.run()?;

            if outcome.interrupted() {
                tracing::info!(
                    exit_code = outcome.exit_code(),
                    "Exiting after {}",
                    outcome.cause
                );
            }
            Ok(ExitCode::from(outcome.exit_code()))
        }

        Commands::Validate { config } => {
            init_tracing("info", "text")?;

            tracing::info!("Validating configuration: {}", config.display());

            match load_config(&config) {
                Ok(cfg) => {
                    tracing::info!("✓ Configuration is valid");
                    tracing::info!("  Listen: {}", cfg.server.listen);
                    tracing::info!("  Event loop: {:?}", cfg.server.event_loop);
                    tracing::info!("  Max requests: {:?}", cfg.limits.max_requests);
                    tracing::info!("  Graceful shutdown: {:?}", cfg.timeouts.graceful_shutdown);
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    tracing::error!("✗ Configuration validation failed: {}", e);
                    Ok(ExitCode::FAILURE)
                }
            }
        }

        Commands::Version => {
            println!("Ripcord HTTP server");
            println!("Version: {}", env!("CARGO_PKG_VERSION"));
            println!("Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
            Ok(ExitCode::SUCCESS)
        }
    }
}
