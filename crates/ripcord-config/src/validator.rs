//! Configuration validation

use crate::types::LoopKind;
use crate::Config;
use ripcord_core::{Error, Result};

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_server(config)?;
    validate_limits(config)?;
    validate_timeouts(config)?;
    validate_logging(config)?;

    Ok(())
}

fn validate_server(config: &Config) -> Result<()> {
    if config.server.workers > 0 && config.server.event_loop == LoopKind::CurrentThread {
        tracing::warn!(
            workers = config.server.workers,
            "workers is ignored by the current_thread event loop"
        );
    }

    Ok(())
}

fn validate_limits(config: &Config) -> Result<()> {
    if config.limits.concurrency == Some(0) {
        return Err(Error::Config("limits.concurrency must be > 0".to_string()));
    }

    if config.limits.max_requests == Some(0) {
        tracing::warn!("limits.max_requests is 0, the server will stop without serving requests");
    }

    Ok(())
}

fn validate_timeouts(config: &Config) -> Result<()> {
    if config.timeouts.tick_interval.is_zero() {
        return Err(Error::Config("timeouts.tick_interval must be > 0".to_string()));
    }

    match config.timeouts.graceful_shutdown {
        Some(grace) if grace.is_zero() => {
            return Err(Error::Config(
                "timeouts.graceful_shutdown must be > 0 (omit it for no limit)".to_string(),
            ));
        }
        Some(grace) if grace.as_secs() > 300 => {
            tracing::warn!("timeouts.graceful_shutdown is very high (>5 minutes)");
        }
        None => {
            tracing::warn!("timeouts.graceful_shutdown is unbounded, only a second signal forces exit");
        }
        _ => {}
    }

    Ok(())
}

fn validate_logging(config: &Config) -> Result<()> {
    match config.observability.logging.format.as_str() {
        "text" | "json" => Ok(()),
        other => Err(Error::Config(format!(
            "Invalid log format: {other} (must be text or json)"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_zero_tick_interval() {
        let mut config = Config::default();
        config.timeouts.tick_interval = Duration::ZERO;

        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("tick_interval"));
    }

    #[test]
    fn test_zero_grace_period() {
        let mut config = Config::default();
        config.timeouts.graceful_shutdown = Some(Duration::ZERO);
        assert!(validate_config(&config).is_err());

        config.timeouts.graceful_shutdown = None;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_zero_concurrency() {
        let mut config = Config::default();
        config.limits.concurrency = Some(0);
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_zero_max_requests_is_allowed() {
        let mut config = Config::default();
        config.limits.max_requests = Some(0);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_invalid_log_format() {
        let mut config = Config::default();
        config.observability.logging.format = "xml".to_string();
        assert!(validate_config(&config).is_err());
    }
}
