//! # Ripcord Configuration
//!
//! Configuration for the Ripcord server: listener, limits,
//! shutdown timing, lifespan policy and signal handling. Files may be
//! YAML, TOML or JSON, with `${VAR}` and `${VAR:-default}` expanded from
//! the environment before parsing. Every field has a default, so an empty
//! file is a valid configuration.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod builder;
pub mod loader;
pub mod types;
pub mod validator;

pub use builder::ConfigBuilder;
pub use loader::{load_config, load_from_file, load_from_str};
pub use types::{
    Config, LifespanMode, LimitsConfig, LoggingConfig, LoopKind, ObservabilityConfig, ServerConfig,
    SignalConfig, TimeoutsConfig,
};
pub use validator::validate_config;

use ripcord_core::{Error, Result};
use std::path::Path;

/// On-disk configuration syntax
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.yaml` / `.yml`
    Yaml,
    /// `.toml`
    Toml,
    /// `.json`
    Json,
}

impl ConfigFormat {
    /// Pick the syntax from a file extension, ignoring case
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| {
                Error::Config(format!(
                    "{} has no extension; expected .yaml, .toml or .json",
                    path.display()
                ))
            })?;

        match ext.as_str() {
            "yaml" | "yml" => Ok(Self::Yaml),
            "toml" => Ok(Self::Toml),
            "json" => Ok(Self::Json),
            other => Err(Error::Config(format!(
                "{}: unsupported config extension .{}",
                path.display(),
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        let cases = [
            ("ripcord.yml", ConfigFormat::Yaml),
            ("ripcord.YAML", ConfigFormat::Yaml),
            ("conf/ripcord.toml", ConfigFormat::Toml),
            ("ripcord.json", ConfigFormat::Json),
        ];
        for (path, expected) in cases {
            assert_eq!(ConfigFormat::from_path(Path::new(path)).unwrap(), expected);
        }
    }

    #[test]
    fn test_unsupported_format() {
        let err = ConfigFormat::from_path(Path::new("ripcord.ini")).unwrap_err();
        assert!(err.to_string().contains(".ini"));
        assert!(ConfigFormat::from_path(Path::new("ripcord")).is_err());
    }
}
