//! Typed configuration errors.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating `buster.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config {0}")]
    Io(PathBuf, #[source] std::io::Error),

    /// The config file could not be parsed as TOML.
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// One or more fields failed validation.
    #[error("invalid config:\n{}", .0.join("\n"))]
    Validation(Vec<String>),
}
