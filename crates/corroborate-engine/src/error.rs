//! Error types for the engine
//!
//! Only [`EngineError`] ever reaches the caller of a run. Everything a port
//! or a degraded component reports becomes a warning on the run instead.

use thiserror::Error;

/// Fatal errors that abort a run
#[derive(Error, Debug)]
pub enum EngineError {
    /// Configuration invariant violated
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A mutation would break a run state invariant
    #[error("Run state corruption: {0}")]
    StateCorruption(String),

    /// One of the engine's own tasks panicked or was aborted
    #[error("Task join error: {0}")]
    Join(String),
}

impl From<tokio::task::JoinError> for EngineError {
    fn from(e: tokio::task::JoinError) -> Self {
        EngineError::Join(e.to_string())
    }
}

/// Errors from the task decomposer
///
/// The orchestrator treats every variant as a degraded outcome and falls
/// back to the undecomposed query.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecompositionError {
    /// The reasoning port failed or answered with an unusable structure
    #[error("Decomposition unavailable: {0}")]
    Unavailable(String),

    /// The run was canceled during the call
    #[error("Decomposition canceled")]
    Canceled,
}

/// Errors loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read a configuration file
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse error
    #[error("Failed to parse TOML: {0}")]
    Parse(String),

    /// TOML serialization error
    #[error("Failed to serialize to TOML: {0}")]
    Serialize(String),

    /// A value is out of range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e.to_string())
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(e: toml::ser::Error) -> Self {
        ConfigError::Serialize(e.to_string())
    }
}
