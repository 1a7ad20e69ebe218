//! Error types for the CLI application.

use thiserror::Error;

/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Engine configuration rejected
    #[error("Engine configuration error: {0}")]
    EngineConfig(#[from] corroborate_engine::ConfigError),

    /// Fatal engine error
    #[error("Engine error: {0}")]
    Engine(#[from] corroborate_engine::EngineError),

    /// Corpus could not be loaded
    #[error("Source error: {0}")]
    Source(#[from] corroborate_sources::SourceError),

    /// Reasoner could not be set up
    #[error("LLM error: {0}")]
    Llm(#[from] corroborate_llm::LlmError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
