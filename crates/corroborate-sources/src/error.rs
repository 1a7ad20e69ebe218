//! Error types for source setup

use corroborate_domain::SourceKind;
use thiserror::Error;

/// Errors that can occur while building or loading sources
#[derive(Error, Debug)]
pub enum SourceError {
    /// Failed to read a corpus file
    #[error("Failed to read corpus: {0}")]
    CorpusRead(#[from] std::io::Error),

    /// Failed to parse a corpus file
    #[error("Failed to parse corpus: {0}")]
    CorpusParse(#[from] serde_json::Error),

    /// Corpus document is unusable
    #[error("Invalid corpus document {index}: {reason}")]
    InvalidDocument {
        /// Position of the document in the file
        index: usize,
        /// What is wrong with it
        reason: String,
    },

    /// No port is registered for a kind
    #[error("No retrieval port registered for '{0}'")]
    NotRegistered(SourceKind),
}
