//! Trait definitions for external interactions
//!
//! These traits define the boundaries between the orchestration core and
//! the outside world. Implementations live in other crates.
//!
//! Both ports are synchronous. The engine runs every call on the blocking
//! pool and races it against a timeout and the run's cancellation token;
//! implementations observe `cancel` and return a `Canceled` error promptly
//! instead of partial data.

use crate::error::{ReasoningError, RetrievalError};
use crate::query::SubQuery;
use crate::source::{SourceDocument, SourceKind};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Trait for fetching evidence from one kind of source
///
/// Implementations handle their own pagination and authentication; the
/// core treats each call as atomic.
pub trait RetrievalPort: Send + Sync {
    /// Kind of source this port serves
    fn kind(&self) -> SourceKind;

    /// Retrieve documents for a sub-query within `timeout`
    fn retrieve(
        &self,
        sub_query: &SubQuery,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Vec<SourceDocument>, RetrievalError>;

    /// Longest a whole `retrieve` call may take when given `timeout`
    ///
    /// Ports that make several attempts, each within `timeout`, widen this.
    fn call_budget(&self, timeout: Duration) -> Duration {
        timeout
    }
}

impl<T: RetrievalPort + ?Sized> RetrievalPort for Arc<T> {
    fn kind(&self) -> SourceKind {
        (**self).kind()
    }

    fn retrieve(
        &self,
        sub_query: &SubQuery,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Vec<SourceDocument>, RetrievalError> {
        (**self).retrieve(sub_query, timeout, cancel)
    }

    fn call_budget(&self, timeout: Duration) -> Duration {
        (**self).call_budget(timeout)
    }
}

/// What a reasoning call is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    /// Propose sub-questions for a query
    Decomposition,
    /// Extract atomic claims from one retrieved item
    ClaimExtraction,
    /// Judge whether two statements express the same proposition
    ClaimEquivalence,
    /// Final answer text (outside the core)
    Synthesis,
}

impl PromptKind {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptKind::Decomposition => "decomposition",
            PromptKind::ClaimExtraction => "claim_extraction",
            PromptKind::ClaimEquivalence => "claim_equivalence",
            PromptKind::Synthesis => "synthesis",
        }
    }

    /// Whether the expected output is a JSON document
    pub fn expects_json(&self) -> bool {
        !matches!(self, PromptKind::Synthesis)
    }
}

impl fmt::Display for PromptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single call to the reasoning port
#[derive(Debug, Clone, PartialEq)]
pub struct ReasoningRequest {
    /// Purpose of the call
    pub kind: PromptKind,
    /// Fully rendered prompt
    pub prompt: String,
}

impl ReasoningRequest {
    /// Create a new request
    pub fn new(kind: PromptKind, prompt: impl Into<String>) -> Self {
        Self {
            kind,
            prompt: prompt.into(),
        }
    }
}

/// Trait for language-model calls
///
/// Treated as an opaque function from prompt to structured text. Callers
/// parse the output and map parse failures to
/// [`ReasoningError::MalformedOutput`].
pub trait ReasoningPort: Send + Sync {
    /// Generate output for a request
    fn generate(
        &self,
        request: &ReasoningRequest,
        cancel: &CancellationToken,
    ) -> Result<String, ReasoningError>;
}
