//! Corroborate LLM Provider Layer
//!
//! Implementations of the `ReasoningPort` trait from `corroborate-domain`.
//!
//! # Providers
//!
//! - `MockReasoner`: Deterministic scripted reasoner for tests and demos
//! - `OllamaReasoner`: Local Ollama API integration
//!
//! # Examples
//!
//! ```
//! use corroborate_llm::MockReasoner;
//! use corroborate_domain::{CancellationToken, PromptKind, ReasoningPort, ReasoningRequest};
//!
//! let reasoner = MockReasoner::new("[]");
//! let request = ReasoningRequest::new(PromptKind::ClaimExtraction, "any prompt");
//! let result = reasoner.generate(&request, &CancellationToken::new()).unwrap();
//! assert_eq!(result, "[]");
//! ```

#![warn(missing_docs)]

pub mod ollama;

use corroborate_domain::{CancellationToken, PromptKind, ReasoningError, ReasoningPort, ReasoningRequest};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

pub use ollama::OllamaReasoner;

/// Errors that can occur while talking to an LLM backend
#[derive(Error, Debug)]
pub enum LlmError {
    /// Network or API communication error
    #[error("Communication error: {0}")]
    Communication(String),

    /// Invalid response from LLM
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Model not available
    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    /// The caller canceled the request
    #[error("Canceled")]
    Canceled,
}

impl From<LlmError> for ReasoningError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::InvalidResponse(msg) => ReasoningError::MalformedOutput(msg),
            LlmError::Canceled => ReasoningError::Canceled,
            other => ReasoningError::Unavailable(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
enum Scripted {
    Respond(String),
    Fail(ReasoningError),
}

#[derive(Debug, Clone)]
struct Rule {
    kind: PromptKind,
    needles: Vec<String>,
    outcome: Scripted,
}

#[derive(Debug, Default)]
struct MockState {
    rules: Vec<Rule>,
    defaults: HashMap<PromptKind, Scripted>,
    calls: Vec<ReasoningRequest>,
}

/// Mock reasoner for deterministic testing
///
/// Responses are chosen by prompt kind and by substrings of the rendered
/// prompt. Rules are checked in insertion order; the first rule whose kind
/// matches and whose needles all occur in the prompt wins. Otherwise the
/// per-kind default applies, and finally the fallback response.
///
/// # Examples
///
/// ```
/// use corroborate_llm::MockReasoner;
/// use corroborate_domain::{CancellationToken, PromptKind, ReasoningPort, ReasoningRequest};
///
/// let reasoner = MockReasoner::new("fallback")
///     .with_default(PromptKind::ClaimEquivalence, r#"{"equivalent": false}"#)
///     .with_rule(PromptKind::ClaimEquivalence, &["Paris", "capital"], r#"{"equivalent": true}"#);
///
/// let cancel = CancellationToken::new();
/// let hit = ReasoningRequest::new(PromptKind::ClaimEquivalence, "Is Paris the capital?");
/// assert_eq!(reasoner.generate(&hit, &cancel).unwrap(), r#"{"equivalent": true}"#);
///
/// let miss = ReasoningRequest::new(PromptKind::ClaimEquivalence, "Is Lyon big?");
/// assert_eq!(reasoner.generate(&miss, &cancel).unwrap(), r#"{"equivalent": false}"#);
/// ```
#[derive(Debug, Clone)]
pub struct MockReasoner {
    fallback: String,
    state: Arc<Mutex<MockState>>,
}

impl MockReasoner {
    /// Create a new MockReasoner with a fixed response for all prompts
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            fallback: response.into(),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Respond to every prompt of `kind` with `response` unless a rule matches
    pub fn with_default(self, kind: PromptKind, response: impl Into<String>) -> Self {
        self.lock()
            .defaults
            .insert(kind, Scripted::Respond(response.into()));
        self
    }

    /// Fail every prompt of `kind` unless a rule matches
    pub fn with_default_error(self, kind: PromptKind, error: ReasoningError) -> Self {
        self.lock().defaults.insert(kind, Scripted::Fail(error));
        self
    }

    /// Respond with `response` when the prompt contains every needle
    pub fn with_rule(self, kind: PromptKind, needles: &[&str], response: impl Into<String>) -> Self {
        self.push_rule(kind, needles, Scripted::Respond(response.into()));
        self
    }

    /// Fail with `error` when the prompt contains every needle
    pub fn with_error(self, kind: PromptKind, needles: &[&str], error: ReasoningError) -> Self {
        self.push_rule(kind, needles, Scripted::Fail(error));
        self
    }

    /// Get the number of times generate was called
    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    /// Number of calls made for a given prompt kind
    pub fn calls_for(&self, kind: PromptKind) -> usize {
        self.lock().calls.iter().filter(|r| r.kind == kind).count()
    }

    /// Copy of every request received so far
    pub fn requests(&self) -> Vec<ReasoningRequest> {
        self.lock().calls.clone()
    }

    /// Reset the recorded calls
    pub fn reset_call_count(&self) {
        self.lock().calls.clear();
    }

    fn push_rule(&self, kind: PromptKind, needles: &[&str], outcome: Scripted) {
        self.lock().rules.push(Rule {
            kind,
            needles: needles.iter().map(|n| n.to_string()).collect(),
            outcome,
        });
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MockReasoner {
    fn default() -> Self {
        Self::new("Default mock response")
    }
}

impl ReasoningPort for MockReasoner {
    fn generate(
        &self,
        request: &ReasoningRequest,
        cancel: &CancellationToken,
    ) -> Result<String, ReasoningError> {
        if cancel.is_cancelled() {
            return Err(ReasoningError::Canceled);
        }

        let mut state = self.lock();
        state.calls.push(request.clone());

        let outcome = state
            .rules
            .iter()
            .find(|rule| {
                rule.kind == request.kind
                    && rule.needles.iter().all(|n| request.prompt.contains(n.as_str()))
            })
            .map(|rule| rule.outcome.clone())
            .or_else(|| state.defaults.get(&request.kind).cloned())
            .unwrap_or_else(|| Scripted::Respond(self.fallback.clone()));

        match outcome {
            Scripted::Respond(text) => Ok(text),
            Scripted::Fail(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(kind: PromptKind, prompt: &str) -> ReasoningRequest {
        ReasoningRequest::new(kind, prompt)
    }

    #[test]
    fn test_mock_reasoner_fallback() {
        let reasoner = MockReasoner::new("Test response");
        let result = reasoner.generate(&request(PromptKind::Synthesis, "x"), &CancellationToken::new());
        assert_eq!(result.unwrap(), "Test response");
    }

    #[test]
    fn test_rules_match_in_order() {
        let reasoner = MockReasoner::default()
            .with_rule(PromptKind::ClaimExtraction, &["alpha"], "first")
            .with_rule(PromptKind::ClaimExtraction, &["alpha", "beta"], "second");

        let cancel = CancellationToken::new();
        let out = reasoner
            .generate(&request(PromptKind::ClaimExtraction, "alpha beta"), &cancel)
            .unwrap();
        assert_eq!(out, "first");
    }

    #[test]
    fn test_rule_kind_must_match() {
        let reasoner = MockReasoner::new("fallback")
            .with_rule(PromptKind::Decomposition, &["alpha"], "decomposed");

        let out = reasoner
            .generate(&request(PromptKind::ClaimExtraction, "alpha"), &CancellationToken::new())
            .unwrap();
        assert_eq!(out, "fallback");
    }

    #[test]
    fn test_scripted_errors() {
        let reasoner = MockReasoner::default()
            .with_default_error(PromptKind::Decomposition, ReasoningError::Unavailable("down".into()))
            .with_error(
                PromptKind::ClaimExtraction,
                &["bad"],
                ReasoningError::MalformedOutput("garbage".into()),
            );

        let cancel = CancellationToken::new();
        assert!(matches!(
            reasoner.generate(&request(PromptKind::Decomposition, "q"), &cancel),
            Err(ReasoningError::Unavailable(_))
        ));
        assert!(matches!(
            reasoner.generate(&request(PromptKind::ClaimExtraction, "bad item"), &cancel),
            Err(ReasoningError::MalformedOutput(_))
        ));
    }

    #[test]
    fn test_canceled_before_call() {
        let reasoner = MockReasoner::new("x");
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_eq!(
            reasoner.generate(&request(PromptKind::Synthesis, "p"), &cancel),
            Err(ReasoningError::Canceled)
        );
        assert_eq!(reasoner.call_count(), 0);
    }

    #[test]
    fn test_call_tracking_is_shared_between_clones() {
        let reasoner1 = MockReasoner::new("test");
        let reasoner2 = reasoner1.clone();
        let cancel = CancellationToken::new();

        reasoner1.generate(&request(PromptKind::Decomposition, "a"), &cancel).unwrap();
        reasoner2.generate(&request(PromptKind::ClaimExtraction, "b"), &cancel).unwrap();

        assert_eq!(reasoner1.call_count(), 2);
        assert_eq!(reasoner2.calls_for(PromptKind::Decomposition), 1);

        reasoner2.reset_call_count();
        assert_eq!(reasoner1.call_count(), 0);
    }

    #[test]
    fn test_llm_error_mapping() {
        assert_eq!(
            ReasoningError::from(LlmError::InvalidResponse("bad".into())),
            ReasoningError::MalformedOutput("bad".into())
        );
        assert!(matches!(
            ReasoningError::from(LlmError::RateLimitExceeded),
            ReasoningError::Unavailable(_)
        ));
    }
}
