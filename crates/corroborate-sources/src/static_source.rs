//! In-memory retrieval port with scripted behavior
//!
//! Used by tests and demos to stand in for a live provider: canned documents
//! per query substring, scripted failures, and artificial latency that still
//! honors cancellation and the per-call timeout.

use crate::retry::sleep_unless_canceled;
use corroborate_domain::{
    CancellationToken, RetrievalError, RetrievalPort, SourceDocument, SourceKind, SubQuery,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Scripted retrieval port
///
/// Resolution order for each call:
/// 1. the next entry of the script, if any remain
/// 2. a permanent failure set with [`failing`](Self::failing)
/// 3. the first response whose needle occurs in the sub-query text
///    (case-insensitive)
/// 4. the default documents
///
/// # Examples
///
/// ```
/// use corroborate_sources::StaticSource;
/// use corroborate_domain::{SourceDocument, SourceKind};
///
/// let source = StaticSource::new(SourceKind::Web)
///     .with_response("population", vec![SourceDocument::new("https://stats.example", "Lyon has 520k inhabitants")])
///     .with_documents(vec![SourceDocument::new("https://misc.example", "unrelated")]);
/// assert_eq!(source.calls(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct StaticSource {
    kind: SourceKind,
    documents: Vec<SourceDocument>,
    responses: Vec<(String, Vec<SourceDocument>)>,
    failure: Option<RetrievalError>,
    script: Arc<Mutex<VecDeque<Result<Vec<SourceDocument>, RetrievalError>>>>,
    latency: Duration,
    calls: Arc<AtomicUsize>,
}

impl StaticSource {
    /// Create a port that returns nothing
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            documents: Vec::new(),
            responses: Vec::new(),
            failure: None,
            script: Arc::new(Mutex::new(VecDeque::new())),
            latency: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Documents returned when no response needle matches
    pub fn with_documents(mut self, documents: Vec<SourceDocument>) -> Self {
        self.documents = documents;
        self
    }

    /// Documents returned when the sub-query text contains `needle`
    pub fn with_response(mut self, needle: impl Into<String>, documents: Vec<SourceDocument>) -> Self {
        self.responses.push((needle.into().to_lowercase(), documents));
        self
    }

    /// Fail every call (after the script is used up) with `error`
    pub fn failing(mut self, error: RetrievalError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Outcomes consumed one per call before any other behavior applies
    pub fn with_script(self, script: Vec<Result<Vec<SourceDocument>, RetrievalError>>) -> Self {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(script);
        self
    }

    /// Delay every call by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Number of calls received so far, shared between clones
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn respond(&self, sub_query: &SubQuery) -> Result<Vec<SourceDocument>, RetrievalError> {
        let scripted = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        if let Some(outcome) = scripted {
            return outcome;
        }
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        let text = sub_query.text.to_lowercase();
        let documents = self
            .responses
            .iter()
            .find(|(needle, _)| text.contains(needle.as_str()))
            .map(|(_, docs)| docs)
            .unwrap_or(&self.documents);
        Ok(documents.clone())
    }
}

impl RetrievalPort for StaticSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn retrieve(
        &self,
        sub_query: &SubQuery,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Vec<SourceDocument>, RetrievalError> {
        if cancel.is_cancelled() {
            return Err(RetrievalError::Canceled);
        }
        self.calls.fetch_add(1, Ordering::SeqCst);

        if !self.latency.is_zero() {
            if !sleep_unless_canceled(self.latency.min(timeout), cancel) {
                return Err(RetrievalError::Canceled);
            }
            if self.latency > timeout {
                return Err(RetrievalError::Timeout);
            }
        }

        self.respond(sub_query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corroborate_domain::{Mode, Query};
    use std::collections::BTreeSet;

    fn sub_query(text: &str) -> SubQuery {
        let query = Query::new(text, Mode::Deep);
        SubQuery::new(query.id, 0, text, BTreeSet::from([SourceKind::Web]))
    }

    fn retrieve(source: &StaticSource, text: &str) -> Result<Vec<SourceDocument>, RetrievalError> {
        source.retrieve(&sub_query(text), Duration::from_secs(1), &CancellationToken::new())
    }

    #[test]
    fn test_needle_match_is_case_insensitive() {
        let source = StaticSource::new(SourceKind::Academic)
            .with_response("Boiling", vec![SourceDocument::new("doi:1", "water boils at 100C")])
            .with_documents(vec![SourceDocument::new("doi:2", "fallback")]);

        let hit = retrieve(&source, "What is the boiling point of water?").unwrap();
        assert_eq!(hit[0].origin, "doi:1");

        let miss = retrieve(&source, "Who wrote Hamlet?").unwrap();
        assert_eq!(miss[0].origin, "doi:2");
        assert_eq!(source.calls(), 2);
    }

    #[test]
    fn test_script_runs_before_failure() {
        let source = StaticSource::new(SourceKind::Web)
            .with_script(vec![Ok(vec![SourceDocument::new("a", "first")])])
            .failing(RetrievalError::Unavailable("down".into()));

        assert_eq!(retrieve(&source, "q").unwrap().len(), 1);
        assert!(matches!(retrieve(&source, "q"), Err(RetrievalError::Unavailable(_))));
    }

    #[test]
    fn test_latency_beyond_timeout() {
        let source = StaticSource::new(SourceKind::Social).with_latency(Duration::from_millis(200));
        let result = source.retrieve(
            &sub_query("q"),
            Duration::from_millis(20),
            &CancellationToken::new(),
        );
        assert_eq!(result, Err(RetrievalError::Timeout));
    }

    #[test]
    fn test_latency_observes_cancellation() {
        let source = StaticSource::new(SourceKind::Web).with_latency(Duration::from_secs(30));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            trigger.cancel();
        });

        let result = source.retrieve(&sub_query("q"), Duration::from_secs(60), &cancel);
        handle.join().unwrap();
        assert_eq!(result, Err(RetrievalError::Canceled));
    }

    #[test]
    fn test_clones_share_call_counter() {
        let source = StaticSource::new(SourceKind::Finance);
        let clone = source.clone();
        retrieve(&clone, "q").unwrap();
        assert_eq!(source.calls(), 1);
    }
}
