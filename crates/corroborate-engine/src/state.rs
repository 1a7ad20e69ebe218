//! Run state and the mutations that change it
//!
//! `RunState` is the only mutable entity in a run. The orchestrator owns it;
//! every other component reads a `&RunState` and returns [`RunMutation`]
//! values. [`RunState::apply`] checks each mutation against the run
//! invariants before changing anything:
//!
//! - the sub-query count never exceeds the configured maximum
//! - verified claims are never removed, only rescored or extended
//! - the iteration counter only moves forward
//! - nothing changes after the run reached a terminal state

use crate::error::EngineError;
use crate::result::{Outcome, RunResult, StopReason};
use corroborate_domain::{
    ClaimKey, Polarity, Query, RetrievalError, SourceKind, SubQuery, SubQueryId, VerifiedClaim,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Lifecycle of a sub-query within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubQueryStatus {
    /// Still waiting for sufficient evidence
    Open,
    /// Some claim answering it reached the confidence threshold
    Resolved,
    /// Retries exhausted without any evidence
    NoEvidence,
    /// Replaced by refined children
    Superseded,
}

impl SubQueryStatus {
    /// Whether the sub-query needs no further work
    pub fn is_settled(&self) -> bool {
        !matches!(self, SubQueryStatus::Open)
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            SubQueryStatus::Open => "open",
            SubQueryStatus::Resolved => "resolved",
            SubQueryStatus::NoEvidence => "unresolved-no-evidence",
            SubQueryStatus::Superseded => "superseded",
        }
    }
}

impl fmt::Display for SubQueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sub-query and its bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubQueryState {
    /// The immutable sub-query
    pub sub_query: SubQuery,
    /// Current status
    pub status: SubQueryStatus,
    /// Number of dispatches so far
    pub attempts: u32,
    /// Whether any dispatch returned at least one item
    pub had_evidence: bool,
    /// Whether refinement was already tried
    pub refinement_attempted: bool,
}

impl SubQueryState {
    fn new(sub_query: SubQuery) -> Self {
        Self {
            sub_query,
            status: SubQueryStatus::Open,
            attempts: 0,
            had_evidence: false,
            refinement_attempted: false,
        }
    }

    /// Id of the sub-query
    pub fn id(&self) -> SubQueryId {
        self.sub_query.id
    }
}

/// Why one source contributed nothing to a dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFailure {
    /// Timed out (after port-level retries)
    Timeout,
    /// Rate limited (after port-level retries)
    RateLimited,
    /// Provider unreachable or failing
    Unavailable(String),
    /// Provider rejected the sub-query
    InvalidQuery(String),
    /// Canceled by deadline or caller
    Canceled,
    /// No port registered for the kind
    NotRegistered,
}

impl From<RetrievalError> for SourceFailure {
    fn from(e: RetrievalError) -> Self {
        match e {
            RetrievalError::Timeout => SourceFailure::Timeout,
            RetrievalError::RateLimited => SourceFailure::RateLimited,
            RetrievalError::Unavailable(msg) => SourceFailure::Unavailable(msg),
            RetrievalError::InvalidQuery(msg) => SourceFailure::InvalidQuery(msg),
            RetrievalError::Canceled => SourceFailure::Canceled,
        }
    }
}

impl fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFailure::Timeout => write!(f, "timed out"),
            SourceFailure::RateLimited => write!(f, "rate limited"),
            SourceFailure::Unavailable(msg) => write!(f, "unavailable: {}", msg),
            SourceFailure::InvalidQuery(msg) => write!(f, "invalid query: {}", msg),
            SourceFailure::Canceled => write!(f, "canceled"),
            SourceFailure::NotRegistered => write!(f, "no port registered"),
        }
    }
}

/// A source that failed during a dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceWarning {
    /// Sub-query being dispatched
    pub sub_query: SubQueryId,
    /// Failing source kind
    pub kind: SourceKind,
    /// What went wrong
    pub reason: SourceFailure,
}

/// Degradation recorded on a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunWarning {
    /// A source failed; its items are missing
    Source(SourceWarning),
    /// Decomposition failed; the coarser sub-query was used
    Decomposition {
        /// Sub-query that was being refined, if any
        target: Option<SubQueryId>,
        /// Failure description
        reason: String,
    },
    /// Claim extraction failed for one item; it was skipped
    Extraction {
        /// Origin of the skipped item
        origin: String,
        /// Failure description
        reason: String,
    },
    /// The equivalence oracle failed; claims were kept apart
    Equivalence {
        /// Failure description
        reason: String,
    },
    /// The run deadline expired
    Deadline,
    /// The caller canceled the run
    Canceled,
}

impl fmt::Display for RunWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunWarning::Source(w) => write!(f, "source '{}' {}", w.kind, w.reason),
            RunWarning::Decomposition { reason, .. } => write!(f, "decomposition: {}", reason),
            RunWarning::Extraction { origin, reason } => {
                write!(f, "extraction from {}: {}", origin, reason)
            }
            RunWarning::Equivalence { reason } => write!(f, "equivalence check: {}", reason),
            RunWarning::Deadline => write!(f, "run deadline expired"),
            RunWarning::Canceled => write!(f, "run canceled"),
        }
    }
}

/// A typed change request against the run state
#[derive(Debug, Clone, PartialEq)]
pub enum RunMutation {
    /// Register new open sub-queries
    AddSubQueries(Vec<SubQuery>),
    /// Mark a sub-query as replaced by its refinements
    Supersede(SubQueryId),
    /// Note that refinement of a sub-query was tried
    RecordRefinement(SubQueryId),
    /// Count a dispatch and whether it returned anything
    RecordDispatch {
        /// Dispatched sub-query
        sub_query: SubQueryId,
        /// Items kept from the dispatch
        items: usize,
    },
    /// Install a new claim snapshot
    ReplaceClaims(Vec<VerifiedClaim>),
    /// Settle an open sub-query
    SetStatus {
        /// Target sub-query
        sub_query: SubQueryId,
        /// New status
        status: SubQueryStatus,
    },
    /// Record a warning
    Warn(RunWarning),
    /// Count one DECIDE transition
    AdvanceIteration,
    /// Enter a terminal state
    Terminate {
        /// Terminal state
        outcome: Outcome,
        /// Why the run stopped
        reason: StopReason,
    },
}

/// Mutable state of one run
#[derive(Debug, Clone)]
pub struct RunState {
    query: Query,
    max_sub_queries: usize,
    sub_queries: Vec<SubQueryState>,
    claims: Vec<VerifiedClaim>,
    iteration: u32,
    warnings: Vec<RunWarning>,
    terminal: Option<(Outcome, StopReason)>,
}

impl RunState {
    /// Fresh state for a query
    pub fn new(query: Query, max_sub_queries: usize) -> Self {
        Self {
            query,
            max_sub_queries,
            sub_queries: Vec::new(),
            claims: Vec::new(),
            iteration: 0,
            warnings: Vec::new(),
            terminal: None,
        }
    }

    /// The original query
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// All sub-queries, in creation order
    pub fn sub_queries(&self) -> &[SubQueryState] {
        &self.sub_queries
    }

    /// Look up a sub-query
    pub fn sub_query(&self, id: SubQueryId) -> Option<&SubQueryState> {
        self.sub_queries.iter().find(|s| s.id() == id)
    }

    /// Current claim snapshot
    pub fn claims(&self) -> &[VerifiedClaim] {
        &self.claims
    }

    /// DECIDE transitions so far
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    /// Warnings so far
    pub fn warnings(&self) -> &[RunWarning] {
        &self.warnings
    }

    /// Terminal state, once reached
    pub fn terminal(&self) -> Option<(Outcome, StopReason)> {
        self.terminal
    }

    /// Sub-queries that may still be created
    pub fn remaining_sub_query_budget(&self) -> usize {
        self.max_sub_queries.saturating_sub(self.sub_queries.len())
    }

    /// Best confidence among claims answering a sub-query
    pub fn best_confidence(&self, id: SubQueryId) -> Option<f64> {
        self.claims
            .iter()
            .filter(|c| c.answers(id))
            .map(|c| c.confidence)
            .max_by(f64::total_cmp)
    }

    /// Apply a batch of mutations in order
    pub fn apply_all(
        &mut self,
        mutations: impl IntoIterator<Item = RunMutation>,
    ) -> Result<(), EngineError> {
        for mutation in mutations {
            self.apply(mutation)?;
        }
        Ok(())
    }

    /// Apply one mutation, rejecting anything that breaks an invariant
    pub fn apply(&mut self, mutation: RunMutation) -> Result<(), EngineError> {
        if let Some((outcome, _)) = self.terminal {
            return Err(corruption(format!(
                "mutation {:?} after run reached {}",
                mutation, outcome
            )));
        }

        match mutation {
            RunMutation::AddSubQueries(new) => {
                if self.sub_queries.len() + new.len() > self.max_sub_queries {
                    return Err(corruption(format!(
                        "{} sub-queries would exceed the maximum of {}",
                        self.sub_queries.len() + new.len(),
                        self.max_sub_queries
                    )));
                }
                for sub_query in new {
                    if self.sub_query(sub_query.id).is_some() {
                        return Err(corruption(format!("duplicate sub-query {}", sub_query.id)));
                    }
                    self.sub_queries.push(SubQueryState::new(sub_query));
                }
            }
            RunMutation::Supersede(id) => {
                let entry = self.open_sub_query(id)?;
                entry.status = SubQueryStatus::Superseded;
            }
            RunMutation::RecordRefinement(id) => {
                self.sub_query_mut(id)?.refinement_attempted = true;
            }
            RunMutation::RecordDispatch { sub_query, items } => {
                let entry = self.sub_query_mut(sub_query)?;
                entry.attempts += 1;
                entry.had_evidence |= items > 0;
            }
            RunMutation::ReplaceClaims(claims) => {
                let incoming: BTreeSet<(&ClaimKey, Polarity)> =
                    claims.iter().map(VerifiedClaim::identity).collect();
                if incoming.len() != claims.len() {
                    return Err(corruption("claim snapshot has duplicate identities".into()));
                }
                if let Some(lost) = self
                    .claims
                    .iter()
                    .find(|c| !incoming.contains(&c.identity()))
                {
                    return Err(corruption(format!(
                        "claim '{}' would be removed",
                        lost.claim.statement
                    )));
                }
                self.claims = claims;
            }
            RunMutation::SetStatus { sub_query, status } => {
                let entry = self.open_sub_query(sub_query)?;
                entry.status = status;
            }
            RunMutation::Warn(warning) => self.warnings.push(warning),
            RunMutation::AdvanceIteration => {
                self.iteration = self
                    .iteration
                    .checked_add(1)
                    .ok_or_else(|| corruption("iteration counter overflow".into()))?;
            }
            RunMutation::Terminate { outcome, reason } => {
                self.terminal = Some((outcome, reason));
            }
        }
        Ok(())
    }

    /// Consume the state into the final result
    ///
    /// Fails if the run never reached a terminal state.
    pub fn into_result(self, no_evidence_is_partial: bool) -> Result<RunResult, EngineError> {
        let (outcome, stop_reason) = self
            .terminal
            .ok_or_else(|| corruption("result requested before a terminal state".into()))?;

        let any_open = self
            .sub_queries
            .iter()
            .any(|s| s.status == SubQueryStatus::Open);
        let any_no_evidence = self
            .sub_queries
            .iter()
            .any(|s| s.status == SubQueryStatus::NoEvidence);
        let partial = outcome == Outcome::Failed
            || any_open
            || (no_evidence_is_partial && any_no_evidence);

        let unresolved_sub_queries = self
            .sub_queries
            .iter()
            .filter(|s| matches!(s.status, SubQueryStatus::Open | SubQueryStatus::NoEvidence))
            .map(|s| s.sub_query.clone())
            .collect();

        Ok(RunResult {
            run_id: self.query.id,
            original_query: self.query,
            verified_claims: self.claims,
            unresolved_sub_queries,
            sub_queries: self.sub_queries,
            partial,
            state: outcome,
            stop_reason,
            iterations: self.iteration,
            warnings: self.warnings,
        })
    }

    fn sub_query_mut(&mut self, id: SubQueryId) -> Result<&mut SubQueryState, EngineError> {
        self.sub_queries
            .iter_mut()
            .find(|s| s.id() == id)
            .ok_or_else(|| corruption(format!("unknown sub-query {}", id)))
    }

    fn open_sub_query(&mut self, id: SubQueryId) -> Result<&mut SubQueryState, EngineError> {
        let entry = self.sub_query_mut(id)?;
        if entry.status != SubQueryStatus::Open {
            return Err(corruption(format!(
                "sub-query {} is already {}",
                id, entry.status
            )));
        }
        Ok(entry)
    }
}

fn corruption(message: String) -> EngineError {
    EngineError::StateCorruption(message)
}
