//! What a run hands to the answer renderer

use crate::state::{RunWarning, SubQueryState, SubQueryStatus};
use corroborate_domain::{Query, QueryId, SubQuery, VerifiedClaim};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Evidence handed to synthesis
    Synthesize,
    /// Budget or sources exhausted before sufficiency
    Failed,
}

impl Outcome {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Synthesize => "SYNTHESIZE",
            Outcome::Failed => "FAILED",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every sub-query resolved or ran out of evidence
    Sufficient,
    /// Fast mode stops after its single pass
    FastMode,
    /// The iteration counter reached its maximum
    IterationBudget,
    /// Nothing left to retrieve or refine
    Exhausted,
    /// The run deadline expired
    Deadline,
    /// The caller canceled the run
    Canceled,
}

impl StopReason {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::Sufficient => "sufficient",
            StopReason::FastMode => "fast_mode",
            StopReason::IterationBudget => "iteration_budget",
            StopReason::Exhausted => "exhausted",
            StopReason::Deadline => "deadline",
            StopReason::Canceled => "canceled",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final, immutable result of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// Correlation id of the run (the query id)
    pub run_id: QueryId,

    /// The question as asked
    pub original_query: Query,

    /// Every claim verified during the run, sorted by key and polarity
    pub verified_claims: Vec<VerifiedClaim>,

    /// Sub-queries that never resolved (open or no evidence)
    pub unresolved_sub_queries: Vec<SubQuery>,

    /// All sub-queries with their final status
    pub sub_queries: Vec<SubQueryState>,

    /// Best-effort evidence rather than full resolution
    pub partial: bool,

    /// Terminal state
    pub state: Outcome,

    /// Why the run stopped
    pub stop_reason: StopReason,

    /// DECIDE transitions taken
    pub iterations: u32,

    /// Degradations recorded along the way
    pub warnings: Vec<RunWarning>,
}

impl RunResult {
    /// Claims at or above a confidence threshold, best first
    pub fn confident_claims(&self, threshold: f64) -> Vec<&VerifiedClaim> {
        let mut claims: Vec<_> = self
            .verified_claims
            .iter()
            .filter(|c| c.confidence >= threshold)
            .collect();
        claims.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        claims
    }

    /// Sub-queries that ended without any evidence
    pub fn no_evidence_sub_queries(&self) -> impl Iterator<Item = &SubQueryState> {
        self.sub_queries
            .iter()
            .filter(|s| s.status == SubQueryStatus::NoEvidence)
    }
}
