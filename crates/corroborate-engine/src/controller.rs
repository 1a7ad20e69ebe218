//! Loop controller: the run's phases and the DECIDE transition
//!
//! ```text
//! INTAKE → DECOMPOSE → RETRIEVE → VERIFY → DECIDE → { DECOMPOSE | RETRIEVE | SYNTHESIZE | FAILED }
//! ```
//!
//! The controller never touches the run state. It reads a `&RunState` and
//! answers with mutations and a [`Decision`] the orchestrator applies.

use crate::config::EngineConfig;
use crate::result::{Outcome, StopReason};
use crate::state::{RunMutation, RunState, SubQueryState, SubQueryStatus};
use corroborate_domain::{Mode, RetrievedItem, SubQueryId};
use std::fmt;
use tracing::debug;

/// A state of the run state machine
#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    /// Run accepted, nothing planned yet
    Intake,
    /// Plan sub-queries; empty targets means the initial decomposition
    Decompose {
        /// Sub-queries to refine
        targets: Vec<SubQueryId>,
    },
    /// Dispatch the given sub-queries
    Retrieve {
        /// Sub-queries to dispatch
        targets: Vec<SubQueryId>,
    },
    /// Verify the items of the last retrieval
    Verify {
        /// Items to verify
        items: Vec<RetrievedItem>,
    },
    /// Settle sub-queries and choose the next phase
    Decide,
    /// Terminal: evidence handed to synthesis
    Synthesize,
    /// Terminal: stopped before sufficiency
    Failed,
}

impl Phase {
    /// Phase name for logs and events
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Intake => "INTAKE",
            Phase::Decompose { .. } => "DECOMPOSE",
            Phase::Retrieve { .. } => "RETRIEVE",
            Phase::Verify { .. } => "VERIFY",
            Phase::Decide => "DECIDE",
            Phase::Synthesize => "SYNTHESIZE",
            Phase::Failed => "FAILED",
        }
    }

    /// Whether the run is over
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Synthesize | Phase::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of a DECIDE transition
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Terminate with the evidence gathered so far
    Synthesize(StopReason),
    /// Terminate before sufficiency; the result is partial
    Fail(StopReason),
    /// Dispatch these sub-queries again
    Retrieve(Vec<SubQueryId>),
    /// Refine these sub-queries
    Decompose(Vec<SubQueryId>),
}

impl Decision {
    /// Terminal outcome, if the decision ends the run
    pub fn terminal(&self) -> Option<(Outcome, StopReason)> {
        match self {
            Decision::Synthesize(reason) => Some((Outcome::Synthesize, *reason)),
            Decision::Fail(reason) => Some((Outcome::Failed, *reason)),
            _ => None,
        }
    }

    /// Phase the decision leads to
    pub fn next_phase(&self) -> Phase {
        match self {
            Decision::Synthesize(_) => Phase::Synthesize,
            Decision::Fail(_) => Phase::Failed,
            Decision::Retrieve(targets) => Phase::Retrieve {
                targets: targets.clone(),
            },
            Decision::Decompose(targets) => Phase::Decompose {
                targets: targets.clone(),
            },
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Synthesize(reason) => write!(f, "synthesize ({})", reason),
            Decision::Fail(reason) => write!(f, "fail ({})", reason),
            Decision::Retrieve(targets) => write!(f, "retrieve {} sub-queries", targets.len()),
            Decision::Decompose(targets) => write!(f, "refine {} sub-queries", targets.len()),
        }
    }
}

/// Settles sub-queries and picks the next phase
#[derive(Debug, Clone)]
pub struct LoopController {
    confidence_threshold: f64,
    max_iterations: u32,
    max_attempts: u32,
}

impl LoopController {
    /// Create a controller from the engine configuration
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            confidence_threshold: config.confidence_threshold,
            max_iterations: config.max_iterations,
            max_attempts: config.max_sub_query_retries.saturating_add(1),
        }
    }

    /// Status changes implied by the current claims and dispatch counts
    ///
    /// An open sub-query is resolved once a claim answering it reaches the
    /// confidence threshold, and marked no-evidence once its dispatches are
    /// used up without a single item.
    pub fn resolve_statuses(&self, state: &RunState) -> Vec<RunMutation> {
        state
            .sub_queries()
            .iter()
            .filter(|s| s.status == SubQueryStatus::Open)
            .filter_map(|s| {
                let status = if state
                    .best_confidence(s.id())
                    .is_some_and(|c| c >= self.confidence_threshold)
                {
                    SubQueryStatus::Resolved
                } else if self.exhausted(s) && !s.had_evidence {
                    SubQueryStatus::NoEvidence
                } else {
                    return None;
                };
                debug!("Sub-query '{}' is now {}", s.sub_query.text, status);
                Some(RunMutation::SetStatus {
                    sub_query: s.id(),
                    status,
                })
            })
            .collect()
    }

    /// Choose what follows a DECIDE transition
    ///
    /// Expects the iteration counter to be advanced and statuses settled
    /// already. `interrupt` carries a deadline expiry or cancellation.
    pub fn decide(&self, state: &RunState, interrupt: Option<StopReason>) -> Decision {
        let open: Vec<&SubQueryState> = state
            .sub_queries()
            .iter()
            .filter(|s| s.status == SubQueryStatus::Open)
            .collect();

        if open.is_empty() && !state.sub_queries().is_empty() {
            return Decision::Synthesize(StopReason::Sufficient);
        }
        if let Some(reason) = interrupt {
            return Decision::Fail(reason);
        }
        if state.query().mode == Mode::Fast {
            return Decision::Synthesize(StopReason::FastMode);
        }
        if state.iteration() >= self.max_iterations {
            return Decision::Fail(StopReason::IterationBudget);
        }

        let retry: Vec<SubQueryId> = open
            .iter()
            .filter(|s| !self.exhausted(s))
            .map(|s| s.id())
            .collect();
        if !retry.is_empty() {
            return Decision::Retrieve(retry);
        }

        let budget = state.remaining_sub_query_budget();
        if budget > 0 {
            let mut refinable: Vec<(f64, usize, SubQueryId)> = open
                .iter()
                .enumerate()
                .filter(|(_, s)| s.had_evidence && !s.refinement_attempted)
                .map(|(idx, s)| (state.best_confidence(s.id()).unwrap_or(0.0), idx, s.id()))
                .collect();
            refinable.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

            if !refinable.is_empty() {
                return Decision::Decompose(
                    refinable
                        .into_iter()
                        .take(budget)
                        .map(|(_, _, id)| id)
                        .collect(),
                );
            }
        }

        Decision::Fail(StopReason::Exhausted)
    }

    fn exhausted(&self, sub_query: &SubQueryState) -> bool {
        sub_query.attempts >= self.max_attempts
    }
}
