//! Progress events for observers
//!
//! Sending is best effort: a dropped receiver never affects the run.

use crate::result::{Outcome, StopReason};
use corroborate_domain::{Mode, QueryId, SubQueryId};
use tokio::sync::mpsc::UnboundedSender;

/// Something that happened during a run
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    /// The run started
    Started {
        /// Correlation id
        run_id: QueryId,
        /// Selected mode
        mode: Mode,
    },
    /// A phase was entered
    PhaseEntered {
        /// Phase name
        phase: &'static str,
        /// Iteration counter at entry
        iteration: u32,
    },
    /// Sub-queries were added
    SubQueriesPlanned {
        /// Number added
        count: usize,
        /// Whether they refine earlier sub-queries
        refinement: bool,
    },
    /// One sub-query finished dispatching
    DispatchFinished {
        /// Dispatched sub-query
        sub_query: SubQueryId,
        /// Items kept
        items: usize,
        /// Sources that failed
        failures: usize,
    },
    /// A verification pass finished
    ClaimsVerified {
        /// Claims in the snapshot
        total: usize,
        /// Claims first seen in this pass
        new: usize,
    },
    /// The loop controller decided
    Decided {
        /// Iteration counter after the decision
        iteration: u32,
        /// Human-readable decision
        decision: String,
    },
    /// The run reached a terminal state
    Finished {
        /// Terminal state
        outcome: Outcome,
        /// Why it stopped
        reason: StopReason,
    },
}

/// Optional event sink
#[derive(Debug, Clone, Default)]
pub(crate) struct EventSink {
    tx: Option<UnboundedSender<RunEvent>>,
}

impl EventSink {
    pub(crate) fn new(tx: UnboundedSender<RunEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    pub(crate) fn emit(&self, event: RunEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
