//! Orchestrator: drives one run through its phases
//!
//! The orchestrator is the single writer of [`RunState`]. Each phase has one
//! transition function that reads the state, calls a component, applies the
//! resulting mutations and returns the next phase.

use crate::config::EngineConfig;
use crate::controller::{LoopController, Phase};
use crate::decomposer::TaskDecomposer;
use crate::dispatcher::RetrievalDispatcher;
use crate::error::{DecompositionError, EngineError};
use crate::events::{EventSink, RunEvent};
use crate::result::{RunResult, StopReason};
use crate::state::{RunMutation, RunState, RunWarning, SubQueryStatus};
use crate::verifier::{VerificationEngine, VerifierSettings};
use corroborate_domain::{
    CancellationToken, Mode, Query, ReasoningPort, RetrievedItem, SubQuery, SubQueryId,
};
use corroborate_sources::SourceRegistry;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

/// Runs queries end to end
///
/// # Examples
///
/// ```no_run
/// use corroborate_domain::{CancellationToken, Mode, Query, SourceKind};
/// use corroborate_engine::{EngineConfig, Orchestrator};
/// use corroborate_llm::MockReasoner;
/// use corroborate_sources::{SourceRegistry, StaticSource};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let registry = SourceRegistry::new().with_port(StaticSource::new(SourceKind::Web));
/// let orchestrator = Orchestrator::new(
///     EngineConfig::default(),
///     registry,
///     Arc::new(MockReasoner::default()),
/// )?;
///
/// let result = orchestrator
///     .run(Query::new("Is X true?", Mode::Deep), &CancellationToken::new())
///     .await?;
/// println!("{}: {} claims", result.state, result.verified_claims.len());
/// # Ok(())
/// # }
/// ```
pub struct Orchestrator {
    config: EngineConfig,
    decomposer: TaskDecomposer,
    dispatcher: RetrievalDispatcher,
    verifier: VerificationEngine,
    controller: LoopController,
    events: EventSink,
}

impl Orchestrator {
    /// Create an orchestrator
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] if the configuration is invalid.
    pub fn new(
        config: EngineConfig,
        registry: SourceRegistry,
        reasoner: Arc<dyn ReasoningPort>,
    ) -> Result<Self, EngineError> {
        config.validate()?;

        let decomposer = TaskDecomposer::new(
            Arc::clone(&reasoner),
            config.routing.clone(),
            config.max_sub_questions,
        );
        let dispatcher = RetrievalDispatcher::new(
            registry,
            config.trust.clone(),
            config.per_source_timeout(),
            config.max_parallel_sources_per_sub_query,
        );
        let verifier = VerificationEngine::new(
            reasoner,
            VerifierSettings {
                scoring: config.scoring.clone(),
                use_equivalence_oracle: config.use_equivalence_oracle,
                max_equivalence_checks: config.max_equivalence_checks,
                max_extraction_concurrency: config.max_extraction_concurrency,
            },
        );
        let controller = LoopController::new(&config);

        Ok(Self {
            config,
            decomposer,
            dispatcher,
            verifier,
            controller,
            events: EventSink::default(),
        })
    }

    /// Report progress on a channel
    pub fn with_events(mut self, tx: UnboundedSender<RunEvent>) -> Self {
        self.events = EventSink::new(tx);
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run a query to a terminal state
    ///
    /// Budget exhaustion, deadline expiry and cancellation all produce a
    /// partial [`RunResult`]. Only fatal conditions return an error.
    pub async fn run(
        &self,
        query: Query,
        cancel: &CancellationToken,
    ) -> Result<RunResult, EngineError> {
        let run_token = cancel.child_token();
        let deadline = self.config.run_deadline();
        let timer = {
            let token = run_token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                token.cancel();
            })
        };

        let result = self.drive(query, cancel, &run_token).await;

        timer.abort();
        run_token.cancel();
        result
    }

    async fn drive(
        &self,
        query: Query,
        cancel: &CancellationToken,
        run_token: &CancellationToken,
    ) -> Result<RunResult, EngineError> {
        info!("Starting {} run {}: '{}'", query.mode, query.id, query.text);
        self.events.emit(RunEvent::Started {
            run_id: query.id,
            mode: query.mode,
        });

        let mut state = RunState::new(query, self.config.max_sub_queries);
        let mut phase = Phase::Intake;

        while !phase.is_terminal() {
            if run_token.is_cancelled()
                && matches!(
                    phase,
                    Phase::Decompose { .. } | Phase::Retrieve { .. } | Phase::Verify { .. }
                )
            {
                debug!("Run interrupted during {}, deciding now", phase);
                phase = Phase::Decide;
            }

            debug!("Entering {} (iteration {})", phase, state.iteration());
            self.events.emit(RunEvent::PhaseEntered {
                phase: phase.name(),
                iteration: state.iteration(),
            });

            phase = match phase {
                Phase::Intake => Phase::Decompose {
                    targets: Vec::new(),
                },
                Phase::Decompose { targets } if targets.is_empty() => {
                    self.plan(&mut state, run_token).await?
                }
                Phase::Decompose { targets } => self.refine(&mut state, targets, run_token).await?,
                Phase::Retrieve { targets } => {
                    self.retrieve(&mut state, &targets, run_token).await?
                }
                Phase::Verify { items } => self.verify(&mut state, items, run_token).await?,
                Phase::Decide => self.decide(&mut state, cancel, run_token)?,
                terminal @ (Phase::Synthesize | Phase::Failed) => terminal,
            };
        }

        let result = state.into_result(self.config.no_evidence_is_partial)?;
        info!(
            "Run {} finished: {} ({}) after {} iterations, {} claims, {} warnings",
            result.run_id,
            result.state,
            result.stop_reason,
            result.iterations,
            result.verified_claims.len(),
            result.warnings.len()
        );
        self.events.emit(RunEvent::Finished {
            outcome: result.state,
            reason: result.stop_reason,
        });
        Ok(result)
    }

    /// Initial DECOMPOSE: plan the first sub-queries
    async fn plan(
        &self,
        state: &mut RunState,
        token: &CancellationToken,
    ) -> Result<Phase, EngineError> {
        let query = state.query().clone();

        let planned = match query.mode {
            Mode::Fast => vec![self.decomposer.fast(&query)],
            Mode::Deep => match self
                .decomposer
                .decompose(
                    &query,
                    state.claims(),
                    state.remaining_sub_query_budget(),
                    token,
                )
                .await
            {
                Ok(sub_queries) if !sub_queries.is_empty() => sub_queries,
                Ok(_) => vec![self.decomposer.whole(&query)],
                Err(e) => {
                    warn!("Decomposition failed, using the whole query: {}", e);
                    if e != DecompositionError::Canceled {
                        state.apply(RunMutation::Warn(RunWarning::Decomposition {
                            target: None,
                            reason: e.to_string(),
                        }))?;
                    }
                    vec![self.decomposer.whole(&query)]
                }
            },
        };

        let targets = ids(&planned);
        self.events.emit(RunEvent::SubQueriesPlanned {
            count: planned.len(),
            refinement: false,
        });
        state.apply(RunMutation::AddSubQueries(planned))?;
        Ok(Phase::Retrieve { targets })
    }

    /// DECOMPOSE after DECIDE: refine weakly supported sub-queries
    async fn refine(
        &self,
        state: &mut RunState,
        targets: Vec<SubQueryId>,
        token: &CancellationToken,
    ) -> Result<Phase, EngineError> {
        let query = state.query().clone();
        let mut children_ids = Vec::new();

        for target in targets {
            let sub_query = state
                .sub_query(target)
                .map(|s| s.sub_query.clone())
                .ok_or_else(|| {
                    EngineError::StateCorruption(format!("unknown refinement target {}", target))
                })?;
            state.apply(RunMutation::RecordRefinement(target))?;

            let refined = self
                .decomposer
                .refine(
                    &query,
                    &sub_query,
                    state.claims(),
                    state.sub_queries().len(),
                    state.remaining_sub_query_budget(),
                    token,
                )
                .await;

            match refined {
                Ok(children) if !children.is_empty() => {
                    children_ids.extend(ids(&children));
                    self.events.emit(RunEvent::SubQueriesPlanned {
                        count: children.len(),
                        refinement: true,
                    });
                    state.apply_all([
                        RunMutation::AddSubQueries(children),
                        RunMutation::Supersede(target),
                    ])?;
                }
                Ok(_) => debug!("Nothing narrower than '{}'", sub_query.text),
                Err(DecompositionError::Canceled) => break,
                Err(e) => {
                    warn!("Refinement of '{}' failed: {}", sub_query.text, e);
                    state.apply(RunMutation::Warn(RunWarning::Decomposition {
                        target: Some(target),
                        reason: e.to_string(),
                    }))?;
                }
            }
        }

        Ok(Phase::Retrieve {
            targets: children_ids,
        })
    }

    /// RETRIEVE: dispatch the targets concurrently
    async fn retrieve(
        &self,
        state: &mut RunState,
        targets: &[SubQueryId],
        token: &CancellationToken,
    ) -> Result<Phase, EngineError> {
        let sub_queries: Vec<SubQuery> = targets
            .iter()
            .filter_map(|id| state.sub_query(*id))
            .filter(|s| s.status == SubQueryStatus::Open)
            .map(|s| s.sub_query.clone())
            .collect();

        let outcomes = self.dispatcher.dispatch_all(sub_queries, token).await?;

        let mut items = Vec::new();
        for outcome in outcomes {
            if outcome.all_failed {
                warn!("Every source failed for sub-query {}", outcome.sub_query);
            }
            self.events.emit(RunEvent::DispatchFinished {
                sub_query: outcome.sub_query,
                items: outcome.items.len(),
                failures: outcome.warnings.len(),
            });

            state.apply(RunMutation::RecordDispatch {
                sub_query: outcome.sub_query,
                items: outcome.items.len(),
            })?;
            state.apply_all(
                outcome
                    .warnings
                    .into_iter()
                    .map(|w| RunMutation::Warn(RunWarning::Source(w))),
            )?;
            items.extend(outcome.items);
        }

        Ok(Phase::Verify { items })
    }

    /// VERIFY: merge the new items into the claim snapshot
    async fn verify(
        &self,
        state: &mut RunState,
        items: Vec<RetrievedItem>,
        token: &CancellationToken,
    ) -> Result<Phase, EngineError> {
        if items.is_empty() {
            debug!("No items to verify");
            return Ok(Phase::Decide);
        }

        let question = state.query().text.clone();
        let outcome = self
            .verifier
            .verify(
                &question,
                &items,
                state.claims(),
                state.iteration().saturating_add(1),
                token,
            )
            .await?;

        self.events.emit(RunEvent::ClaimsVerified {
            total: outcome.claims.len(),
            new: outcome.new_claims,
        });
        state.apply(RunMutation::ReplaceClaims(outcome.claims))?;
        state.apply_all(outcome.warnings.into_iter().map(RunMutation::Warn))?;
        Ok(Phase::Decide)
    }

    /// DECIDE: count the iteration, settle sub-queries, choose what's next
    fn decide(
        &self,
        state: &mut RunState,
        cancel: &CancellationToken,
        run_token: &CancellationToken,
    ) -> Result<Phase, EngineError> {
        state.apply(RunMutation::AdvanceIteration)?;
        let settled = self.controller.resolve_statuses(state);
        state.apply_all(settled)?;

        let interrupt = if cancel.is_cancelled() {
            Some(StopReason::Canceled)
        } else if run_token.is_cancelled() {
            Some(StopReason::Deadline)
        } else {
            None
        };

        let decision = self.controller.decide(state, interrupt);
        info!("Iteration {}: {}", state.iteration(), decision);
        self.events.emit(RunEvent::Decided {
            iteration: state.iteration(),
            decision: decision.to_string(),
        });

        if let Some((outcome, reason)) = decision.terminal() {
            match interrupt {
                Some(StopReason::Canceled) => state.apply(RunMutation::Warn(RunWarning::Canceled))?,
                Some(_) => state.apply(RunMutation::Warn(RunWarning::Deadline))?,
                None => {}
            }
            state.apply(RunMutation::Terminate { outcome, reason })?;
        }
        Ok(decision.next_phase())
    }
}

fn ids(sub_queries: &[SubQuery]) -> Vec<SubQueryId> {
    sub_queries.iter().map(|s| s.id).collect()
}
