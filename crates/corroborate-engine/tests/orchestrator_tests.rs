//! End-to-end runs against scripted sources and a scripted reasoner

use corroborate_domain::{
    CancellationToken, Mode, PromptKind, Query, ReasoningError, RetrievalError, RetrievalPort,
    SourceDocument, SourceKind, SubQuery,
};
use corroborate_engine::{
    EngineConfig, EngineError, Orchestrator, Outcome, RunResult, RunWarning, SourceFailure,
    StopReason, SubQueryStatus, TrustTable,
};
use corroborate_llm::MockReasoner;
use corroborate_sources::{RetryPolicy, Retrying, SourceRegistry, StaticSource};
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

const SIMPLE: &str = r#"{"is_complex": false, "reasoning": "one fact", "sub_questions": []}"#;
const X_IS_TRUE: &str = r#"[{"statement": "X is true", "negated": false}]"#;

fn doc(origin: &str, text: &str) -> SourceDocument {
    SourceDocument::new(origin, text)
}

fn reasoner() -> MockReasoner {
    MockReasoner::new("[]")
        .with_default(PromptKind::Decomposition, SIMPLE)
        .with_default(PromptKind::ClaimExtraction, X_IS_TRUE)
        .with_default(PromptKind::ClaimEquivalence, r#"{"equivalent": false}"#)
}

/// Route "Is X true?" to the academic and finance kinds as well as web
fn x_routing(config: &mut EngineConfig) {
    config.routing.academic = vec!["x".to_string()];
    config.routing.finance = vec!["x".to_string()];
}

async fn run(
    config: EngineConfig,
    registry: SourceRegistry,
    reasoner: MockReasoner,
    query: Query,
) -> RunResult {
    Orchestrator::new(config, registry, Arc::new(reasoner))
        .unwrap()
        .run(query, &CancellationToken::new())
        .await
        .unwrap()
}

fn assert_traceable(result: &RunResult, returned: &[&str]) {
    for claim in &result.verified_claims {
        assert!(!claim.claim.support.is_empty());
        for origin in claim.claim.support.keys() {
            assert!(
                returned.contains(&origin.as_str()),
                "claim '{}' cites unknown origin {}",
                claim.claim.statement,
                origin
            );
        }
    }
}

#[tokio::test]
async fn test_two_corroborating_kinds_synthesize_in_one_iteration() {
    let mut config = EngineConfig {
        trust: TrustTable::default()
            .with_weight(SourceKind::Web, 0.6)
            .with_weight(SourceKind::Academic, 0.7),
        ..EngineConfig::default()
    };
    config.routing.academic = vec!["x".to_string()];

    let registry = SourceRegistry::new()
        .with_port(
            StaticSource::new(SourceKind::Web)
                .with_documents(vec![doc("https://news.example/x", "Reports say X is true")]),
        )
        .with_port(
            StaticSource::new(SourceKind::Academic)
                .with_documents(vec![doc("doi:10.1000/x", "A study finds X is true")]),
        );

    let result = run(config, registry, reasoner(), Query::new("Is X true?", Mode::Deep)).await;

    assert_eq!(result.state, Outcome::Synthesize);
    assert_eq!(result.stop_reason, StopReason::Sufficient);
    assert_eq!(result.iterations, 1);
    assert!(!result.partial);
    assert_eq!(result.verified_claims.len(), 1);

    let claim = &result.verified_claims[0];
    assert_eq!(claim.diversity, 2);
    assert!((claim.support_weight - 1.3).abs() < 1e-9);
    assert!(claim.confidence > 0.5);
    assert!(!claim.contradicted);
    assert_traceable(&result, &["https://news.example/x", "doi:10.1000/x"]);
}

#[tokio::test]
async fn test_fast_mode_is_a_single_pass() {
    let mut config = EngineConfig::default();
    x_routing(&mut config);

    let web = StaticSource::new(SourceKind::Web)
        .with_documents(vec![doc("https://news.example/x", "Reports say X is true")]);
    let academic = StaticSource::new(SourceKind::Academic)
        .with_documents(vec![doc("doi:10.1000/x", "A study finds X is true")]);
    let registry = SourceRegistry::new()
        .with_port(web.clone())
        .with_port(academic.clone());
    let reasoner = reasoner().with_default_error(
        PromptKind::Decomposition,
        ReasoningError::Unavailable("must not be asked".into()),
    );

    let result = run(
        config,
        registry,
        reasoner.clone(),
        Query::new("Is X true?", Mode::Fast),
    )
    .await;

    // Web-only evidence stays below the threshold; fast mode stops anyway
    assert_eq!(result.state, Outcome::Synthesize);
    assert_eq!(result.stop_reason, StopReason::FastMode);
    assert_eq!(result.iterations, 1);
    assert_eq!(result.sub_queries.len(), 1);
    assert_eq!(reasoner.calls_for(PromptKind::Decomposition), 0);
    assert_eq!(web.calls(), 1);
    assert_eq!(academic.calls(), 0);
    assert!(result.warnings.is_empty());
}

#[tokio::test]
async fn test_two_failing_kinds_still_yield_claims() {
    let mut config = EngineConfig {
        confidence_threshold: 0.4,
        ..EngineConfig::default()
    };
    x_routing(&mut config);

    let registry = SourceRegistry::new()
        .with_port(
            StaticSource::new(SourceKind::Web)
                .with_documents(vec![doc("https://news.example/x", "Reports say X is true")]),
        )
        .with_port(
            StaticSource::new(SourceKind::Academic)
                .failing(RetrievalError::Unavailable("index offline".into())),
        )
        .with_port(StaticSource::new(SourceKind::Finance).failing(RetrievalError::Timeout));

    let result = run(config, registry, reasoner(), Query::new("Is X true?", Mode::Deep)).await;

    assert_eq!(result.state, Outcome::Synthesize);
    let sub_query = &result.sub_queries[0];
    assert_eq!(sub_query.status, SubQueryStatus::Resolved);
    assert!(result.verified_claims.iter().any(|c| c.answers(sub_query.id())));

    let failures: Vec<(SourceKind, SourceFailure)> = result
        .warnings
        .iter()
        .filter_map(|w| match w {
            RunWarning::Source(s) => Some((s.kind, s.reason.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(
        failures,
        vec![
            (
                SourceKind::Academic,
                SourceFailure::Unavailable("index offline".into())
            ),
            (SourceKind::Finance, SourceFailure::Timeout),
        ]
    );
    assert_traceable(&result, &["https://news.example/x"]);
}

/// Answers sub-questions about alpha and beta; the gamma index is down
struct LetterIndex;

impl RetrievalPort for LetterIndex {
    fn kind(&self) -> SourceKind {
        SourceKind::Web
    }

    fn retrieve(
        &self,
        sub_query: &SubQuery,
        _timeout: Duration,
        _cancel: &CancellationToken,
    ) -> Result<Vec<SourceDocument>, RetrievalError> {
        let text = sub_query.text.to_lowercase();
        if text.contains("gamma") {
            return Err(RetrievalError::Unavailable("gamma index offline".into()));
        }
        let letter = if text.contains("alpha") { "alpha" } else { "beta" };
        Ok(vec![doc(
            &format!("https://letters.example/{}", letter),
            &format!("{} entry", letter),
        )])
    }
}

fn letters_reasoner() -> MockReasoner {
    reasoner()
        .with_default(
            PromptKind::Decomposition,
            r#"{"is_complex": true, "reasoning": "three letters",
                "sub_questions": ["What is alpha?", "What is beta?", "What is gamma?"]}"#,
        )
        .with_rule(
            PromptKind::ClaimExtraction,
            &["alpha entry"],
            r#"[{"statement": "Alpha is the first letter"}]"#,
        )
        .with_rule(
            PromptKind::ClaimExtraction,
            &["beta entry"],
            r#"[{"statement": "Beta is the second letter"}]"#,
        )
}

#[tokio::test]
async fn test_unavailable_sub_query_ends_without_evidence() {
    let config = EngineConfig {
        confidence_threshold: 0.4,
        ..EngineConfig::default()
    };
    let registry = SourceRegistry::new().with_port(LetterIndex);

    let result = run(
        config,
        registry,
        letters_reasoner(),
        Query::new("Explain the first three Greek letters", Mode::Deep),
    )
    .await;

    assert_eq!(result.state, Outcome::Synthesize);
    assert_eq!(result.stop_reason, StopReason::Sufficient);
    // The gamma sub-query gets one retry before it is given up
    assert_eq!(result.iterations, 2);

    let statuses: Vec<(&str, SubQueryStatus)> = result
        .sub_queries
        .iter()
        .map(|s| (s.sub_query.text.as_str(), s.status))
        .collect();
    assert_eq!(
        statuses,
        vec![
            ("What is alpha?", SubQueryStatus::Resolved),
            ("What is beta?", SubQueryStatus::Resolved),
            ("What is gamma?", SubQueryStatus::NoEvidence),
        ]
    );

    // No-evidence sub-queries do not make a synthesized result partial by default
    assert!(!result.partial);
    assert_eq!(result.unresolved_sub_queries.len(), 1);
    assert_eq!(result.unresolved_sub_queries[0].text, "What is gamma?");
    assert_eq!(result.no_evidence_sub_queries().count(), 1);
}

#[tokio::test]
async fn test_no_evidence_policy_marks_result_partial() {
    let config = EngineConfig {
        confidence_threshold: 0.4,
        no_evidence_is_partial: true,
        ..EngineConfig::default()
    };
    let registry = SourceRegistry::new().with_port(LetterIndex);

    let result = run(
        config,
        registry,
        letters_reasoner(),
        Query::new("Explain the first three Greek letters", Mode::Deep),
    )
    .await;

    assert_eq!(result.state, Outcome::Synthesize);
    assert!(result.partial);
}

#[tokio::test]
async fn test_iteration_budget_fails_with_partial_claims() {
    let config = EngineConfig {
        max_iterations: 2,
        confidence_threshold: 0.95,
        ..EngineConfig::default()
    };
    let web = StaticSource::new(SourceKind::Web)
        .with_documents(vec![doc("https://news.example/x", "Reports say X is true")]);
    let registry = SourceRegistry::new().with_port(web.clone());

    let result = run(config, registry, reasoner(), Query::new("Is X true?", Mode::Deep)).await;

    assert_eq!(result.state, Outcome::Failed);
    assert_eq!(result.stop_reason, StopReason::IterationBudget);
    assert_eq!(result.iterations, 2);
    assert!(result.partial);
    assert!(!result.verified_claims.is_empty());
    assert_eq!(result.unresolved_sub_queries.len(), 1);
    assert_eq!(web.calls(), 2);
}

#[tokio::test]
async fn test_weak_sub_query_is_refined() {
    let config = EngineConfig {
        max_iterations: 4,
        max_sub_query_retries: 0,
        confidence_threshold: 0.6,
        ..EngineConfig::default()
    };
    let registry = SourceRegistry::new()
        .with_port(
            StaticSource::new(SourceKind::Web)
                .with_documents(vec![doc("https://news.example/x", "Reports say X is true")]),
        )
        .with_port(
            StaticSource::new(SourceKind::Academic)
                .with_documents(vec![doc("doi:10.1000/x", "A study finds X is true")]),
        );
    let reasoner = reasoner().with_rule(
        PromptKind::Decomposition,
        &["SUB-QUESTION TO REFINE"],
        r#"{"is_complex": true, "sub_questions": ["What research shows X is true?"]}"#,
    );

    let result = run(config, registry, reasoner, Query::new("Is X true?", Mode::Deep)).await;

    assert_eq!(result.state, Outcome::Synthesize);
    assert_eq!(result.iterations, 2);
    assert_eq!(result.sub_queries.len(), 2);

    let parent = &result.sub_queries[0];
    let child = &result.sub_queries[1];
    assert_eq!(parent.status, SubQueryStatus::Superseded);
    assert!(parent.refinement_attempted);
    assert_eq!(child.sub_query.parent, Some(parent.id()));
    assert_eq!((parent.sub_query.ordinal, child.sub_query.ordinal), (0, 1));
    assert_eq!(child.status, SubQueryStatus::Resolved);
    assert!(child.sub_query.sources.contains(&SourceKind::Academic));

    // The claim keeps the iteration it was first seen in
    let claim = &result.verified_claims[0];
    assert_eq!(claim.diversity, 2);
    assert_eq!(claim.first_seen_iteration, 1);
    assert!(claim.answers(parent.id()) && claim.answers(child.id()));
}

#[tokio::test]
async fn test_decomposition_failure_falls_back_to_whole_query() {
    let reasoner = reasoner().with_default_error(
        PromptKind::Decomposition,
        ReasoningError::Unavailable("model offline".into()),
    );
    let registry = SourceRegistry::new().with_port(
        StaticSource::new(SourceKind::Web)
            .with_documents(vec![doc("https://news.example/x", "Reports say X is true")]),
    );
    let config = EngineConfig {
        confidence_threshold: 0.4,
        ..EngineConfig::default()
    };

    let result = run(config, registry, reasoner, Query::new("Is X true?", Mode::Deep)).await;

    assert_eq!(result.state, Outcome::Synthesize);
    assert_eq!(result.sub_queries.len(), 1);
    assert_eq!(result.sub_queries[0].sub_query.text, "Is X true?");
    assert!(matches!(
        result.warnings[0],
        RunWarning::Decomposition { target: None, .. }
    ));
}

#[tokio::test]
async fn test_deadline_ends_run_with_partial_result() {
    let config = EngineConfig {
        run_deadline_secs: 1,
        per_source_timeout_ms: 60_000,
        ..EngineConfig::default()
    };
    let registry = SourceRegistry::new()
        .with_port(StaticSource::new(SourceKind::Web).with_latency(Duration::from_secs(30)));

    let started = Instant::now();
    let result = run(config, registry, reasoner(), Query::new("Is X true?", Mode::Deep)).await;

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(result.state, Outcome::Failed);
    assert_eq!(result.stop_reason, StopReason::Deadline);
    assert!(result.partial);
    assert!(result.warnings.contains(&RunWarning::Deadline));
    assert!(result.warnings.iter().any(|w| matches!(
        w,
        RunWarning::Source(s) if s.reason == SourceFailure::Canceled
    )));
}

#[tokio::test]
async fn test_zero_sub_query_budget_is_fatal() {
    let config = EngineConfig {
        max_sub_queries: 0,
        ..EngineConfig::default()
    };
    let result = Orchestrator::new(config, SourceRegistry::new(), Arc::new(reasoner()));
    assert!(matches!(result, Err(EngineError::Config(_))));
}

#[tokio::test]
async fn test_missing_port_is_a_warning() {
    let mut config = EngineConfig {
        confidence_threshold: 0.4,
        ..EngineConfig::default()
    };
    config.routing.academic = vec!["x".to_string()];
    let registry = SourceRegistry::new().with_port(
        StaticSource::new(SourceKind::Web)
            .with_documents(vec![doc("https://news.example/x", "Reports say X is true")]),
    );

    let result = run(config, registry, reasoner(), Query::new("Is X true?", Mode::Deep)).await;

    assert_eq!(result.state, Outcome::Synthesize);
    assert!(result.warnings.iter().any(|w| matches!(
        w,
        RunWarning::Source(s) if s.kind == SourceKind::Academic && s.reason == SourceFailure::NotRegistered
    )));
}

#[tokio::test]
async fn test_port_retries_are_invisible_to_the_run() {
    let web = StaticSource::new(SourceKind::Web)
        .with_script(vec![
            Err(RetrievalError::RateLimited),
            Err(RetrievalError::Timeout),
        ])
        .with_documents(vec![doc("https://news.example/x", "Reports say X is true")]);
    let policy = RetryPolicy {
        base_delay_ms: 1,
        ..RetryPolicy::default()
    };
    let registry = SourceRegistry::new().with_port(Retrying::with_policy(web.clone(), policy));

    let result = run(
        EngineConfig::default(),
        registry,
        reasoner(),
        Query::new("Is X true?", Mode::Fast),
    )
    .await;

    assert_eq!(web.calls(), 3);
    assert_eq!(result.iterations, 1);
    assert_eq!(result.verified_claims.len(), 1);
    assert!(result.warnings.is_empty());
    assert_eq!(result.sub_queries[0].attempts, 1);
}

fn scripted(step: u8, origin: &str) -> Result<Vec<SourceDocument>, RetrievalError> {
    match step {
        0 => Ok(vec![doc(origin, "Reports say X is true")]),
        1 => Err(RetrievalError::Timeout),
        2 => Err(RetrievalError::Unavailable("flaky".into())),
        _ => Ok(Vec::new()),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn run_terminates_within_iteration_budget(
        max_iterations in 1u32..5,
        web_script in prop::collection::vec(0u8..4, 0..10),
        academic_script in prop::collection::vec(0u8..4, 0..10),
        fast in any::<bool>(),
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let mut config = EngineConfig {
            max_iterations,
            max_sub_queries: 4,
            confidence_threshold: 0.9,
            ..EngineConfig::default()
        };
        config.routing.academic = vec!["x".to_string()];

        let registry = SourceRegistry::new()
            .with_port(
                StaticSource::new(SourceKind::Web)
                    .with_script(web_script.iter().map(|s| scripted(*s, "https://web.example/x")).collect())
                    .failing(RetrievalError::RateLimited),
            )
            .with_port(
                StaticSource::new(SourceKind::Academic)
                    .with_script(academic_script.iter().map(|s| scripted(*s, "doi:10.1000/x")).collect()),
            );
        let reasoner = reasoner().with_default(
            PromptKind::Decomposition,
            r#"{"is_complex": true, "sub_questions": ["Is X true today?", "Was X ever true?"]}"#,
        );
        let mode = if fast { Mode::Fast } else { Mode::Deep };

        let result = runtime.block_on(run(config, registry, reasoner, Query::new("Is X true?", mode)));

        prop_assert!(result.iterations >= 1);
        prop_assert!(result.iterations <= max_iterations);
        prop_assert!(result.sub_queries.len() <= 4);
        let ordinals: BTreeSet<usize> =
            result.sub_queries.iter().map(|s| s.sub_query.ordinal).collect();
        prop_assert_eq!(ordinals.len(), result.sub_queries.len());
        if fast {
            prop_assert_eq!(result.iterations, 1);
        }
        if result.state == Outcome::Failed {
            prop_assert!(result.partial);
        }
        let origins: BTreeSet<&str> = ["https://web.example/x", "doi:10.1000/x"].into_iter().collect();
        for claim in &result.verified_claims {
            prop_assert!(!claim.claim.support.is_empty());
            prop_assert!(claim.claim.support.keys().all(|o| origins.contains(o.as_str())));
        }
    }
}
