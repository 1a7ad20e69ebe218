//! Task decomposer: splits a query into routed sub-queries

use crate::calls;
use crate::config::RoutingTable;
use crate::error::DecompositionError;
use crate::parser::parse_decomposition;
use crate::prompt::DecompositionPrompt;
use corroborate_domain::{
    CancellationToken, ClaimKey, PromptKind, Query, ReasoningError, ReasoningPort, ReasoningRequest,
    SourceKind, SubQuery, VerifiedClaim,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Splits questions into sub-queries and routes each to source kinds
pub struct TaskDecomposer {
    reasoner: Arc<dyn ReasoningPort>,
    routing: RoutingTable,
    max_sub_questions: usize,
}

impl TaskDecomposer {
    /// Create a new decomposer
    pub fn new(
        reasoner: Arc<dyn ReasoningPort>,
        routing: RoutingTable,
        max_sub_questions: usize,
    ) -> Self {
        Self {
            reasoner,
            routing,
            max_sub_questions: max_sub_questions.max(1),
        }
    }

    /// The single fast-mode sub-query: the question itself, primary kind only
    pub fn fast(&self, query: &Query) -> SubQuery {
        SubQuery::new(
            query.id,
            0,
            query.text.clone(),
            BTreeSet::from([SourceKind::primary()]),
        )
    }

    /// The whole query as one routed sub-query
    pub fn whole(&self, query: &Query) -> SubQuery {
        SubQuery::new(query.id, 0, query.text.clone(), self.routing.route(&query.text))
    }

    /// Propose sub-queries for a query
    ///
    /// Returns at most `remaining_budget` sub-queries. A simple question
    /// yields the whole query as its only sub-query.
    pub async fn decompose(
        &self,
        query: &Query,
        prior: &[VerifiedClaim],
        remaining_budget: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<SubQuery>, DecompositionError> {
        if remaining_budget == 0 {
            return Ok(Vec::new());
        }

        let prompt = DecompositionPrompt::new(&query.text, self.max_sub_questions)
            .with_known_claims(&best_claims(prior))
            .build();
        let questions = self.propose(prompt, cancel).await?;

        if questions.is_empty() {
            debug!("Query judged simple, using it as the only sub-query");
            return Ok(vec![self.whole(query)]);
        }

        let sub_queries: Vec<SubQuery> = questions
            .into_iter()
            .take(self.max_sub_questions.min(remaining_budget))
            .enumerate()
            .map(|(ordinal, text)| {
                let sources = self.routing.route(&text);
                SubQuery::new(query.id, ordinal, text, sources)
            })
            .collect();

        info!("Decomposed query into {} sub-queries", sub_queries.len());
        Ok(sub_queries)
    }

    /// Propose narrower children for one weakly supported sub-query
    ///
    /// Children point back at `target` through their parent id and are
    /// numbered from `first_ordinal`, so ordinals stay unique within the
    /// query. An empty result means the model had nothing narrower to offer.
    pub async fn refine(
        &self,
        query: &Query,
        target: &SubQuery,
        prior: &[VerifiedClaim],
        first_ordinal: usize,
        remaining_budget: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<SubQuery>, DecompositionError> {
        if remaining_budget == 0 {
            return Ok(Vec::new());
        }

        let prompt = DecompositionPrompt::new(&query.text, self.max_sub_questions)
            .refining(&target.text)
            .with_known_claims(&best_claims(prior))
            .build();
        let target_key = ClaimKey::from_statement(&target.text);

        let children: Vec<SubQuery> = self
            .propose(prompt, cancel)
            .await?
            .into_iter()
            .filter(|text| ClaimKey::from_statement(text) != target_key)
            .take(self.max_sub_questions.min(remaining_budget))
            .enumerate()
            .map(|(offset, text)| {
                let sources = self.routing.route(&text);
                SubQuery::new(query.id, first_ordinal + offset, text, sources)
                    .with_parent(target.id)
            })
            .collect();

        debug!(
            "Refined sub-query '{}' into {} children",
            target.text,
            children.len()
        );
        Ok(children)
    }

    async fn propose(
        &self,
        prompt: String,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, DecompositionError> {
        let request = ReasoningRequest::new(PromptKind::Decomposition, prompt);
        let response = calls::reason(Arc::clone(&self.reasoner), request, cancel)
            .await
            .map_err(into_decomposition_error)?;

        let plan = parse_decomposition(&response).map_err(into_decomposition_error)?;
        debug!("Decomposition reasoning: {}", plan.reasoning);
        if plan.is_complex {
            Ok(plan.sub_questions)
        } else {
            Ok(Vec::new())
        }
    }
}

fn into_decomposition_error(e: ReasoningError) -> DecompositionError {
    match e {
        ReasoningError::Canceled => DecompositionError::Canceled,
        other => DecompositionError::Unavailable(other.to_string()),
    }
}

fn best_claims(prior: &[VerifiedClaim]) -> Vec<&VerifiedClaim> {
    let mut claims: Vec<&VerifiedClaim> = prior.iter().filter(|c| !c.contradicted).collect();
    claims.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    claims
}

#[cfg(test)]
mod tests {
    use super::*;
    use corroborate_domain::Mode;
    use corroborate_llm::MockReasoner;

    fn decomposer(reasoner: MockReasoner) -> TaskDecomposer {
        TaskDecomposer::new(Arc::new(reasoner), RoutingTable::default(), 5)
    }

    #[test]
    fn test_fast_mode_uses_primary_kind_only() {
        let d = decomposer(MockReasoner::default());
        let query = Query::new("What does research say about stock prices?", Mode::Fast);
        let sq = d.fast(&query);
        assert_eq!(sq.text, query.text);
        assert_eq!(sq.sources, BTreeSet::from([SourceKind::Web]));
        assert_eq!(sq.query_id, query.id);
    }

    #[tokio::test]
    async fn test_complex_query_is_split_and_routed() {
        let reasoner = MockReasoner::default().with_default(
            PromptKind::Decomposition,
            r#"{"is_complex": true, "reasoning": "two parts",
                "sub_questions": ["What is quantum computing?", "What is the stock price of IonQ?"]}"#,
        );
        let d = decomposer(reasoner);
        let query = Query::new("Explain quantum computing and IonQ's stock", Mode::Deep);

        let subs = d
            .decompose(&query, &[], 8, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].ordinal, 0);
        assert!(subs[0].sources.contains(&SourceKind::Academic));
        assert!(subs[1].sources.contains(&SourceKind::Finance));
        assert!(subs.iter().all(|s| s.sources.contains(&SourceKind::Web)));
        assert!(subs.iter().all(|s| s.parent.is_none()));
    }

    #[tokio::test]
    async fn test_budget_caps_sub_queries() {
        let reasoner = MockReasoner::default().with_default(
            PromptKind::Decomposition,
            r#"{"is_complex": true, "sub_questions": ["a one", "b two", "c three", "d four"]}"#,
        );
        let d = decomposer(reasoner);
        let query = Query::new("q", Mode::Deep);
        let cancel = CancellationToken::new();

        assert_eq!(d.decompose(&query, &[], 3, &cancel).await.unwrap().len(), 3);
        assert!(d.decompose(&query, &[], 0, &cancel).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_simple_query_is_kept_whole() {
        let reasoner = MockReasoner::default().with_default(
            PromptKind::Decomposition,
            r#"{"is_complex": false, "reasoning": "one fact", "sub_questions": []}"#,
        );
        let d = decomposer(reasoner);
        let query = Query::new("Who wrote Hamlet?", Mode::Deep);

        let subs = d.decompose(&query, &[], 8, &CancellationToken::new()).await.unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].text, "Who wrote Hamlet?");
    }

    #[tokio::test]
    async fn test_unparsable_output_is_unavailable() {
        let d = decomposer(
            MockReasoner::default().with_default(PromptKind::Decomposition, "Sure! Here you go"),
        );
        let query = Query::new("q", Mode::Deep);
        let result = d.decompose(&query, &[], 8, &CancellationToken::new()).await;
        assert!(matches!(result, Err(DecompositionError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_port_failure_is_unavailable() {
        let d = decomposer(MockReasoner::default().with_default_error(
            PromptKind::Decomposition,
            ReasoningError::Unavailable("down".into()),
        ));
        let query = Query::new("q", Mode::Deep);
        let result = d.decompose(&query, &[], 8, &CancellationToken::new()).await;
        assert!(matches!(result, Err(DecompositionError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_refine_links_children_to_target() {
        let reasoner = MockReasoner::default().with_rule(
            PromptKind::Decomposition,
            &["SUB-QUESTION TO REFINE", "When did X start?"],
            r#"{"is_complex": true, "sub_questions": ["When did X start?", "What year was X founded?"]}"#,
        );
        let d = decomposer(reasoner);
        let query = Query::new("Is X old?", Mode::Deep);
        let target = SubQuery::new(query.id, 0, "When did X start?", BTreeSet::from([SourceKind::Web]));

        let children = d
            .refine(&query, &target, &[], 3, 4, &CancellationToken::new())
            .await
            .unwrap();

        // The restated target is dropped
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].text, "What year was X founded?");
        assert_eq!(children[0].parent, Some(target.id));
        assert_eq!(children[0].ordinal, 3);
    }
}
