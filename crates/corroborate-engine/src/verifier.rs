//! Verification engine: claim extraction, clustering and scoring
//!
//! A pass turns retrieved items into the new authoritative claim snapshot:
//!
//! 1. Extract candidate claims from every item, concurrently
//! 2. Cluster candidates into the prior claims or into new claims
//! 3. Score every claim against its opposite-polarity counterpart
//!
//! Items and candidates are put in a canonical order before clustering, so
//! the snapshot does not depend on the order sources answered in.

use crate::calls;
use crate::error::EngineError;
use crate::parser::{parse_claims, parse_equivalence};
use crate::prompt::{equivalence_prompt, ExtractionPrompt};
use crate::state::RunWarning;
use corroborate_domain::{
    score_claim, CancellationToken, Claim, PromptKind, ReasoningError, ReasoningPort,
    ReasoningRequest, RetrievedItem, ScoringConfig, VerifiedClaim,
};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Settings for a verification engine
#[derive(Debug, Clone)]
pub struct VerifierSettings {
    /// Scoring weights
    pub scoring: ScoringConfig,
    /// Ask the reasoning port to match differently worded claims
    pub use_equivalence_oracle: bool,
    /// Equivalence calls allowed per pass
    pub max_equivalence_checks: usize,
    /// Concurrent extraction calls
    pub max_extraction_concurrency: usize,
}

/// Result of one verification pass
#[derive(Debug, Clone)]
pub struct VerifyOutcome {
    /// Full claim snapshot, sorted by (key, polarity)
    pub claims: Vec<VerifiedClaim>,
    /// Claims that did not exist before this pass
    pub new_claims: usize,
    /// Degradations during the pass
    pub warnings: Vec<RunWarning>,
}

/// A claim being assembled
///
/// Aliases live on the claim, so keys merged in earlier passes still match
/// and still oppose.
struct Cluster {
    claim: Claim,
    first_seen: u32,
}

impl Cluster {
    fn new(claim: Claim, first_seen: u32) -> Self {
        Self { claim, first_seen }
    }
}

/// Extracts, merges and scores claims
pub struct VerificationEngine {
    reasoner: Arc<dyn ReasoningPort>,
    settings: VerifierSettings,
}

impl VerificationEngine {
    /// Create a new verification engine
    pub fn new(reasoner: Arc<dyn ReasoningPort>, settings: VerifierSettings) -> Self {
        Self { reasoner, settings }
    }

    /// Verify a batch of items against the prior claim snapshot
    ///
    /// Prior claims are never dropped: they can only gain support or be
    /// rescored. `iteration` is recorded on claims first seen in this pass.
    pub async fn verify(
        &self,
        question: &str,
        items: &[RetrievedItem],
        prior: &[VerifiedClaim],
        iteration: u32,
        cancel: &CancellationToken,
    ) -> Result<VerifyOutcome, EngineError> {
        let mut warnings = Vec::new();

        let candidates = self
            .extract_all(question, items, cancel, &mut warnings)
            .await?;
        debug!(
            "Extracted {} candidate claims from {} items",
            candidates.len(),
            items.len()
        );

        let mut clusters: Vec<Cluster> = prior
            .iter()
            .map(|v| Cluster::new(v.claim.clone(), v.first_seen_iteration))
            .collect();
        clusters.sort_by(|a, b| {
            (&a.claim.key, a.claim.polarity).cmp(&(&b.claim.key, b.claim.polarity))
        });
        let prior_count = clusters.len();

        self.cluster(candidates, &mut clusters, iteration, cancel, &mut warnings)
            .await;

        let claims = self.score(&clusters);
        let new_claims = clusters.len() - prior_count;
        info!(
            "Verification pass: {} claims ({} new) from {} items",
            claims.len(),
            new_claims,
            items.len()
        );

        Ok(VerifyOutcome {
            claims,
            new_claims,
            warnings,
        })
    }

    /// Extract candidates from every item; failures drop only that item
    async fn extract_all(
        &self,
        question: &str,
        items: &[RetrievedItem],
        cancel: &CancellationToken,
        warnings: &mut Vec<RunWarning>,
    ) -> Result<Vec<Claim>, EngineError> {
        let mut ordered: Vec<&RetrievedItem> = items.iter().collect();
        ordered.sort_by(|a, b| {
            (&a.origin, a.kind, a.sub_query).cmp(&(&b.origin, b.kind, b.sub_query))
        });

        let semaphore = Arc::new(Semaphore::new(self.settings.max_extraction_concurrency.max(1)));
        let mut handles = Vec::with_capacity(ordered.len());
        for item in &ordered {
            let prompt = ExtractionPrompt::new(question, item).build();
            let request = ReasoningRequest::new(PromptKind::ClaimExtraction, prompt);
            let reasoner = Arc::clone(&self.reasoner);
            let sem = Arc::clone(&semaphore);
            let cancel = cancel.clone();

            handles.push(tokio::spawn(async move {
                let response = match sem.acquire_owned().await {
                    Ok(_permit) => calls::reason(reasoner, request, &cancel).await,
                    Err(_) => Err(ReasoningError::Canceled),
                };
                response.and_then(|text| parse_claims(&text))
            }));
        }

        let mut candidates = Vec::new();
        for (item, handle) in ordered.into_iter().zip(handles) {
            match handle.await? {
                Ok(parsed) => candidates.extend(
                    parsed
                        .into_iter()
                        .map(|c| Claim::from_item(c.statement, c.polarity, item)),
                ),
                Err(ReasoningError::Canceled) => {
                    debug!("Claim extraction canceled for {}", item.origin);
                }
                Err(e) => {
                    warn!("Claim extraction failed for {}: {}", item.origin, e);
                    warnings.push(RunWarning::Extraction {
                        origin: item.origin.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(candidates)
    }

    /// Merge candidates into clusters
    ///
    /// A candidate joins the first same-polarity cluster that already knows
    /// its key, else the first one the oracle accepts, else starts its own.
    async fn cluster(
        &self,
        mut candidates: Vec<Claim>,
        clusters: &mut Vec<Cluster>,
        iteration: u32,
        cancel: &CancellationToken,
        warnings: &mut Vec<RunWarning>,
    ) {
        candidates.sort_by(|a, b| {
            (&a.key, a.polarity, a.support.keys().next())
                .cmp(&(&b.key, b.polarity, b.support.keys().next()))
        });

        let mut checks_left = if self.settings.use_equivalence_oracle {
            self.settings.max_equivalence_checks
        } else {
            0
        };

        for candidate in candidates {
            if let Some(cluster) = clusters.iter_mut().find(|c| {
                c.claim.polarity == candidate.polarity && c.claim.aliases.contains(&candidate.key)
            }) {
                cluster.claim.absorb(&candidate);
                continue;
            }

            let mut matched = None;
            for (idx, cluster) in clusters.iter().enumerate() {
                if checks_left == 0 {
                    break;
                }
                if cluster.claim.polarity != candidate.polarity {
                    continue;
                }
                checks_left -= 1;
                match self
                    .equivalent(&candidate.statement, &cluster.claim.statement, cancel)
                    .await
                {
                    Ok(true) => {
                        matched = Some(idx);
                        break;
                    }
                    Ok(false) => {}
                    Err(ReasoningError::Canceled) => {
                        checks_left = 0;
                    }
                    Err(e) => {
                        warn!("Equivalence check failed: {}", e);
                        warnings.push(RunWarning::Equivalence {
                            reason: e.to_string(),
                        });
                    }
                }
            }

            match matched {
                Some(idx) => {
                    debug!(
                        "Merged '{}' into '{}'",
                        candidate.statement, clusters[idx].claim.statement
                    );
                    clusters[idx].claim.absorb(&candidate);
                }
                None => clusters.push(Cluster::new(candidate, iteration)),
            }
        }
    }

    async fn equivalent(
        &self,
        first: &str,
        second: &str,
        cancel: &CancellationToken,
    ) -> Result<bool, ReasoningError> {
        let request =
            ReasoningRequest::new(PromptKind::ClaimEquivalence, equivalence_prompt(first, second));
        let response = calls::reason(Arc::clone(&self.reasoner), request, cancel).await?;
        parse_equivalence(&response)
    }

    /// Score every cluster against its strongest opposite-polarity match
    fn score(&self, clusters: &[Cluster]) -> Vec<VerifiedClaim> {
        let mut claims: Vec<VerifiedClaim> = clusters
            .iter()
            .map(|cluster| {
                let opposing = clusters
                    .iter()
                    .filter(|other| {
                        other.claim.polarity != cluster.claim.polarity
                            && other.claim.shares_alias(&cluster.claim)
                    })
                    .map(|other| &other.claim)
                    .max_by(|a, b| a.support_weight().total_cmp(&b.support_weight()));

                let score = score_claim(&cluster.claim, opposing, &self.settings.scoring);
                if score.contradicted {
                    debug!("Claim '{}' is contradicted", cluster.claim.statement);
                }

                VerifiedClaim {
                    diversity: cluster.claim.diversity(),
                    support_count: cluster.claim.support.len(),
                    support_weight: cluster.claim.support_weight(),
                    opposing_weight: opposing.map(Claim::support_weight).unwrap_or(0.0),
                    confidence: score.confidence,
                    contradicted: score.contradicted,
                    first_seen_iteration: cluster.first_seen,
                    claim: cluster.claim.clone(),
                }
            })
            .collect();

        claims.sort_by(|a, b| a.identity().cmp(&b.identity()));
        claims
    }
}
