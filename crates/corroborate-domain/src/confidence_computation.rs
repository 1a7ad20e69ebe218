//! Confidence computation
//!
//! Implements the deterministic scoring function applied to every verified
//! claim:
//! 1. Diversity term from the number of independent source kinds
//! 2. Support term from the total supporting trust weight
//! 3. Contradiction penalty from the opposing claim's weight
//! 4. High-confidence cap when the opposition is at least as strong
//!
//! Adding support never lowers a score and adding opposition never raises
//! it; the property tests below pin both directions.

use crate::claim::Claim;
use serde::{Deserialize, Serialize};

/// Weight of the diversity term (dominant factor)
pub const DIVERSITY_WEIGHT: f64 = 0.75;

/// Weight of the supporting trust term
pub const SUPPORT_WEIGHT: f64 = 0.25;

/// Maximum fraction of the score removed by opposition
pub const PENALTY_FACTOR: f64 = 0.5;

/// Configuration for confidence computation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Weight of the diversity term
    pub diversity_weight: f64,
    /// Weight of the supporting trust term
    pub support_weight: f64,
    /// Maximum fraction of the score removed by opposition
    pub penalty_factor: f64,
    /// Opposition/support ratio at which a claim is flagged contradicted
    pub contradiction_ratio: f64,
    /// Scores at or above this are "high confidence"
    pub high_confidence_threshold: f64,
    /// Distance below the high threshold a contradicted claim is capped at
    pub contradiction_margin: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            diversity_weight: DIVERSITY_WEIGHT,
            support_weight: SUPPORT_WEIGHT,
            penalty_factor: PENALTY_FACTOR,
            contradiction_ratio: 0.5,
            high_confidence_threshold: 0.8,
            contradiction_margin: 0.05,
        }
    }
}

impl ScoringConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("diversity_weight", self.diversity_weight),
            ("support_weight", self.support_weight),
            ("penalty_factor", self.penalty_factor),
            ("high_confidence_threshold", self.high_confidence_threshold),
            ("contradiction_margin", self.contradiction_margin),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("{} must be in [0, 1], got {}", name, value));
            }
        }
        if (self.diversity_weight + self.support_weight - 1.0).abs() > 1e-6 {
            return Err("diversity_weight + support_weight must equal 1".to_string());
        }
        if self.diversity_weight < self.support_weight {
            return Err("diversity_weight must dominate support_weight".to_string());
        }
        if self.contradiction_ratio <= 0.0 {
            return Err("contradiction_ratio must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Result of scoring one claim
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceScore {
    /// Final score in [0, 1]
    pub confidence: f64,
    /// Opposition is comparable to support
    pub contradicted: bool,
}

/// Score a claim from its support and the weight of the opposing claim
///
/// # Arguments
/// * `diversity` - Number of distinct source kinds supporting the claim
/// * `support_weight` - Total trust weight of the supporting items
/// * `opposing_weight` - Total trust weight behind the opposite polarity
/// * `config` - Scoring configuration
pub fn compute_confidence(
    diversity: usize,
    support_weight: f64,
    opposing_weight: f64,
    config: &ScoringConfig,
) -> ConfidenceScore {
    let support_weight = support_weight.max(0.0);
    let opposing_weight = opposing_weight.max(0.0);

    // Step 1: diversity, saturating towards 1
    let diversity_term = 1.0 - 0.5_f64.powi(diversity.min(64) as i32);

    // Step 2: supporting trust, saturating towards 1
    let support_term = saturate(support_weight);

    let base = config.diversity_weight * diversity_term + config.support_weight * support_term;

    // Step 3: opposition penalty
    let penalty = 1.0 - config.penalty_factor * saturate(opposing_weight);
    let mut confidence = base * penalty;

    // Step 4: same-or-greater-weight opposition keeps the claim below "high"
    if opposing_weight > 0.0 && opposing_weight >= support_weight {
        let cap = (config.high_confidence_threshold - config.contradiction_margin).max(0.0);
        confidence = confidence.min(cap);
    }

    let contradicted =
        opposing_weight > 0.0 && opposing_weight >= config.contradiction_ratio * support_weight;

    ConfidenceScore {
        confidence: confidence.clamp(0.0, 1.0),
        contradicted,
    }
}

/// Score a claim against an optional opposing claim
pub fn score_claim(claim: &Claim, opposing: Option<&Claim>, config: &ScoringConfig) -> ConfidenceScore {
    compute_confidence(
        claim.diversity(),
        claim.support_weight(),
        opposing.map(Claim::support_weight).unwrap_or(0.0),
        config,
    )
}

fn saturate(weight: f64) -> f64 {
    weight / (weight + 1.0)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: scores always lie in [0, 1]
        #[test]
        fn test_confidence_range(
            diversity in 0usize..=5,
            support in 0.0f64..10.0,
            opposing in 0.0f64..10.0,
        ) {
            let score = compute_confidence(diversity, support, opposing, &ScoringConfig::default());
            prop_assert!(score.confidence >= 0.0 && score.confidence <= 1.0);
        }

        /// Property: an extra corroborating item never lowers the score,
        /// whether it comes from a new kind or an already-seen one
        #[test]
        fn test_corroboration_never_decreases(
            diversity in 1usize..=4,
            support in 0.1f64..5.0,
            extra in 0.0f64..1.0,
            new_kind: bool,
            opposing in 0.0f64..5.0,
        ) {
            let config = ScoringConfig::default();
            let before = compute_confidence(diversity, support, opposing, &config);
            let after = compute_confidence(
                diversity + usize::from(new_kind),
                support + extra,
                opposing,
                &config,
            );
            prop_assert!(after.confidence >= before.confidence,
                "{} dropped to {}", before.confidence, after.confidence);
        }

        /// Property: more opposition never raises the score
        #[test]
        fn test_contradiction_never_increases(
            diversity in 1usize..=4,
            support in 0.1f64..5.0,
            opposing in 0.0f64..5.0,
            extra in 0.0f64..2.0,
        ) {
            let config = ScoringConfig::default();
            let before = compute_confidence(diversity, support, opposing, &config);
            let after = compute_confidence(diversity, support, opposing + extra, &config);
            prop_assert!(after.confidence <= before.confidence);
        }

        /// Property: a same-or-greater-weight contradiction keeps the claim
        /// below the high-confidence threshold
        #[test]
        fn test_strong_contradiction_caps(
            diversity in 1usize..=5,
            support in 0.1f64..5.0,
            surplus in 0.0f64..3.0,
        ) {
            let config = ScoringConfig::default();
            let score = compute_confidence(diversity, support, support + surplus, &config);
            prop_assert!(score.confidence < config.high_confidence_threshold);
            prop_assert!(score.contradicted);
        }
    }
}
