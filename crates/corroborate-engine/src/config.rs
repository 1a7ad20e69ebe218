//! Configuration for the engine

use crate::error::ConfigError;
use corroborate_domain::{ScoringConfig, SourceKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

/// Static trust weight per source kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustTable {
    /// General web search
    pub web: f64,
    /// Social platforms
    pub social: f64,
    /// Academic indexes
    pub academic: f64,
    /// Financial data providers
    pub finance: f64,
    /// Direct page scraping
    pub scrape: f64,
}

impl Default for TrustTable {
    fn default() -> Self {
        Self {
            web: SourceKind::Web.default_trust(),
            social: SourceKind::Social.default_trust(),
            academic: SourceKind::Academic.default_trust(),
            finance: SourceKind::Finance.default_trust(),
            scrape: SourceKind::GenericScrape.default_trust(),
        }
    }
}

impl TrustTable {
    /// Trust weight for a kind
    pub fn weight(&self, kind: SourceKind) -> f64 {
        match kind {
            SourceKind::Web => self.web,
            SourceKind::Social => self.social,
            SourceKind::Academic => self.academic,
            SourceKind::Finance => self.finance,
            SourceKind::GenericScrape => self.scrape,
        }
    }

    /// Override the weight for a kind
    pub fn with_weight(mut self, kind: SourceKind, weight: f64) -> Self {
        let slot = match kind {
            SourceKind::Web => &mut self.web,
            SourceKind::Social => &mut self.social,
            SourceKind::Academic => &mut self.academic,
            SourceKind::Finance => &mut self.finance,
            SourceKind::GenericScrape => &mut self.scrape,
        };
        *slot = weight;
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for kind in SourceKind::ALL {
            let weight = self.weight(kind);
            if !(0.0..=1.0).contains(&weight) {
                return Err(ConfigError::Invalid(format!(
                    "trust.{} must be in [0, 1], got {}",
                    kind, weight
                )));
            }
        }
        Ok(())
    }
}

/// Keyword lists mapping sub-question text to extra source kinds
///
/// The primary web kind is always attached; a kind is added when one of its
/// keywords appears as a word in the sub-question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingTable {
    /// Keywords routing to social platforms
    pub social: Vec<String>,
    /// Keywords routing to academic indexes
    pub academic: Vec<String>,
    /// Keywords routing to financial data
    pub finance: Vec<String>,
    /// Keywords routing to direct scraping
    pub scrape: Vec<String>,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self {
            social: words(&[
                "opinion", "opinions", "people", "reddit", "twitter", "tweet", "trending",
                "community", "reaction", "reactions", "sentiment", "viral", "public", "users",
            ]),
            academic: words(&[
                "research", "study", "studies", "paper", "papers", "scientific", "science",
                "theory", "clinical", "journal", "experiment", "evidence", "physics", "biology",
                "chemistry", "medicine", "quantum", "peer",
            ]),
            finance: words(&[
                "stock", "stocks", "price", "prices", "market", "markets", "revenue", "earnings",
                "shares", "economy", "economic", "inflation", "investment", "ticker", "gdp",
                "trade", "valuation", "dividend",
            ]),
            scrape: words(&[
                "website", "page", "documentation", "docs", "official", "url", "site", "homepage",
            ]),
        }
    }
}

impl RoutingTable {
    /// Source kinds implied by a piece of text
    pub fn route(&self, text: &str) -> BTreeSet<SourceKind> {
        let terms: BTreeSet<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .collect();

        let mut kinds = BTreeSet::from([SourceKind::primary()]);
        for (kind, keywords) in [
            (SourceKind::Social, &self.social),
            (SourceKind::Academic, &self.academic),
            (SourceKind::Finance, &self.finance),
            (SourceKind::GenericScrape, &self.scrape),
        ] {
            if keywords.iter().any(|k| terms.contains(&k.to_lowercase())) {
                kinds.insert(kind);
            }
        }
        kinds
    }
}

/// Configuration for the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum DECIDE transitions per run
    pub max_iterations: u32,

    /// Maximum sub-queries created over a whole run
    pub max_sub_queries: usize,

    /// Timeout for a single source call (milliseconds)
    pub per_source_timeout_ms: u64,

    /// Wall-clock budget for the whole run (seconds)
    pub run_deadline_secs: u64,

    /// Minimum confidence for a claim to resolve a sub-query
    pub confidence_threshold: f64,

    /// Concurrent source calls per sub-query
    pub max_parallel_sources_per_sub_query: usize,

    /// Extra dispatches a sub-query gets after its first
    pub max_sub_query_retries: u32,

    /// Sub-questions requested per decomposition
    pub max_sub_questions: usize,

    /// Concurrent claim extraction calls
    pub max_extraction_concurrency: usize,

    /// Ask the reasoning port whether differently worded claims match
    pub use_equivalence_oracle: bool,

    /// Equivalence calls allowed per verification pass
    pub max_equivalence_checks: usize,

    /// Count no-evidence sub-queries as making a synthesized result partial
    pub no_evidence_is_partial: bool,

    /// Confidence scoring weights
    pub scoring: ScoringConfig,

    /// Trust weight per source kind
    pub trust: TrustTable,

    /// Keyword routing of sub-questions to source kinds
    pub routing: RoutingTable,
}

impl Default for EngineConfig {
    /// Default configuration with balanced settings
    fn default() -> Self {
        Self {
            max_iterations: 4,
            max_sub_queries: 8,
            per_source_timeout_ms: 10_000,
            run_deadline_secs: 120,
            confidence_threshold: 0.5,
            max_parallel_sources_per_sub_query: 4,
            max_sub_query_retries: 1,
            max_sub_questions: 5,
            max_extraction_concurrency: 4,
            use_equivalence_oracle: true,
            max_equivalence_checks: 64,
            no_evidence_is_partial: false,
            scoring: ScoringConfig::default(),
            trust: TrustTable::default(),
            routing: RoutingTable::default(),
        }
    }
}

impl EngineConfig {
    /// Quick preset: one refinement at most, short timeouts, no oracle
    pub fn quick() -> Self {
        Self {
            max_iterations: 2,
            max_sub_queries: 4,
            per_source_timeout_ms: 5_000,
            run_deadline_secs: 45,
            max_sub_query_retries: 0,
            max_sub_questions: 3,
            use_equivalence_oracle: false,
            ..Self::default()
        }
    }

    /// Thorough preset: more iterations and sub-queries, longer timeouts
    pub fn thorough() -> Self {
        Self {
            max_iterations: 8,
            max_sub_queries: 16,
            per_source_timeout_ms: 20_000,
            run_deadline_secs: 600,
            confidence_threshold: 0.6,
            max_sub_query_retries: 2,
            max_equivalence_checks: 256,
            ..Self::default()
        }
    }

    /// Preset by name: `quick`, `default` or `thorough`
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "quick" => Some(Self::quick()),
            "default" => Some(Self::default()),
            "thorough" => Some(Self::thorough()),
            _ => None,
        }
    }

    /// Get the per-source timeout as a Duration
    pub fn per_source_timeout(&self) -> Duration {
        Duration::from_millis(self.per_source_timeout_ms)
    }

    /// Get the run deadline as a Duration
    pub fn run_deadline(&self) -> Duration {
        Duration::from_secs(self.run_deadline_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("max_iterations", self.max_iterations as u64),
            ("max_sub_queries", self.max_sub_queries as u64),
            ("per_source_timeout_ms", self.per_source_timeout_ms),
            ("run_deadline_secs", self.run_deadline_secs),
            (
                "max_parallel_sources_per_sub_query",
                self.max_parallel_sources_per_sub_query as u64,
            ),
            ("max_sub_questions", self.max_sub_questions as u64),
            ("max_extraction_concurrency", self.max_extraction_concurrency as u64),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{} must be greater than 0", name)));
            }
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::Invalid(format!(
                "confidence_threshold must be in [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        self.scoring
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("scoring: {}", e)))?;
        self.trust.validate()
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load and validate configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&contents)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_presets_are_valid() {
        for name in ["quick", "default", "thorough"] {
            let config = EngineConfig::preset(name).unwrap();
            assert!(config.validate().is_ok(), "{} preset invalid", name);
        }
        assert!(EngineConfig::preset("reckless").is_none());
    }

    #[test]
    fn test_zero_sub_queries_is_invalid() {
        let config = EngineConfig {
            max_sub_queries: 0,
            ..EngineConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_sub_queries"));
    }

    #[test]
    fn test_threshold_out_of_range() {
        let config = EngineConfig {
            confidence_threshold: 1.5,
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_bad_trust_weight() {
        let config = EngineConfig {
            trust: TrustTable::default().with_weight(SourceKind::Social, -0.1),
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_scoring_weights_must_sum_to_one() {
        let mut config = EngineConfig::default();
        config.scoring.support_weight = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = EngineConfig::from_toml(
            r#"
            max_iterations = 2

            [trust]
            web = 0.7

            [routing]
            finance = ["bitcoin"]
            "#,
        )
        .unwrap();

        assert_eq!(config.max_iterations, 2);
        assert_eq!(config.max_sub_queries, 8);
        assert_eq!(config.trust.weight(SourceKind::Web), 0.7);
        assert_eq!(config.trust.weight(SourceKind::Academic), 0.9);
        assert_eq!(config.routing.finance, vec!["bitcoin".to_string()]);
        assert!(!config.routing.academic.is_empty());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = EngineConfig::thorough();
        let toml_str = config.to_toml().unwrap();
        let parsed = EngineConfig::from_toml(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_from_file_validates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_sub_queries = 0").unwrap();
        assert!(matches!(
            EngineConfig::from_file(file.path()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_routing_always_includes_web() {
        let routing = RoutingTable::default();
        assert_eq!(
            routing.route("Who painted the Mona Lisa?"),
            BTreeSet::from([SourceKind::Web])
        );
        assert_eq!(
            routing.route("What does recent research say about the stock price of ACME?"),
            BTreeSet::from([SourceKind::Web, SourceKind::Academic, SourceKind::Finance])
        );
    }

    #[test]
    fn test_routing_matches_whole_words() {
        let routing = RoutingTable::default();
        // "supermarket" must not trigger "market"
        assert_eq!(
            routing.route("Which supermarket opened first?"),
            BTreeSet::from([SourceKind::Web])
        );
    }
}
