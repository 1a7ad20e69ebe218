//! Claims - atomic factual assertions extracted from evidence

use crate::query::SubQueryId;
use crate::source::{RetrievedItem, SourceKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Whether a claim asserts or denies its proposition
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    /// The proposition holds
    Asserted,
    /// The proposition does not hold
    Negated,
}

impl Polarity {
    /// The opposing polarity
    pub fn opposite(&self) -> Self {
        match self {
            Polarity::Asserted => Polarity::Negated,
            Polarity::Negated => Polarity::Asserted,
        }
    }

    /// Build from an extraction flag
    pub fn from_negated(negated: bool) -> Self {
        if negated {
            Polarity::Negated
        } else {
            Polarity::Asserted
        }
    }
}

/// Normalized proposition text
///
/// Two statements with the same key are near-exact matches: they differ only
/// in case, punctuation or spacing.
///
/// # Examples
///
/// ```
/// use corroborate_domain::ClaimKey;
///
/// let a = ClaimKey::from_statement("The Eiffel Tower is 330 m tall.");
/// let b = ClaimKey::from_statement("the eiffel  tower is 330 m tall");
/// assert_eq!(a, b);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimKey(String);

impl ClaimKey {
    /// Normalize a statement into a key
    pub fn from_statement(statement: &str) -> Self {
        let mapped: String = statement
            .chars()
            .map(|c| {
                if c.is_alphanumeric() {
                    c.to_lowercase().next().unwrap_or(c)
                } else {
                    ' '
                }
            })
            .collect();
        Self(mapped.split_whitespace().collect::<Vec<_>>().join(" "))
    }

    /// The normalized text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether normalization left nothing behind
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ClaimKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to a retrieved item supporting a claim
///
/// Claims hold identifiers, never the items themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportRef {
    /// Origin identifier of the item
    pub origin: String,

    /// Kind of source the item came from
    pub kind: SourceKind,

    /// Trust weight the item carried
    pub trust_weight: f64,
}

impl From<&RetrievedItem> for SupportRef {
    fn from(item: &RetrievedItem) -> Self {
        Self {
            origin: item.origin.clone(),
            kind: item.kind,
            trust_weight: item.trust_weight,
        }
    }
}

/// An atomic factual assertion with its supporting items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    /// Normalized proposition (cluster identity)
    pub key: ClaimKey,

    /// Human-readable statement of the proposition
    pub statement: String,

    /// Asserted or negated
    pub polarity: Polarity,

    /// Supporting items keyed by origin
    pub support: BTreeMap<String, SupportRef>,

    /// Sub-queries whose evidence produced this claim
    pub sub_queries: BTreeSet<SubQueryId>,

    /// Every key judged to state this proposition, including `key`
    #[serde(default)]
    pub aliases: BTreeSet<ClaimKey>,
}

impl Claim {
    /// Create a claim supported by a single item
    pub fn from_item(statement: impl Into<String>, polarity: Polarity, item: &RetrievedItem) -> Self {
        let statement = statement.into();
        let mut support = BTreeMap::new();
        support.insert(item.origin.clone(), SupportRef::from(item));
        let mut sub_queries = BTreeSet::new();
        sub_queries.insert(item.sub_query);
        let key = ClaimKey::from_statement(&statement);
        Self {
            aliases: BTreeSet::from([key.clone()]),
            key,
            statement,
            polarity,
            support,
            sub_queries,
        }
    }

    /// Union another claim's support and aliases into this one
    ///
    /// Support only grows; an origin already present keeps its first entry.
    pub fn absorb(&mut self, other: &Claim) {
        for (origin, support) in &other.support {
            self.support
                .entry(origin.clone())
                .or_insert_with(|| support.clone());
        }
        self.sub_queries.extend(other.sub_queries.iter().copied());
        self.aliases.insert(other.key.clone());
        self.aliases.extend(other.aliases.iter().cloned());
    }

    /// Whether the two claims share any alias
    pub fn shares_alias(&self, other: &Claim) -> bool {
        !self.aliases.is_disjoint(&other.aliases)
    }

    /// Number of distinct source kinds among the supporting items
    pub fn diversity(&self) -> usize {
        self.support
            .values()
            .map(|s| s.kind)
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Total trust weight of the supporting items
    pub fn support_weight(&self) -> f64 {
        self.support.values().map(|s| s.trust_weight).sum()
    }
}

/// A claim annotated with its confidence after cross-source verification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiedClaim {
    /// The underlying claim
    pub claim: Claim,

    /// Confidence score in [0, 1]
    pub confidence: f64,

    /// Number of independent source kinds supporting the claim
    pub diversity: usize,

    /// Number of supporting items
    pub support_count: usize,

    /// Total supporting trust weight
    pub support_weight: f64,

    /// Trust weight behind the opposing claim, if one exists
    pub opposing_weight: f64,

    /// An opposing claim with comparable support exists
    pub contradicted: bool,

    /// Loop iteration in which the claim first appeared
    pub first_seen_iteration: u32,
}

impl VerifiedClaim {
    /// Identity of the claim within a run
    pub fn identity(&self) -> (&ClaimKey, Polarity) {
        (&self.claim.key, self.claim.polarity)
    }

    /// Whether this claim answers the given sub-query
    pub fn answers(&self, sub_query: SubQueryId) -> bool {
        self.claim.sub_queries.contains(&sub_query)
    }
}
