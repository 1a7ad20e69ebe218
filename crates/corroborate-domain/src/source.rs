//! Source kinds and retrieved evidence

use crate::query::SubQueryId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of external evidence provider
///
/// Ordering is stable (declaration order) so sets of kinds iterate
/// deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// General web search results
    Web,
    /// Social platforms (forums, microblogs)
    Social,
    /// Papers, preprints, academic indexes
    Academic,
    /// Market and company financial data
    Finance,
    /// Direct page scraping of a known location
    #[serde(rename = "scrape")]
    GenericScrape,
}

impl SourceKind {
    /// All kinds, in declaration order
    pub const ALL: [SourceKind; 5] = [
        SourceKind::Web,
        SourceKind::Social,
        SourceKind::Academic,
        SourceKind::Finance,
        SourceKind::GenericScrape,
    ];

    /// The primary kind used by fast mode and attached to every sub-query
    pub fn primary() -> Self {
        SourceKind::Web
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Web => "web",
            SourceKind::Social => "social",
            SourceKind::Academic => "academic",
            SourceKind::Finance => "finance",
            SourceKind::GenericScrape => "scrape",
        }
    }

    /// Static trust weight for items from this kind
    ///
    /// Academic and financial data providers are curated; social
    /// platforms are not.
    pub fn default_trust(&self) -> f64 {
        match self {
            SourceKind::Academic => 0.9,
            SourceKind::Finance => 0.8,
            SourceKind::Web => 0.6,
            SourceKind::GenericScrape => 0.5,
            SourceKind::Social => 0.4,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "web" => Ok(SourceKind::Web),
            "social" => Ok(SourceKind::Social),
            "academic" => Ok(SourceKind::Academic),
            "finance" => Ok(SourceKind::Finance),
            "scrape" | "generic-scrape" | "generic_scrape" => Ok(SourceKind::GenericScrape),
            other => Err(format!("Unknown source kind: {}", other)),
        }
    }
}

/// A document as returned by a retrieval port
///
/// Ports only describe what they found. The dispatcher turns documents into
/// [`RetrievedItem`]s, stamping kind, sub-query and trust weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    /// URL, handle, DOI or ticker the document came from
    pub origin: String,

    /// Title or headline, if the source has one
    #[serde(default)]
    pub title: Option<String>,

    /// Raw text or snippet
    pub text: String,

    /// Publication time reported by the source (unix seconds)
    #[serde(default)]
    pub published_at: Option<u64>,
}

impl SourceDocument {
    /// Create a document with origin and text
    pub fn new(origin: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            title: None,
            text: text.into(),
            published_at: None,
        }
    }

    /// Attach a title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// One unit of evidence returned by a real retrieval call
///
/// Read-only once handed to verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedItem {
    /// Kind of source that produced the item
    pub kind: SourceKind,

    /// Origin identifier (URL/handle/DOI)
    pub origin: String,

    /// Title, if any
    pub title: Option<String>,

    /// Raw text or snippet
    pub text: String,

    /// When the dispatcher received it (unix seconds)
    pub retrieved_at: u64,

    /// Static trust weight of the source kind
    pub trust_weight: f64,

    /// Sub-query the item was retrieved for
    pub sub_query: SubQueryId,
}

impl RetrievedItem {
    /// Stamp a port document into an item
    pub fn from_document(
        document: SourceDocument,
        kind: SourceKind,
        sub_query: SubQueryId,
        trust_weight: f64,
        retrieved_at: u64,
    ) -> Self {
        Self {
            kind,
            origin: document.origin,
            title: document.title,
            text: document.text,
            retrieved_at,
            trust_weight: trust_weight.clamp(0.0, 1.0),
            sub_query,
        }
    }
}
