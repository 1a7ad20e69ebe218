//! Local JSON corpus served through retrieval ports
//!
//! A corpus file holds documents tagged by source kind:
//!
//! ```json
//! {
//!   "documents": [
//!     { "kind": "academic", "origin": "doi:10.1/x", "title": "...", "text": "..." }
//!   ]
//! }
//! ```
//!
//! Each kind present in the file gets its own [`CorpusSource`], which ranks
//! documents by how many query terms they contain.

use crate::SourceError;
use corroborate_domain::{
    CancellationToken, RetrievalError, RetrievalPort, SourceDocument, SourceKind, SubQuery,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Default number of documents returned per call
pub const DEFAULT_LIMIT: usize = 5;

/// Terms shorter than this are ignored when matching
const MIN_TERM_LEN: usize = 3;

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "was", "were", "what", "which", "who", "whom", "when", "where",
    "why", "how", "does", "did", "has", "have", "had", "with", "from", "that", "this", "than",
    "then", "into", "about", "its", "their", "there", "been", "being", "not", "can", "will",
];

/// One document in a corpus file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusEntry {
    /// Source kind the document is served by
    pub kind: SourceKind,
    /// Origin identifier
    pub origin: String,
    /// Optional title
    #[serde(default)]
    pub title: Option<String>,
    /// Document text
    pub text: String,
    /// Publication time (unix seconds)
    #[serde(default)]
    pub published_at: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct CorpusFile {
    documents: Vec<CorpusEntry>,
}

/// Documents grouped by source kind
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    by_kind: BTreeMap<SourceKind, Vec<SourceDocument>>,
}

impl Corpus {
    /// Load a corpus from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let corpus = Self::from_json(&contents)?;
        info!(
            "Loaded corpus from {} ({} documents, kinds: {:?})",
            path.display(),
            corpus.len(),
            corpus.kinds()
        );
        Ok(corpus)
    }

    /// Parse a corpus from a JSON string
    pub fn from_json(json: &str) -> Result<Self, SourceError> {
        let file: CorpusFile = serde_json::from_str(json)?;
        Self::from_entries(file.documents)
    }

    /// Build a corpus from entries, rejecting empty origins or texts
    pub fn from_entries(entries: Vec<CorpusEntry>) -> Result<Self, SourceError> {
        let mut by_kind: BTreeMap<SourceKind, Vec<SourceDocument>> = BTreeMap::new();
        for (index, entry) in entries.into_iter().enumerate() {
            if entry.origin.trim().is_empty() {
                return Err(SourceError::InvalidDocument {
                    index,
                    reason: "empty origin".to_string(),
                });
            }
            if entry.text.trim().is_empty() {
                return Err(SourceError::InvalidDocument {
                    index,
                    reason: "empty text".to_string(),
                });
            }
            by_kind.entry(entry.kind).or_default().push(SourceDocument {
                origin: entry.origin,
                title: entry.title,
                text: entry.text,
                published_at: entry.published_at,
            });
        }
        Ok(Self { by_kind })
    }

    /// Kinds with at least one document
    pub fn kinds(&self) -> Vec<SourceKind> {
        self.by_kind.keys().copied().collect()
    }

    /// Total number of documents
    pub fn len(&self) -> usize {
        self.by_kind.values().map(Vec::len).sum()
    }

    /// Whether the corpus has no documents
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One port per kind present in the corpus
    pub fn ports(&self) -> Vec<Arc<dyn RetrievalPort>> {
        self.by_kind
            .iter()
            .map(|(kind, docs)| {
                Arc::new(CorpusSource::new(*kind, docs.clone())) as Arc<dyn RetrievalPort>
            })
            .collect()
    }
}

/// Retrieval port answering from a fixed set of documents
#[derive(Debug, Clone)]
pub struct CorpusSource {
    kind: SourceKind,
    documents: Vec<SourceDocument>,
    limit: usize,
}

impl CorpusSource {
    /// Create a port for `kind` over `documents`
    pub fn new(kind: SourceKind, documents: Vec<SourceDocument>) -> Self {
        Self {
            kind,
            documents,
            limit: DEFAULT_LIMIT,
        }
    }

    /// Set the maximum number of documents per call
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    /// Documents ranked by matching terms, best first; ties keep corpus order
    pub fn search(&self, text: &str) -> Vec<SourceDocument> {
        let terms = terms(text);
        if terms.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, usize)> = self
            .documents
            .iter()
            .enumerate()
            .filter_map(|(index, doc)| {
                let haystack = match &doc.title {
                    Some(title) => format!("{} {}", title, doc.text),
                    None => doc.text.clone(),
                };
                let doc_terms = terms_of(&haystack);
                let hits = terms.iter().filter(|t| doc_terms.contains(*t)).count();
                (hits > 0).then_some((hits, index))
            })
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

        scored
            .into_iter()
            .take(self.limit)
            .map(|(_, index)| self.documents[index].clone())
            .collect()
    }
}

impl RetrievalPort for CorpusSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn retrieve(
        &self,
        sub_query: &SubQuery,
        _timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Vec<SourceDocument>, RetrievalError> {
        if cancel.is_cancelled() {
            return Err(RetrievalError::Canceled);
        }
        if sub_query.text.trim().is_empty() {
            return Err(RetrievalError::InvalidQuery("empty query text".to_string()));
        }
        let found = self.search(&sub_query.text);
        debug!("Corpus '{}' matched {} documents", self.kind, found.len());
        Ok(found)
    }
}

fn terms_of(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn terms(text: &str) -> BTreeSet<String> {
    terms_of(text)
        .into_iter()
        .filter(|t| t.chars().count() >= MIN_TERM_LEN && !STOPWORDS.contains(&t.as_str()))
        .collect()
}
