//! Queries and sub-queries

use crate::source::SourceKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Unique identifier for a run's query, based on UUIDv7
///
/// UUIDv7 keeps identifiers chronologically sortable, so logs and
/// `RunResult`s from the same process order naturally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct QueryId(u128);

impl QueryId {
    /// Generate a new UUIDv7-based QueryId
    ///
    /// # Examples
    ///
    /// ```
    /// use corroborate_domain::QueryId;
    ///
    /// let id = QueryId::new();
    /// assert!(id.value() > 0);
    /// ```
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7().as_u128())
    }

    /// Create a QueryId from a raw u128 value
    pub fn from_value(value: u128) -> Self {
        Self(value)
    }

    /// Parse a QueryId from its UUID string form
    pub fn from_string(s: &str) -> Result<Self, String> {
        uuid::Uuid::parse_str(s)
            .map(|u| Self(u.as_u128()))
            .map_err(|e| format!("Invalid UUIDv7 string: {}", e))
    }

    /// Get the raw u128 value
    pub fn value(&self) -> u128 {
        self.0
    }
}

impl Default for QueryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", uuid::Uuid::from_u128(self.0))
    }
}

impl From<QueryId> for String {
    fn from(id: QueryId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for QueryId {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_string(&s)
    }
}

/// Unique identifier for a sub-query
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct SubQueryId(u128);

impl SubQueryId {
    /// Generate a new UUIDv7-based SubQueryId
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7().as_u128())
    }

    /// Create a SubQueryId from a raw u128 value
    pub fn from_value(value: u128) -> Self {
        Self(value)
    }

    /// Parse a SubQueryId from its UUID string form
    pub fn from_string(s: &str) -> Result<Self, String> {
        uuid::Uuid::parse_str(s)
            .map(|u| Self(u.as_u128()))
            .map_err(|e| format!("Invalid UUIDv7 string: {}", e))
    }

    /// Get the raw u128 value
    pub fn value(&self) -> u128 {
        self.0
    }
}

impl Default for SubQueryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubQueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", uuid::Uuid::from_u128(self.0))
    }
}

impl From<SubQueryId> for String {
    fn from(id: SubQueryId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for SubQueryId {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_string(&s)
    }
}

/// Operating mode selected by the caller at run start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Single pass: one sub-query, primary web source only
    Fast,
    /// Decompose, retrieve, verify and iterate until sufficient
    #[default]
    Deep,
}

impl Mode {
    /// Lower-case name of the mode
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Fast => "fast",
            Mode::Deep => "deep",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fast" => Ok(Mode::Fast),
            "deep" => Ok(Mode::Deep),
            other => Err(format!("Unknown mode: {}", other)),
        }
    }
}

/// The user's question. Created at intake and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Correlation id for the whole run
    pub id: QueryId,

    /// Question text as the user wrote it
    pub text: String,

    /// Selected operating mode
    pub mode: Mode,
}

impl Query {
    /// Create a new query with a fresh correlation id
    pub fn new(text: impl Into<String>, mode: Mode) -> Self {
        Self {
            id: QueryId::new(),
            text: text.into(),
            mode,
        }
    }
}

/// One decomposed unit of the question, targeting specific source kinds
///
/// Sub-queries are immutable once created. Refining a sub-query creates
/// children that point back at it through `parent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubQuery {
    /// Unique identifier
    pub id: SubQueryId,

    /// Query this sub-query was derived from
    pub query_id: QueryId,

    /// Sub-query this one refines, if any
    pub parent: Option<SubQueryId>,

    /// Position within the decomposition that produced it
    pub ordinal: usize,

    /// Question text sent to the sources
    pub text: String,

    /// Source kinds this sub-query should be dispatched to
    pub sources: BTreeSet<SourceKind>,
}

impl SubQuery {
    /// Create a top-level sub-query for a query
    pub fn new(
        query_id: QueryId,
        ordinal: usize,
        text: impl Into<String>,
        sources: BTreeSet<SourceKind>,
    ) -> Self {
        Self {
            id: SubQueryId::new(),
            query_id,
            parent: None,
            ordinal,
            text: text.into(),
            sources,
        }
    }

    /// Mark this sub-query as a refinement of another
    pub fn with_parent(mut self, parent: SubQueryId) -> Self {
        self.parent = Some(parent);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_chronological() {
        let id1 = SubQueryId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let id2 = SubQueryId::new();
        assert!(id1 < id2);
    }

    #[test]
    fn test_id_display_and_parse() {
        let id = QueryId::new();
        let parsed = QueryId::from_string(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
        assert!(QueryId::from_string("not-a-uuid").is_err());
    }

    #[test]
    fn test_id_serializes_as_string() {
        let id = SubQueryId::from_value(42);
        let json = serde_json::to_string(&id).unwrap();
        assert!(json.starts_with('"'));
        let back: SubQueryId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("fast".parse::<Mode>().unwrap(), Mode::Fast);
        assert_eq!("DEEP".parse::<Mode>().unwrap(), Mode::Deep);
        assert!("medium".parse::<Mode>().is_err());
    }

    #[test]
    fn test_sub_query_with_parent() {
        let query = Query::new("What is X?", Mode::Deep);
        let parent = SubQuery::new(query.id, 0, "What is X?", BTreeSet::new());
        let child = SubQuery::new(query.id, 0, "Who defined X?", BTreeSet::new())
            .with_parent(parent.id);
        assert_eq!(child.parent, Some(parent.id));
        assert_eq!(child.query_id, query.id);
    }
}
