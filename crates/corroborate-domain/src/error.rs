//! Error conditions reported by the ports

use thiserror::Error;

/// Errors a retrieval port may return
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetrievalError {
    /// The call did not finish within its timeout
    #[error("Timed out")]
    Timeout,

    /// The provider rejected the call because of rate limits
    #[error("Rate limited")]
    RateLimited,

    /// The provider is unreachable or failed
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// The provider cannot answer this query
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// The run was canceled while the call was in flight
    #[error("Canceled")]
    Canceled,
}

impl RetrievalError {
    /// Whether a retry at the port boundary may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, RetrievalError::Timeout | RetrievalError::RateLimited)
    }
}

/// Errors a reasoning port may return
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReasoningError {
    /// The model could not be reached or failed
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// The model answered with something that does not parse
    #[error("Malformed output: {0}")]
    MalformedOutput(String),

    /// The run was canceled while the call was in flight
    #[error("Canceled")]
    Canceled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(RetrievalError::Timeout.is_transient());
        assert!(RetrievalError::RateLimited.is_transient());
        assert!(!RetrievalError::Unavailable("down".into()).is_transient());
        assert!(!RetrievalError::InvalidQuery("empty".into()).is_transient());
        assert!(!RetrievalError::Canceled.is_transient());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            RetrievalError::Unavailable("503".into()).to_string(),
            "Unavailable: 503"
        );
        assert_eq!(ReasoningError::Canceled.to_string(), "Canceled");
    }
}
