//! Corroborate Domain Layer
//!
//! Core model for the multi-source question answering engine. It defines
//! the value objects every other crate exchanges, the confidence scoring
//! function, and the port traits through which the engine talks to sources
//! and to the language model.
//!
//! ## Key Concepts
//!
//! - **Query / SubQuery**: the user's question and its decomposed hops
//! - **SourceKind**: category of evidence provider (web, social, academic, ...)
//! - **RetrievedItem**: one unit of evidence from a real retrieval call
//! - **Claim / VerifiedClaim**: atomic assertions and their confidence
//! - **Ports**: `RetrievalPort` and `ReasoningPort`
//!
//! ## Architecture
//!
//! - Pure data and pure functions only
//! - Infrastructure implementations live in other crates
//! - Trait definitions for all external interactions

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod claim;
pub mod confidence_computation;
pub mod error;
pub mod query;
pub mod source;
pub mod traits;

// Re-exports for convenience
pub use claim::{Claim, ClaimKey, Polarity, SupportRef, VerifiedClaim};
pub use confidence_computation::{compute_confidence, score_claim, ConfidenceScore, ScoringConfig};
pub use error::{ReasoningError, RetrievalError};
pub use query::{Mode, Query, QueryId, SubQuery, SubQueryId};
pub use source::{RetrievedItem, SourceDocument, SourceKind};
pub use traits::{PromptKind, ReasoningPort, ReasoningRequest, RetrievalPort};
pub use tokio_util::sync::CancellationToken;
