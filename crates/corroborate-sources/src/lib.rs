//! Corroborate Source Adapters
//!
//! Implementations of the `RetrievalPort` trait from `corroborate-domain`
//! and the registry the engine dispatches through.
//!
//! # Ports
//!
//! - `CorpusSource`: answers from a local JSON corpus
//! - `StaticSource`: scripted responses, failures and latency for tests
//! - `Retrying`: wraps any port with backoff on transient errors
//!
//! # Examples
//!
//! ```
//! use corroborate_sources::{SourceRegistry, StaticSource, Retrying};
//! use corroborate_domain::SourceKind;
//!
//! let registry = SourceRegistry::new()
//!     .with_port(Retrying::new(StaticSource::new(SourceKind::Web)))
//!     .with_port(StaticSource::new(SourceKind::Academic));
//! assert_eq!(registry.len(), 2);
//! ```

#![warn(missing_docs)]

pub mod corpus;
pub mod error;
pub mod registry;
pub mod retry;
pub mod static_source;

pub use corpus::{Corpus, CorpusEntry, CorpusSource};
pub use error::SourceError;
pub use registry::SourceRegistry;
pub use retry::{RetryPolicy, Retrying};
pub use static_source::StaticSource;
