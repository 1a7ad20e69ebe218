//! Corroborate Engine
//!
//! Multi-step reasoning orchestrator: answers a question by decomposing it,
//! retrieving evidence from several unreliable sources in parallel,
//! cross-checking claims between sources, and looping until the evidence is
//! sufficient or a budget runs out.
//!
//! # Architecture
//!
//! ```text
//! Query → Decomposer → SubQueries → Dispatcher → RetrievedItems
//!       → Verification Engine → VerifiedClaims → Loop Controller
//!       → { DECOMPOSE | RETRIEVE | SYNTHESIZE | FAILED }
//! ```
//!
//! The [`Orchestrator`] owns the only mutable value of a run, [`RunState`].
//! Components read it and answer with [`RunMutation`]s; only the
//! orchestrator applies them.
//!
//! # Error handling
//!
//! Source failures, decomposition failures and extraction failures degrade
//! the run and are recorded as [`RunWarning`]s. Budget exhaustion ends the
//! run as `FAILED` with a partial [`RunResult`]. Only an invalid
//! configuration or a broken state invariant is returned as an
//! [`EngineError`].

#![warn(missing_docs)]

mod calls;
pub mod config;
pub mod controller;
pub mod decomposer;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod parser;
pub mod prompt;
pub mod result;
pub mod state;
pub mod verifier;

pub use config::{EngineConfig, RoutingTable, TrustTable};
pub use controller::{Decision, LoopController, Phase};
pub use decomposer::TaskDecomposer;
pub use dispatcher::{DispatchOutcome, RetrievalDispatcher};
pub use error::{ConfigError, DecompositionError, EngineError};
pub use events::RunEvent;
pub use orchestrator::Orchestrator;
pub use result::{Outcome, RunResult, StopReason};
pub use state::{
    RunMutation, RunState, RunWarning, SourceFailure, SourceWarning, SubQueryState, SubQueryStatus,
};
pub use verifier::{VerificationEngine, VerifierSettings, VerifyOutcome};
