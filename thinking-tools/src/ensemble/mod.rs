//! Ensemble reasoning
//!
//! Several fixed "lenses" (analytical, skeptical, creative, pragmatic,
//! ethical) contribute thoughts to a shared session, endorse or challenge
//! each other's thoughts and propose integrations. The analyzer reports where
//! they converge, where they disagree and where reasoning runs in circles.
//!
//! # Layout
//!
//! - [`store`]: sessions, validation, rate limiting, event logging
//! - [`analysis`]: read-only consensus, tension, convergence and cycle views
//! - [`tools`]: the MCP tool bodies and name-based dispatch

pub mod analysis;
pub mod config;
pub mod error;
pub mod events;
pub mod rate_limit;
pub mod store;
pub mod tools;
pub mod types;

pub use config::{EnsembleConfig, Thresholds};
pub use error::{EnsembleError, EnsembleResult};
pub use store::{SessionStore, SharedSessionStore};
pub use tools::EnsembleTools;
pub use types::{AgentLens, EnsembleSession, IntegrationProposal, Thought};
