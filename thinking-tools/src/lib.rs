//! Thinking Tools
//!
//! MCP stdio servers that give an assistant structured ways to think:
//!
//! ## Ensemble reasoning
//! - `start_collaborative_reasoning`: open a session with 2+ agent lenses
//! - `contribute_perspective`, `endorse_or_challenge`, `propose_integration`
//! - `synthesize_convergence`, `get_convergence_map`: consensus, tensions, cycles
//! - `get_active_session`, `get_metrics`, `get_rate_status`, `reset_agent_rate`
//!
//! ## Federated intelligence
//! - `consult_model`, `consult_multiple_models`: ask external models
//! - `create_session`, `list_sessions`: multi-turn conversations
//! - `list_models`, `health_check`
//!
//! ## Lateral synthesis
//! - `start_session` → `generate_divergence` → `record_synthesis` → `reflect_on_session`
//! - `get_session`, `list_sessions`
//!
//! ## Clock
//! - `get_current_time`, with the time embedded in the tool description
//!
//! # Usage
//!
//! ```bash
//! thinking-tools ensemble
//! thinking-tools --config thinking.yaml federated
//! MCP_DIVERGENCE_COUNT=8 thinking-tools lateral
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod clock;
pub mod config;
pub mod ensemble;
pub mod envelope;
pub mod federated;
pub mod lateral;
pub mod metrics;
pub mod server;
pub mod task;
pub mod telemetry;

pub use config::{AppConfig, ConfigError, Env};
pub use envelope::{Envelope, ToolFailure};

pub use ensemble::{EnsembleConfig, EnsembleError, EnsembleTools, SessionStore};
pub use federated::{FederatedConfig, FederatedError, FederatedTools, ProviderClient, ProviderKind};
pub use lateral::{LateralConfig, LateralError, LateralTools};
pub use metrics::{Metrics, MetricsConfig, MetricsSidecar};
