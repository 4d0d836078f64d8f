//! Ensemble error taxonomy
//!
//! Each variant maps to one snake_case error kind in the tool envelope.
//! Every check runs before any mutation, so an error never leaves a
//! session half-updated.

use serde_json::{json, Value};
use thiserror::Error;

use crate::envelope::ToolFailure;

pub type EnsembleResult<T> = Result<T, EnsembleError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnsembleError {
    #[error("No active ensemble session")]
    NoActiveSession,

    #[error("Invalid agent lenses: {reason}")]
    InvalidAgentSet { reason: String, invalid: Vec<String> },

    #[error("Agent '{agent}' is not part of this session")]
    AgentNotInSession { agent: String },

    #[error("Agent '{agent}' exceeded {max_ops} operations per {window_secs}s")]
    RateLimited {
        agent: String,
        max_ops: usize,
        window_secs: u64,
    },

    #[error("Thought {thought_id} not found")]
    ThoughtNotFound { thought_id: i64 },

    #[error("{field} references unknown thought {thought_id}")]
    InvalidReference {
        field: &'static str,
        thought_id: i64,
    },

    #[error("Session has reached maximum thoughts ({max})")]
    SessionCapacityExceeded { max: usize },

    #[error("Agent '{agent}' has reached max thoughts ({max}) in this session")]
    AgentCapacityExceeded { agent: String, max: usize },

    #[error("Thought exceeds {max} characters")]
    ThoughtTooLong { max: usize },

    #[error("Note exceeds {max} characters")]
    NoteTooLong { max: usize },

    #[error("Integration exceeds {max} characters")]
    IntegrationTooLong { max: usize },

    #[error("Agent '{agent}' cannot endorse its own thought")]
    SelfEndorsementNotAllowed { agent: String },

    #[error("Thought {thought_id} already has the maximum of {max} endorsements")]
    MaxEndorsementsReached { thought_id: u64, max: usize },

    #[error("Reconciles exceeds {max} items")]
    TooManyReconciles { max: usize },

    #[error("reconciles must be a list of integer thought IDs")]
    InvalidReconcilesType { found: Value },

    #[error("Metrics collection is disabled")]
    MetricsDisabled,

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl EnsembleError {
    pub fn agent_not_in_session(agent: impl Into<String>) -> Self {
        Self::AgentNotInSession {
            agent: agent.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl ToolFailure for EnsembleError {
    fn kind(&self) -> &'static str {
        match self {
            Self::NoActiveSession => "no_active_session",
            Self::InvalidAgentSet { .. } => "invalid_agent_set",
            Self::AgentNotInSession { .. } => "agent_not_in_session",
            Self::RateLimited { .. } => "rate_limited",
            Self::ThoughtNotFound { .. } => "thought_not_found",
            Self::InvalidReference { .. } => "invalid_reference",
            Self::SessionCapacityExceeded { .. } => "session_capacity_exceeded",
            Self::AgentCapacityExceeded { .. } => "agent_capacity_exceeded",
            Self::ThoughtTooLong { .. } => "thought_too_long",
            Self::NoteTooLong { .. } => "note_too_long",
            Self::IntegrationTooLong { .. } => "integration_too_long",
            Self::SelfEndorsementNotAllowed { .. } => "self_endorsement_not_allowed",
            Self::MaxEndorsementsReached { .. } => "max_endorsements_reached",
            Self::TooManyReconciles { .. } => "too_many_reconciles",
            Self::InvalidReconcilesType { .. } => "invalid_reconciles_type",
            Self::MetricsDisabled => "metrics_disabled",
            Self::Internal { .. } => "internal_error",
        }
    }

    fn details(&self) -> Option<Value> {
        let details = match self {
            Self::InvalidAgentSet { invalid, .. } if !invalid.is_empty() => {
                json!({ "invalid": invalid })
            }
            Self::AgentNotInSession { agent }
            | Self::SelfEndorsementNotAllowed { agent } => json!({ "agentLens": agent }),
            Self::RateLimited {
                agent,
                max_ops,
                window_secs,
            } => json!({
                "agentLens": agent,
                "maxOps": max_ops,
                "windowSeconds": window_secs,
            }),
            Self::ThoughtNotFound { thought_id } => json!({ "thoughtId": thought_id }),
            Self::InvalidReference { field, thought_id } => {
                json!({ "field": field, "thoughtId": thought_id })
            }
            Self::SessionCapacityExceeded { max } => json!({ "maxThoughts": max }),
            Self::AgentCapacityExceeded { agent, max } => {
                json!({ "agentLens": agent, "maxThoughts": max })
            }
            Self::ThoughtTooLong { max }
            | Self::NoteTooLong { max }
            | Self::IntegrationTooLong { max } => json!({ "maxLength": max }),
            Self::MaxEndorsementsReached { thought_id, max } => {
                json!({ "thoughtId": thought_id, "maxEndorsements": max })
            }
            Self::TooManyReconciles { max } => json!({ "maxItems": max }),
            Self::InvalidReconcilesType { found } => json!({ "found": found }),
            _ => return None,
        };
        Some(details)
    }
}
