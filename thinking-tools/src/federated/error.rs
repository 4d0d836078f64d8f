//! Federated server errors

use serde_json::{json, Value};
use thiserror::Error;

use super::config::ProviderKind;
use crate::envelope::ToolFailure;

pub type FederatedResult<T> = Result<T, FederatedError>;

/// Transport-level failure talking to a provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Empty response from provider")]
    EmptyResponse,
}

#[derive(Debug, Error)]
pub enum FederatedError {
    #[error("Unknown provider: {provider}")]
    UnknownProvider { provider: String },

    #[error("Provider {provider} is disabled")]
    ProviderDisabled { provider: ProviderKind },

    #[error("No model specified and no default configured for {provider}")]
    NoModel { provider: ProviderKind },

    #[error("Session {session_id} not found. Use 'create_session' to start a new session.")]
    SessionNotFound { session_id: String },

    #[error("Consultation failed: {source}")]
    ConsultationFailed {
        provider: ProviderKind,
        model: String,
        #[source]
        source: ProviderError,
    },

    #[error("Failed to list models: {source}")]
    ListModelsFailed {
        provider: ProviderKind,
        #[source]
        source: ProviderError,
    },
}

impl ToolFailure for FederatedError {
    fn kind(&self) -> &'static str {
        match self {
            Self::UnknownProvider { .. } => "unknown_provider",
            Self::ProviderDisabled { .. } => "provider_disabled",
            Self::NoModel { .. } => "no_model",
            Self::SessionNotFound { .. } => "session_not_found",
            Self::ConsultationFailed { .. } => "consultation_failed",
            Self::ListModelsFailed { .. } => "list_models_failed",
        }
    }

    fn details(&self) -> Option<Value> {
        Some(match self {
            Self::UnknownProvider { provider } => json!({ "provider": provider }),
            Self::ProviderDisabled { provider }
            | Self::NoModel { provider }
            | Self::ListModelsFailed { provider, .. } => json!({ "provider": provider }),
            Self::SessionNotFound { session_id } => json!({ "session_id": session_id }),
            Self::ConsultationFailed {
                provider, model, ..
            } => json!({ "provider": provider, "model": model }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Envelope;

    #[test]
    fn test_consultation_failure_envelope() {
        let err = FederatedError::ConsultationFailed {
            provider: ProviderKind::Ollama,
            model: "llama3".to_string(),
            source: ProviderError::Api {
                status: 503,
                body: "overloaded".to_string(),
            },
        };
        let env = Envelope::failure(&err);
        assert_eq!(env.error_kind(), Some("consultation_failed"));
        assert_eq!(env.details().unwrap()["provider"], "ollama");
        let text = env.to_json();
        assert!(text.contains("503"));
    }
}
