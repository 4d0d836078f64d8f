//! Federated intelligence
//!
//! Consults external model providers (Ollama, OpenAI, OpenRouter, Google)
//! through their OpenAI-compatible APIs, optionally inside multi-turn
//! conversations held in memory.

pub mod client;
pub mod config;
pub mod consult_log;
pub mod conversations;
pub mod error;
pub mod registry;
pub mod tools;
pub mod types;

pub use client::{OpenAiCompatClient, ProviderClient};
pub use config::{FederatedConfig, ProviderConfig, ProviderKind};
pub use consult_log::ConsultationLog;
pub use conversations::ConversationStore;
pub use error::{FederatedError, FederatedResult, ProviderError};
pub use registry::ProviderRegistry;
pub use tools::FederatedTools;
pub use types::{ChatMessage, ConsultationRequest, ConsultationResponse, ModelInfo, Role};

impl FederatedTools {
    /// Registry, conversation store and (when enabled) consultation log
    /// built from `config`.
    pub fn from_config(config: &FederatedConfig) -> Result<Self, reqwest::Error> {
        let registry = ProviderRegistry::from_config(config)?;
        let (conversations, log) = if config.logging_enabled {
            (
                ConversationStore::new(Some(config.transcript_dir.clone())),
                Some(ConsultationLog::new(config.log_dir.clone())),
            )
        } else {
            (ConversationStore::new(None), None)
        };
        Ok(Self::new(registry, conversations, log))
    }
}
