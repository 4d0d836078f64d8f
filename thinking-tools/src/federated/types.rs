//! Consultation data types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::config::ProviderKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One chat turn in OpenAI wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsultationRequest {
    pub provider: ProviderKind,
    pub model: String,
    pub query: String,
    pub system_prompt: Option<String>,
    pub temperature: Option<f32>,
    pub session_id: Option<String>,
    /// Full history for a session consultation; `None` for a single turn
    pub messages: Option<Vec<ChatMessage>>,
}

impl ConsultationRequest {
    pub fn new(provider: ProviderKind, model: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            query: query.into(),
            system_prompt: None,
            temperature: None,
            session_id: None,
            messages: None,
        }
    }

    /// The messages to send: the session history, or system prompt plus query.
    pub fn chat_messages(&self) -> Vec<ChatMessage> {
        if let Some(messages) = &self.messages {
            return messages.clone();
        }
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &self.system_prompt {
            messages.push(ChatMessage::system(system.clone()));
        }
        messages.push(ChatMessage::user(self.query.clone()));
        messages
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsultationResponse {
    pub provider: ProviderKind,
    pub model: String,
    pub response: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub provider: ProviderKind,
    pub description: Option<String>,
}
