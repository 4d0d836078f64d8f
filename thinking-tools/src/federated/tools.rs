//! Federated MCP tool bodies

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::join_all;
use rmcp::schemars;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{error, info, warn};

use super::config::ProviderKind;
use super::consult_log::ConsultationLog;
use super::conversations::ConversationStore;
use super::error::{FederatedError, FederatedResult};
use super::registry::ProviderRegistry;
use super::types::{ChatMessage, ConsultationRequest, ConsultationResponse, Role};
use crate::envelope::{parse_args, DispatchError, Envelope};

pub const TOOL_NAMES: [&str; 6] = [
    "consult_model",
    "consult_multiple_models",
    "create_session",
    "list_sessions",
    "list_models",
    "health_check",
];

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
pub struct ConsultRequest {
    #[schemars(description = "Provider to use: ollama, openai, openrouter or google")]
    pub provider: String,

    #[schemars(description = "The query or prompt to send to the model")]
    pub query: String,

    #[schemars(description = "Model name; optional if the provider has a default")]
    pub model: Option<String>,

    #[schemars(description = "Optional system prompt to set context")]
    pub system_prompt: Option<String>,

    #[schemars(description = "Sampling temperature (0.0 to 1.0)")]
    pub temperature: Option<f32>,

    #[schemars(description = "Session ID from create_session to continue a conversation")]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
pub struct ModelSpec {
    #[schemars(description = "Provider to use")]
    pub provider: String,

    #[schemars(description = "Model name; optional if the provider has a default")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
pub struct ConsultMultipleRequest {
    #[schemars(description = "Models to consult in parallel")]
    pub models: Vec<ModelSpec>,

    #[schemars(description = "The query to send to every model")]
    pub query: String,

    #[schemars(description = "Sampling temperature")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Default, Deserialize, schemars::JsonSchema)]
pub struct CreateSessionRequest {
    #[schemars(description = "Optional metadata stored with the session")]
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
pub struct ListModelsRequest {
    #[schemars(description = "Provider to list models for")]
    pub provider: String,
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ConsultResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub response: String,
    pub provider: ProviderKind,
    pub model: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// One entry of a `consult_multiple_models` result.
#[derive(Debug, Serialize)]
pub struct MultiConsultEntry {
    pub provider: String,
    pub model: Option<String>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProviderHealth {
    pub status: &'static str,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Tool Implementations
// ============================================================================

#[derive(Clone)]
pub struct FederatedTools {
    registry: Arc<ProviderRegistry>,
    conversations: Arc<Mutex<ConversationStore>>,
    log: Option<Arc<ConsultationLog>>,
}

impl FederatedTools {
    pub fn new(
        registry: ProviderRegistry,
        conversations: ConversationStore,
        log: Option<ConsultationLog>,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            conversations: Arc::new(Mutex::new(conversations)),
            log: log.map(Arc::new),
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub async fn consult_model(&self, req: ConsultRequest) -> Envelope {
        Envelope::from_result(self.consult(req).await)
    }

    async fn consult(&self, req: ConsultRequest) -> FederatedResult<ConsultResult> {
        let provider = parse_provider(&req.provider)?;
        let model = self.resolve_model(provider, req.model.as_deref())?;
        let client = self.registry.client(provider)?;

        let messages = match &req.session_id {
            Some(session_id) => {
                let mut conversations = self.conversations();
                if !conversations.append(session_id, Role::User, &req.query) {
                    return Err(FederatedError::SessionNotFound {
                        session_id: session_id.clone(),
                    });
                }
                let mut history = conversations
                    .get(session_id)
                    .map(|c| c.chat_messages())
                    .unwrap_or_default();
                if let Some(system) = &req.system_prompt {
                    history.insert(0, ChatMessage::system(system.clone()));
                }
                Some(history)
            }
            None => None,
        };

        let request = ConsultationRequest {
            provider,
            model: model.clone(),
            query: req.query,
            system_prompt: req.system_prompt,
            temperature: req.temperature,
            session_id: req.session_id,
            messages,
        };

        info!(
            provider = %provider,
            model = %model,
            session_id = request.session_id.as_deref().unwrap_or("-"),
            "Consulting model"
        );
        let response = client.consult(&request).await.map_err(|source| {
            error!(provider = %provider, model = %model, error = %source, "Consultation failed");
            FederatedError::ConsultationFailed {
                provider,
                model: model.clone(),
                source,
            }
        })?;

        self.record(&request, &response);
        if let Some(session_id) = &request.session_id {
            self.conversations()
                .append(session_id, Role::Assistant, &response.response);
        }

        Ok(ConsultResult {
            session_id: request.session_id,
            response: response.response,
            provider: response.provider,
            model: response.model,
            timestamp: response.timestamp,
        })
    }

    pub async fn consult_multiple_models(&self, req: ConsultMultipleRequest) -> Envelope {
        let query = req.query;
        let temperature = req.temperature;
        let calls = req.models.into_iter().map(|entry| {
            let query = query.clone();
            async move {
                let outcome = async {
                    let provider = parse_provider(&entry.provider)?;
                    let model = self.resolve_model(provider, entry.model.as_deref())?;
                    let client = self.registry.client(provider)?;
                    let mut request = ConsultationRequest::new(provider, model.clone(), query);
                    request.temperature = temperature;
                    let response = client.consult(&request).await.map_err(|source| {
                        FederatedError::ConsultationFailed {
                            provider,
                            model: model.clone(),
                            source,
                        }
                    })?;
                    self.record(&request, &response);
                    Ok::<_, FederatedError>((model, response.response))
                }
                .await;

                match outcome {
                    Ok((model, response)) => MultiConsultEntry {
                        provider: entry.provider,
                        model: Some(model),
                        success: true,
                        response: Some(response),
                        error: None,
                    },
                    Err(e) => {
                        warn!(provider = %entry.provider, error = %e, "Consultation failed");
                        MultiConsultEntry {
                            provider: entry.provider,
                            model: entry.model,
                            success: false,
                            response: None,
                            error: Some(e.to_string()),
                        }
                    }
                }
            }
        });
        let results = join_all(calls).await;
        Envelope::success(&json!({ "results": results }))
    }

    pub fn create_session(&self, req: CreateSessionRequest) -> Envelope {
        let mut conversations = self.conversations();
        let conversation = conversations.create(req.metadata.unwrap_or_default());
        info!(session_id = %conversation.id, "Conversation created");
        Envelope::success(&json!({
            "session_id": conversation.id,
            "created_at": conversation.created_at,
        }))
    }

    pub fn list_sessions(&self) -> Envelope {
        let sessions = self.conversations().list();
        Envelope::success(&json!({ "count": sessions.len(), "sessions": sessions }))
    }

    pub async fn list_models(&self, req: ListModelsRequest) -> Envelope {
        let result = async {
            let provider = parse_provider(&req.provider)?;
            let client = self.registry.client(provider)?;
            let models = client
                .list_models()
                .await
                .map_err(|source| FederatedError::ListModelsFailed { provider, source })?;
            Ok::<_, FederatedError>(json!({
                "provider": provider,
                "count": models.len(),
                "models": models,
            }))
        }
        .await;
        Envelope::from_result(result)
    }

    pub async fn health_check(&self) -> Envelope {
        let checks = ProviderKind::ALL.into_iter().map(|kind| async move {
            let health = match self.registry.client(kind) {
                Err(_) => ProviderHealth {
                    status: "disabled",
                    enabled: false,
                    error: None,
                },
                Ok(client) => match client.health_check().await {
                    Ok(()) => ProviderHealth {
                        status: "ok",
                        enabled: true,
                        error: None,
                    },
                    Err(super::error::ProviderError::Http(e)) => ProviderHealth {
                        status: "unreachable",
                        enabled: true,
                        error: Some(e.to_string()),
                    },
                    Err(e) => ProviderHealth {
                        status: "error",
                        enabled: true,
                        error: Some(e.to_string()),
                    },
                },
            };
            (kind, health)
        });
        let providers: BTreeMap<ProviderKind, ProviderHealth> =
            join_all(checks).await.into_iter().collect();
        Envelope::success(&json!({ "providers": providers }))
    }

    pub async fn dispatch(&self, name: &str, args: Value) -> Envelope {
        let result = match name {
            "consult_model" => match parse_args(name, args) {
                Ok(req) => Ok(self.consult_model(req).await),
                Err(e) => Err(e),
            },
            "consult_multiple_models" => match parse_args(name, args) {
                Ok(req) => Ok(self.consult_multiple_models(req).await),
                Err(e) => Err(e),
            },
            "create_session" => parse_args(name, args).map(|req| self.create_session(req)),
            "list_sessions" => Ok(self.list_sessions()),
            "list_models" => match parse_args(name, args) {
                Ok(req) => Ok(self.list_models(req).await),
                Err(e) => Err(e),
            },
            "health_check" => Ok(self.health_check().await),
            other => Err(DispatchError::unknown_tool(other)),
        };
        result.unwrap_or_else(|e| Envelope::failure(&e))
    }

    // ── Helpers ──

    fn resolve_model(&self, provider: ProviderKind, model: Option<&str>) -> FederatedResult<String> {
        model
            .filter(|m| !m.is_empty())
            .or_else(|| self.registry.default_model(provider))
            .map(str::to_string)
            .ok_or(FederatedError::NoModel { provider })
    }

    fn conversations(&self) -> MutexGuard<'_, ConversationStore> {
        // Messages are appended whole; a poisoned guard is still consistent.
        self.conversations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, request: &ConsultationRequest, response: &ConsultationResponse) {
        if let Some(log) = &self.log {
            if let Err(e) = log.record(request, response) {
                warn!(dir = %log.dir().display(), error = %e, "Failed to write consultation log");
            }
        }
    }
}

fn parse_provider(raw: &str) -> FederatedResult<ProviderKind> {
    raw.parse()
        .map_err(|provider| FederatedError::UnknownProvider { provider })
}

impl std::fmt::Debug for FederatedTools {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FederatedTools")
            .field("registry", &self.registry)
            .field("logging", &self.log.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::federated::client::ProviderClient;
    use crate::federated::error::ProviderError;
    use crate::federated::types::ModelInfo;
    use async_trait::async_trait;
    use chrono::Utc;

    /// Echoes the number of messages it was sent plus the last one.
    struct EchoProvider {
        kind: ProviderKind,
        fail: bool,
    }

    #[async_trait]
    impl ProviderClient for EchoProvider {
        fn kind(&self) -> ProviderKind {
            self.kind
        }

        async fn consult(
            &self,
            request: &ConsultationRequest,
        ) -> Result<ConsultationResponse, ProviderError> {
            if self.fail {
                return Err(ProviderError::EmptyResponse);
            }
            let messages = request.chat_messages();
            let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(ConsultationResponse {
                provider: self.kind,
                model: request.model.clone(),
                response: format!("{}:{}", messages.len(), last),
                timestamp: Utc::now(),
                metadata: Map::new(),
            })
        }

        async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
            Ok(vec![ModelInfo {
                id: "echo-1".to_string(),
                provider: self.kind,
                description: None,
            }])
        }

        async fn health_check(&self) -> Result<(), ProviderError> {
            if self.fail {
                Err(ProviderError::Api {
                    status: 500,
                    body: "down".to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    fn tools(log: Option<ConsultationLog>) -> FederatedTools {
        let mut registry = ProviderRegistry::empty();
        registry.register(
            Arc::new(EchoProvider {
                kind: ProviderKind::Ollama,
                fail: false,
            }),
            true,
            Some("llama3".to_string()),
        );
        registry.register(
            Arc::new(EchoProvider {
                kind: ProviderKind::OpenAi,
                fail: true,
            }),
            true,
            None,
        );
        FederatedTools::new(registry, ConversationStore::new(None), log)
    }

    #[tokio::test]
    async fn test_consult_uses_default_model() {
        let tools = tools(None);
        let env = tools
            .dispatch("consult_model", json!({"provider": "ollama", "query": "hi"}))
            .await;
        let result = env.result().unwrap();
        assert_eq!(result["model"], "llama3");
        assert_eq!(result["response"], "1:hi");
        assert!(result.get("session_id").is_none());
    }

    #[tokio::test]
    async fn test_consult_errors() {
        let tools = tools(None);
        let env = tools
            .dispatch("consult_model", json!({"provider": "anthropic", "query": "q"}))
            .await;
        assert_eq!(env.error_kind(), Some("unknown_provider"));

        let env = tools
            .dispatch("consult_model", json!({"provider": "google", "query": "q", "model": "g"}))
            .await;
        assert_eq!(env.error_kind(), Some("provider_disabled"));

        let env = tools
            .dispatch("consult_model", json!({"provider": "openai", "query": "q"}))
            .await;
        assert_eq!(env.error_kind(), Some("no_model"));

        let env = tools
            .dispatch("consult_model", json!({"provider": "openai", "query": "q", "model": "gpt"}))
            .await;
        assert_eq!(env.error_kind(), Some("consultation_failed"));
        assert_eq!(env.details().unwrap()["model"], "gpt");

        let env = tools
            .dispatch(
                "consult_model",
                json!({"provider": "ollama", "query": "q", "session_id": "nope"}),
            )
            .await;
        assert_eq!(env.error_kind(), Some("session_not_found"));
    }

    #[tokio::test]
    async fn test_session_history_accumulates() {
        let tools = tools(None);
        let env = tools.dispatch("create_session", json!({"metadata": {"topic": "x"}})).await;
        let session_id = env.result().unwrap()["session_id"].as_str().unwrap().to_string();

        let first = tools
            .dispatch(
                "consult_model",
                json!({"provider": "ollama", "query": "one", "session_id": session_id}),
            )
            .await;
        assert_eq!(first.result().unwrap()["response"], "1:one");

        // user, assistant, user + prepended system prompt
        let second = tools
            .dispatch(
                "consult_model",
                json!({
                    "provider": "ollama",
                    "query": "two",
                    "session_id": session_id,
                    "system_prompt": "be terse"
                }),
            )
            .await;
        assert_eq!(second.result().unwrap()["response"], "4:two");
        assert_eq!(second.result().unwrap()["session_id"], session_id.as_str());

        let env = tools.dispatch("list_sessions", Value::Null).await;
        let result = env.result().unwrap();
        assert_eq!(result["count"], 1);
        assert_eq!(result["sessions"][0]["message_count"], 4);
        assert_eq!(result["sessions"][0]["preview"], "4:two");
    }

    #[tokio::test]
    async fn test_consult_multiple_reports_each_entry() {
        let tools = tools(None);
        let env = tools
            .dispatch(
                "consult_multiple_models",
                json!({
                    "query": "q",
                    "models": [
                        {"provider": "ollama"},
                        {"provider": "openai", "model": "gpt"},
                        {"provider": "bogus"}
                    ]
                }),
            )
            .await;
        let results = env.result().unwrap()["results"].as_array().unwrap().clone();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0]["success"], true);
        assert_eq!(results[0]["model"], "llama3");
        assert_eq!(results[1]["success"], false);
        assert_eq!(results[2]["success"], false);
        assert!(results[2]["error"].as_str().unwrap().contains("bogus"));
    }

    #[tokio::test]
    async fn test_health_and_models() {
        let tools = tools(None);
        let env = tools.dispatch("health_check", json!({})).await;
        let providers = &env.result().unwrap()["providers"];
        assert_eq!(providers["ollama"]["status"], "ok");
        assert_eq!(providers["openai"]["status"], "error");
        assert_eq!(providers["google"]["status"], "disabled");
        assert_eq!(providers["google"]["enabled"], false);

        let env = tools.dispatch("list_models", json!({"provider": "ollama"})).await;
        assert_eq!(env.result().unwrap()["models"][0]["id"], "echo-1");
    }

    #[tokio::test]
    async fn test_consultations_logged() {
        let dir = tempfile::tempdir().unwrap();
        let tools = tools(Some(ConsultationLog::new(dir.path())));
        tools
            .dispatch("consult_model", json!({"provider": "ollama", "query": "hi"}))
            .await;
        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let tools = tools(None);
        let env = tools.dispatch("ask_oracle", json!({})).await;
        assert_eq!(env.error_kind(), Some("unknown_tool"));
    }
}
