//! Provider clients
//!
//! Every provider is reached through its OpenAI-compatible chat completions
//! API, so a single HTTP client implementation serves all of them.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::config::{ProviderConfig, ProviderKind};
use super::error::ProviderError;
use super::types::{ChatMessage, ConsultationRequest, ConsultationResponse, ModelInfo};

/// A model provider the federated server can consult.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn consult(&self, request: &ConsultationRequest)
        -> Result<ConsultationResponse, ProviderError>;

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError>;

    /// `Ok` when the provider answered with a success status.
    async fn health_check(&self) -> Result<(), ProviderError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Value>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    reasoning_content: Option<String>,
}

#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
    #[serde(default)]
    owned_by: Option<String>,
}

/// Client for any OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    kind: ProviderKind,
    base_url: String,
    api_key: Option<String>,
    default_temperature: f32,
    http: reqwest::Client,
}

impl OpenAiCompatClient {
    pub fn new(
        kind: ProviderKind,
        config: &ProviderConfig,
        timeout: Duration,
        default_temperature: f32,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            kind,
            base_url: config.resolved_base_url(kind),
            api_key: config.api_key.clone(),
            default_temperature,
            http: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(ProviderError::Api { status, body })
    }
}

#[async_trait]
impl ProviderClient for OpenAiCompatClient {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn consult(
        &self,
        request: &ConsultationRequest,
    ) -> Result<ConsultationResponse, ProviderError> {
        let body = ChatRequest {
            model: &request.model,
            messages: request.chat_messages(),
            temperature: request.temperature.unwrap_or(self.default_temperature),
        };
        debug!(provider = %self.kind, model = %request.model, "POST chat/completions");

        let response = self
            .authorized(self.http.post(format!("{}/chat/completions", self.base_url)))
            .json(&body)
            .send()
            .await?;
        let chat: ChatResponse = Self::check_status(response).await?.json().await?;

        let choice = chat.choices.into_iter().next().ok_or(ProviderError::EmptyResponse)?;
        let content = match (choice.message.reasoning_content, choice.message.content) {
            (Some(reasoning), Some(answer)) => {
                format!("<reasoning>\n{}\n</reasoning>\n\n{}", reasoning, answer)
            }
            (Some(reasoning), None) => reasoning,
            (None, answer) => answer.unwrap_or_default(),
        };

        let mut metadata = Map::new();
        if let Some(reason) = choice.finish_reason {
            metadata.insert("finish_reason".to_string(), json!(reason));
        }
        if let Some(usage) = chat.usage {
            metadata.insert("usage".to_string(), usage);
        }

        Ok(ConsultationResponse {
            provider: self.kind,
            model: request.model.clone(),
            response: content,
            timestamp: Utc::now(),
            metadata,
        })
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        let response = self
            .authorized(self.http.get(format!("{}/models", self.base_url)))
            .send()
            .await?;
        let list: ModelList = Self::check_status(response).await?.json().await?;
        Ok(list
            .data
            .into_iter()
            .map(|m| ModelInfo {
                id: m.id.trim_start_matches("models/").to_string(),
                provider: self.kind,
                description: m.owned_by.map(|owner| format!("Owner: {}", owner)),
            })
            .collect())
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        let response = self
            .authorized(self.http.get(format!("{}/models", self.base_url)))
            .send()
            .await
            .inspect_err(|e| warn!(provider = %self.kind, error = %e, "health check request failed"))?;
        Self::check_status(response).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, routing::post, Json, Router};
    use tokio::net::TcpListener;

    async fn spawn_provider(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/v1", addr)
    }

    fn client(base_url: String) -> OpenAiCompatClient {
        let config = ProviderConfig {
            enabled: true,
            base_url: Some(base_url),
            default_model: None,
            api_key: Some("sk-test".to_string()),
        };
        OpenAiCompatClient::new(ProviderKind::OpenAi, &config, Duration::from_secs(5), 0.7)
            .unwrap()
    }

    #[tokio::test]
    async fn test_consult_parses_reasoning_and_metadata() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["messages"][0]["role"], "user");
                Json(json!({
                    "choices": [{
                        "message": {"content": "42", "reasoning_content": "think"},
                        "finish_reason": "stop"
                    }]
                }))
            }),
        );
        let client = client(spawn_provider(router).await);
        let response = client
            .consult(&ConsultationRequest::new(ProviderKind::OpenAi, "gpt", "answer?"))
            .await
            .unwrap();
        assert_eq!(response.response, "<reasoning>\nthink\n</reasoning>\n\n42");
        assert_eq!(response.metadata["finish_reason"], "stop");
        assert_eq!(response.provider, ProviderKind::OpenAi);
    }

    #[tokio::test]
    async fn test_api_error_and_models() {
        let router = Router::new()
            .route(
                "/v1/chat/completions",
                post(|| async { (axum::http::StatusCode::SERVICE_UNAVAILABLE, "busy") }),
            )
            .route(
                "/v1/models",
                get(|| async {
                    Json(json!({"data": [{"id": "models/gemini-pro", "owned_by": "google"}]}))
                }),
            );
        let client = client(spawn_provider(router).await);

        let err = client
            .consult(&ConsultationRequest::new(ProviderKind::OpenAi, "gpt", "q"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Api { status: 503, .. }));

        let models = client.list_models().await.unwrap();
        assert_eq!(models[0].id, "gemini-pro");
        assert_eq!(models[0].description.as_deref(), Some("Owner: google"));
        assert!(client.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_health_check() {
        let client = client("http://127.0.0.1:9/v1".to_string());
        assert!(matches!(
            client.health_check().await,
            Err(ProviderError::Http(_))
        ));
    }
}
