//! Federated tools against a local OpenAI-compatible provider

use axum::{
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use thinking_tools::federated::{FederatedConfig, FederatedTools, ProviderConfig, ProviderKind};
use tokio::net::TcpListener;

async fn spawn_provider() -> String {
    let router = Router::new()
        .route(
            "/v1/chat/completions",
            post(|Json(body): Json<Value>| async move {
                let turns = body["messages"].as_array().map(|m| m.len()).unwrap_or(0);
                Json(json!({
                    "choices": [{
                        "message": {"content": format!("{} saw {} messages", body["model"].as_str().unwrap_or("?"), turns)},
                        "finish_reason": "stop"
                    }],
                    "usage": {"total_tokens": 12}
                }))
            }),
        )
        .route(
            "/v1/models",
            get(|| async { Json(json!({"data": [{"id": "llama3"}, {"id": "qwen"}]})) }),
        );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}/v1", addr)
}

fn config(base_url: String, log_dir: &std::path::Path) -> FederatedConfig {
    let mut config = FederatedConfig {
        logging_enabled: true,
        log_dir: log_dir.join("federated"),
        transcript_dir: log_dir.join("federated").join("sessions"),
        request_timeout_secs: 5,
        ..FederatedConfig::default()
    };
    config.providers.insert(
        ProviderKind::Ollama,
        ProviderConfig {
            enabled: true,
            base_url: Some(base_url),
            default_model: Some("llama3".to_string()),
            api_key: None,
        },
    );
    config
}

#[tokio::test]
async fn test_conversation_against_live_provider() {
    let base_url = spawn_provider().await;
    let logs = tempfile::tempdir().unwrap();
    let tools = FederatedTools::from_config(&config(base_url, logs.path())).unwrap();

    let session = tools.dispatch("create_session", json!({})).await;
    let session_id = session.result().unwrap()["session_id"].as_str().unwrap().to_string();

    let first = tools
        .dispatch(
            "consult_model",
            json!({"provider": "ollama", "query": "hello", "session_id": session_id}),
        )
        .await;
    assert_eq!(first.result().unwrap()["response"], "llama3 saw 1 messages");

    let second = tools
        .dispatch(
            "consult_model",
            json!({"provider": "ollama", "model": "qwen", "query": "again", "session_id": session_id}),
        )
        .await;
    assert_eq!(second.result().unwrap()["response"], "qwen saw 3 messages");

    let transcript = logs
        .path()
        .join("federated")
        .join("sessions")
        .join(format!("{}.jsonl", session_id));
    assert_eq!(std::fs::read_to_string(transcript).unwrap().lines().count(), 4);

    let consult_logs = std::fs::read_dir(logs.path().join("federated"))
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("consultations-"))
        .count();
    assert_eq!(consult_logs, 1);
}

#[tokio::test]
async fn test_models_health_and_fan_out() {
    let base_url = spawn_provider().await;
    let logs = tempfile::tempdir().unwrap();
    let tools = FederatedTools::from_config(&config(base_url, logs.path())).unwrap();

    let models = tools.dispatch("list_models", json!({"provider": "ollama"})).await;
    assert_eq!(models.result().unwrap()["count"], 2);

    let health = tools.dispatch("health_check", json!({})).await;
    let providers = &health.result().unwrap()["providers"];
    assert_eq!(providers["ollama"]["status"], "ok");
    assert_eq!(providers["openai"]["status"], "disabled");

    let fan_out = tools
        .dispatch(
            "consult_multiple_models",
            json!({
                "query": "q",
                "models": [
                    {"provider": "ollama", "model": "llama3"},
                    {"provider": "ollama", "model": "qwen"},
                    {"provider": "openrouter", "model": "x"}
                ]
            }),
        )
        .await;
    let results = fan_out.result().unwrap()["results"].as_array().unwrap().clone();
    assert_eq!(results[0]["response"], "llama3 saw 1 messages");
    assert_eq!(results[1]["response"], "qwen saw 1 messages");
    assert_eq!(results[2]["success"], false);
}
