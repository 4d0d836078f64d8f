//! Federated provider configuration

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use rmcp::schemars;
use serde::{Deserialize, Serialize};

use crate::config::{set_if, Env};

/// A supported model provider.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    schemars::JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Ollama,
    OpenAi,
    OpenRouter,
    Google,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::Ollama,
        ProviderKind::OpenAi,
        ProviderKind::OpenRouter,
        ProviderKind::Google,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "ollama",
            ProviderKind::OpenAi => "openai",
            ProviderKind::OpenRouter => "openrouter",
            ProviderKind::Google => "google",
        }
    }

    /// OpenAI-compatible endpoint used when none is configured.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "http://localhost:11434/v1",
            ProviderKind::OpenAi => "https://api.openai.com/v1",
            ProviderKind::OpenRouter => "https://openrouter.ai/api/v1",
            ProviderKind::Google => "https://generativelanguage.googleapis.com/v1beta/openai",
        }
    }

    fn env_prefix(&self) -> String {
        format!("MCP_{}", self.as_str().to_ascii_uppercase())
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderKind::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub enabled: bool,
    pub base_url: Option<String>,
    pub default_model: Option<String>,
    /// Only read from the environment; never written back out
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl ProviderConfig {
    /// Configured base URL or the provider's default, without a trailing `/`.
    pub fn resolved_base_url(&self, kind: ProviderKind) -> String {
        self.base_url
            .as_deref()
            .unwrap_or(kind.default_base_url())
            .trim_end_matches('/')
            .to_string()
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("enabled", &self.enabled)
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FederatedConfig {
    /// Append every consultation to `<log_dir>/consultations-YYYYMMDD.jsonl`
    pub logging_enabled: bool,
    pub log_dir: PathBuf,
    /// Per-conversation transcripts
    pub transcript_dir: PathBuf,
    pub request_timeout_secs: u64,
    pub default_temperature: f32,
    pub providers: BTreeMap<ProviderKind, ProviderConfig>,
}

impl Default for FederatedConfig {
    fn default() -> Self {
        let providers = ProviderKind::ALL
            .into_iter()
            .map(|kind| (kind, ProviderConfig::default()))
            .collect();
        Self {
            logging_enabled: false,
            log_dir: PathBuf::from("logs/federated"),
            transcript_dir: PathBuf::from("logs/federated/sessions"),
            request_timeout_secs: 120,
            default_temperature: 0.7,
            providers,
        }
    }
}

impl FederatedConfig {
    pub fn apply_env(&mut self, env: &Env) {
        set_if(&mut self.logging_enabled, env.flag("MCP_LOGGING_ENABLED"));
        set_if(&mut self.log_dir, env.path("MCP_FEDERATED_LOG_DIR"));
        set_if(
            &mut self.request_timeout_secs,
            env.parse("MCP_REQUEST_TIMEOUT_S"),
        );

        for kind in ProviderKind::ALL {
            let prefix = kind.env_prefix();
            let provider = self.providers.entry(kind).or_default();
            set_if(&mut provider.enabled, env.flag(&format!("{prefix}_ENABLED")));
            if let Some(url) = env.get(&format!("{prefix}_BASE_URL")) {
                provider.base_url = Some(url);
            }
            if let Some(model) = env.get(&format!("{prefix}_DEFAULT_MODEL")) {
                provider.default_model = Some(model);
            }
            if let Some(key) = env.get(&format!("{prefix}_API_KEY")) {
                provider.api_key = Some(key);
            }
        }
    }

    pub fn provider(&self, kind: ProviderKind) -> Option<&ProviderConfig> {
        self.providers.get(&kind)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_names_round_trip() {
        for kind in ProviderKind::ALL {
            assert_eq!(kind.as_str().parse::<ProviderKind>().unwrap(), kind);
            assert_eq!(
                serde_json::to_value(kind).unwrap(),
                serde_json::json!(kind.as_str())
            );
        }
        assert_eq!("anthropic".parse::<ProviderKind>().unwrap_err(), "anthropic");
    }

    #[test]
    fn test_env_overrides_per_provider() {
        let mut config = FederatedConfig::default();
        config.apply_env(&Env::from_pairs([
            ("MCP_LOGGING_ENABLED", "yes"),
            ("MCP_OLLAMA_ENABLED", "true"),
            ("MCP_OLLAMA_DEFAULT_MODEL", "llama3"),
            ("MCP_OPENROUTER_API_KEY", "sk-test"),
        ]));

        assert!(config.logging_enabled);
        let ollama = config.provider(ProviderKind::Ollama).unwrap();
        assert!(ollama.enabled);
        assert_eq!(ollama.default_model.as_deref(), Some("llama3"));
        assert_eq!(
            ollama.resolved_base_url(ProviderKind::Ollama),
            "http://localhost:11434/v1"
        );
        let openrouter = config.provider(ProviderKind::OpenRouter).unwrap();
        assert!(!openrouter.enabled);
        assert_eq!(openrouter.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_api_key_redacted_in_debug() {
        let config = ProviderConfig {
            api_key: Some("secret".to_string()),
            ..ProviderConfig::default()
        };
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_yaml_provider_section() {
        let yaml = "providers:\n  google:\n    enabled: true\n    base_url: http://proxy/v1/\n";
        let config: FederatedConfig = serde_yaml::from_str(yaml).unwrap();
        let google = config.provider(ProviderKind::Google).unwrap();
        assert!(google.enabled);
        assert_eq!(google.resolved_base_url(ProviderKind::Google), "http://proxy/v1");
    }
}
