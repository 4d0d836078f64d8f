//! Lateral synthesis settings

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::{set_if, Env};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LateralConfig {
    /// Divergence strategy used when `start_session` names none
    pub divergence_method: String,
    pub divergence_count: usize,
    /// Write snapshots and completed sessions under `history_dir`
    pub persistence_enabled: bool,
    pub history_dir: PathBuf,
    pub max_origin_chars: usize,
    pub max_insight_chars: usize,
    /// Optional `concepts.json` word list for the random strategy
    pub concepts_path: Option<PathBuf>,
}

impl Default for LateralConfig {
    fn default() -> Self {
        Self {
            divergence_method: "random".to_string(),
            divergence_count: 5,
            persistence_enabled: true,
            history_dir: PathBuf::from("logs/lateral"),
            max_origin_chars: 1000,
            max_insight_chars: 2000,
            concepts_path: None,
        }
    }
}

impl LateralConfig {
    pub fn apply_env(&mut self, env: &Env) {
        set_if(&mut self.divergence_method, env.get("MCP_DIVERGENCE_METHOD"));
        set_if(&mut self.divergence_count, env.parse("MCP_DIVERGENCE_COUNT"));
        set_if(&mut self.persistence_enabled, env.flag("MCP_PERSISTENCE_ENABLED"));
        set_if(&mut self.history_dir, env.path("MCP_LATERAL_HISTORY_DIR"));
        if let Some(path) = env.path("MCP_CONCEPTS_PATH") {
            self.concepts_path = Some(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_overrides() {
        let env = Env::from_pairs([
            ("MCP_DIVERGENCE_METHOD", "random"),
            ("MCP_DIVERGENCE_COUNT", "8"),
            ("MCP_PERSISTENCE_ENABLED", "no"),
            ("MCP_CONCEPTS_PATH", "/tmp/concepts.json"),
        ]);
        let mut config = LateralConfig::default();
        config.apply_env(&env);
        assert_eq!(config.divergence_count, 8);
        assert!(!config.persistence_enabled);
        assert_eq!(config.concepts_path, Some(PathBuf::from("/tmp/concepts.json")));
        assert_eq!(config.max_insight_chars, 2000);
    }
}
