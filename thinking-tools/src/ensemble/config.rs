//! Ensemble session limits and analysis thresholds

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{set_if, Env};

/// Limits enforced by the session store plus analyzer thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    pub max_thoughts_per_session: usize,
    pub max_thoughts_per_agent: usize,
    pub max_endorsements_per_thought: usize,
    /// Character limit for a contributed thought
    pub max_thought_length: usize,
    /// Character limit for an endorsement/challenge note
    pub max_note_length: usize,
    /// Character limit for an integration proposal
    pub max_integration_length: usize,
    pub max_reconciles: usize,

    pub default_synthesis_threshold: f64,
    pub positive_endorsement_threshold: f64,
    pub negative_endorsement_threshold: f64,

    /// Operations allowed per agent per session inside the window
    pub rate_limit_ops: usize,
    pub rate_limit_window_secs: u64,

    /// Append per-session NDJSON event logs
    pub event_log_enabled: bool,
    pub event_log_dir: PathBuf,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            max_thoughts_per_session: 1000,
            max_thoughts_per_agent: 50,
            max_endorsements_per_thought: 100,
            max_thought_length: 4000,
            max_note_length: 1000,
            max_integration_length: 4000,
            max_reconciles: 50,
            default_synthesis_threshold: 0.6,
            positive_endorsement_threshold: 0.5,
            negative_endorsement_threshold: -0.5,
            rate_limit_ops: 5,
            rate_limit_window_secs: 60,
            event_log_enabled: true,
            event_log_dir: PathBuf::from("logs/ensemble"),
        }
    }
}

impl EnsembleConfig {
    pub fn apply_env(&mut self, env: &Env) {
        set_if(
            &mut self.max_thoughts_per_session,
            env.parse("MCP_MAX_THOUGHTS_PER_SESSION"),
        );
        set_if(
            &mut self.max_thoughts_per_agent,
            env.parse("MCP_MAX_THOUGHTS_PER_AGENT"),
        );
        set_if(
            &mut self.max_endorsements_per_thought,
            env.parse("MCP_MAX_ENDORSEMENTS_PER_THOUGHT"),
        );
        set_if(&mut self.max_thought_length, env.parse("MCP_MAX_THOUGHT_LENGTH"));
        set_if(&mut self.max_note_length, env.parse("MCP_MAX_NOTE_LENGTH"));
        set_if(
            &mut self.max_integration_length,
            env.parse("MCP_MAX_INTEGRATION_LENGTH"),
        );
        set_if(&mut self.max_reconciles, env.parse("MCP_MAX_RECONCILES"));
        set_if(
            &mut self.default_synthesis_threshold,
            env.parse("MCP_DEFAULT_SYNTHESIS_THRESHOLD"),
        );
        set_if(
            &mut self.positive_endorsement_threshold,
            env.parse("MCP_POS_ENDORSE_THRESHOLD"),
        );
        set_if(
            &mut self.negative_endorsement_threshold,
            env.parse("MCP_NEG_ENDORSE_THRESHOLD"),
        );
        set_if(&mut self.rate_limit_ops, env.parse("MCP_RATE_LIMIT_OPS"));
        set_if(
            &mut self.rate_limit_window_secs,
            env.parse("MCP_RATE_LIMIT_WINDOW_S"),
        );
        set_if(&mut self.event_log_enabled, env.flag("MCP_EVENT_LOG"));
        set_if(&mut self.event_log_dir, env.path("MCP_EVENT_LOG_DIR"));
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            positive: self.positive_endorsement_threshold,
            negative: self.negative_endorsement_threshold,
        }
    }
}

/// Endorsement cut-offs used by the convergence analyzer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Values at or above count as support
    pub positive: f64,
    /// Values at or below count as challenge
    pub negative: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        EnsembleConfig::default().thresholds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_names() {
        let mut config = EnsembleConfig::default();
        config.apply_env(&Env::from_pairs([
            ("MCP_MAX_THOUGHTS_PER_SESSION", "10"),
            ("MCP_MAX_THOUGHTS_PER_AGENT", "4"),
            ("MCP_MAX_ENDORSEMENTS_PER_THOUGHT", "2"),
            ("MCP_DEFAULT_SYNTHESIS_THRESHOLD", "0.75"),
            ("MCP_POS_ENDORSE_THRESHOLD", "0.4"),
            ("MCP_NEG_ENDORSE_THRESHOLD", "-0.4"),
            ("MCP_RATE_LIMIT_WINDOW_S", "5"),
            ("MCP_EVENT_LOG", "0"),
        ]));
        assert_eq!(config.max_thoughts_per_session, 10);
        assert_eq!(config.max_thoughts_per_agent, 4);
        assert_eq!(config.max_endorsements_per_thought, 2);
        assert_eq!(config.default_synthesis_threshold, 0.75);
        assert_eq!(
            config.thresholds(),
            Thresholds {
                positive: 0.4,
                negative: -0.4
            }
        );
        assert_eq!(config.rate_limit_window(), Duration::from_secs(5));
        assert!(!config.event_log_enabled);
    }
}
