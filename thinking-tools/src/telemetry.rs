//! Logging setup
//!
//! stdout carries the MCP protocol, so human-readable logs go to stderr.
//! Optionally a JSON-lines copy is written to `<dir>/<server>-<timestamp>.jsonl`.

use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{set_if, Env};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset
    pub filter: String,
    /// Write a JSON log file alongside stderr
    pub file_enabled: bool,
    /// Directory for log files and per-session event logs
    pub dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "thinking_tools=info".to_string(),
            file_enabled: false,
            dir: PathBuf::from("logs"),
        }
    }
}

impl LoggingConfig {
    pub fn apply_env(&mut self, env: &Env) {
        set_if(&mut self.filter, env.get("MCP_LOG_FILTER"));
        set_if(&mut self.file_enabled, env.flag("MCP_LOG_FILE"));
        set_if(&mut self.dir, env.path("MCP_LOG_DIR"));
    }
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the life of the process.
pub fn init(server: &str, config: &LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false);

    if !config.file_enabled {
        tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .try_init()?;
        return Ok(None);
    }

    std::fs::create_dir_all(&config.dir)?;
    let file_name = format!("{}-{}.jsonl", server, Utc::now().format("%Y%m%dT%H%M%S"));
    let appender = tracing_appender::rolling::never(&config.dir, &file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_ansi(false),
        )
        .try_init()?;

    tracing::debug!(
        log_file = %config.dir.join(&file_name).display(),
        "JSON file logging enabled"
    );
    Ok(Some(guard))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_env_overrides() {
        let mut config = LoggingConfig::default();
        let env = Env::from_pairs([
            ("MCP_LOG_FILE", "true"),
            ("MCP_LOG_DIR", "/var/log/thinking"),
            ("MCP_LOG_FILTER", "thinking_tools=debug"),
        ]);
        config.apply_env(&env);
        assert!(config.file_enabled);
        assert_eq!(config.dir, PathBuf::from("/var/log/thinking"));
        assert_eq!(config.filter, "thinking_tools=debug");
    }
}
