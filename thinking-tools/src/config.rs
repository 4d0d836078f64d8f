//! Layered configuration
//!
//! Resolution order, later layers winning:
//!
//! 1. compiled-in defaults (`Default` impls on each section)
//! 2. an optional YAML file (`--config` or `THINKING_TOOLS_CONFIG`)
//! 3. `MCP_*` environment variables
//! 4. command-line flags (applied by `main`)
//!
//! Every section lives next to the code it configures; this module only
//! stitches them together and provides the environment helpers.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::clock::ClockConfig;
use crate::ensemble::EnsembleConfig;
use crate::federated::FederatedConfig;
use crate::lateral::LateralConfig;
use crate::metrics::MetricsConfig;
use crate::telemetry::LoggingConfig;

/// Environment variable naming the YAML config file.
pub const CONFIG_PATH_ENV: &str = "THINKING_TOOLS_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Full configuration for every server in the crate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub ensemble: EnsembleConfig,
    pub metrics: MetricsConfig,
    pub federated: FederatedConfig,
    pub lateral: LateralConfig,
    pub clock: ClockConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Parse a YAML document. Missing sections and keys fall back to defaults.
    pub fn from_yaml_str(source: &str, path: &Path) -> Result<Self, ConfigError> {
        if source.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(source).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&source, path)
    }

    /// Defaults, then the YAML file (if any), then environment overrides.
    pub fn load(path: Option<&Path>, env: &Env) -> Result<Self, ConfigError> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| env.path(CONFIG_PATH_ENV));

        let mut config = match explicit {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(env);
        Ok(config)
    }

    pub fn apply_env(&mut self, env: &Env) {
        if let Some(root) = env.path("MCP_LOG_DIR") {
            self.relocate_logs(&root);
        }
        self.ensemble.apply_env(env);
        self.metrics.apply_env(env);
        self.federated.apply_env(env);
        self.lateral.apply_env(env);
        self.clock.apply_env(env);
        self.logging.apply_env(env);
    }

    /// Put every log, event log, transcript and history directory under `root`.
    pub fn relocate_logs(&mut self, root: &Path) {
        self.logging.dir = root.to_path_buf();
        self.ensemble.event_log_dir = root.join("ensemble");
        self.federated.log_dir = root.join("federated");
        self.federated.transcript_dir = root.join("federated").join("sessions");
        self.lateral.history_dir = root.join("lateral");
    }
}

type Lookup = dyn Fn(&str) -> Option<String> + Send + Sync;

/// Source of environment overrides.
///
/// Wraps a lookup function so tests can supply a fixed table instead of the
/// process environment.
pub struct Env {
    lookup: Box<Lookup>,
}

impl Env {
    /// Read from the process environment.
    pub fn process() -> Self {
        Self {
            lookup: Box::new(|key| std::env::var(key).ok()),
        }
    }

    /// A fixed table of variables.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let table: std::collections::HashMap<String, String> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            lookup: Box::new(move |key| table.get(key).cloned()),
        }
    }

    pub fn empty() -> Self {
        Self::from_pairs(Vec::<(String, String)>::new())
    }

    /// Raw value; empty strings count as unset.
    pub fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }

    /// Parse a value, logging and ignoring anything malformed.
    pub fn parse<T: FromStr>(&self, key: &str) -> Option<T> {
        let raw = self.get(key)?;
        match raw.trim().parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(key, value = %raw, "Ignoring unparsable environment override");
                None
            }
        }
    }

    pub fn flag(&self, key: &str) -> Option<bool> {
        let raw = self.get(key)?;
        let parsed = parse_bool(&raw);
        if parsed.is_none() {
            warn!(key, value = %raw, "Ignoring unparsable boolean override");
        }
        parsed
    }

    pub fn path(&self, key: &str) -> Option<PathBuf> {
        self.get(key).map(PathBuf::from)
    }
}

impl std::fmt::Debug for Env {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Env").finish_non_exhaustive()
    }
}

/// Accepts `1/true/yes/on` and `0/false/no/off`, case-insensitively.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Overwrite `target` when `value` is present.
pub(crate) fn set_if<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}
