//! In-memory runtime metrics and their exporters
//!
//! [`Metrics`] keeps monotonic counters and a capped ring of latency samples
//! per operation. The [`MetricsSidecar`] owns the optional exporters:
//!
//! - a JSON snapshot file rewritten atomically on an interval ([`export`])
//! - a Prometheus text endpoint served with axum ([`prometheus`])

pub mod export;
pub mod prometheus;

use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{set_if, Env};
use crate::task::BackgroundTask;

/// Latency samples kept per operation
pub const MAX_LATENCY_SAMPLES: usize = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub export_enabled: bool,
    pub export_path: PathBuf,
    pub export_interval_secs: u64,
    pub prometheus_enabled: bool,
    pub prometheus_addr: String,
    pub prometheus_port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            export_enabled: false,
            export_path: std::env::temp_dir().join("mcp_metrics.json"),
            export_interval_secs: 30,
            prometheus_enabled: false,
            prometheus_addr: "127.0.0.1".to_string(),
            prometheus_port: 8000,
        }
    }
}

impl MetricsConfig {
    pub fn apply_env(&mut self, env: &Env) {
        set_if(&mut self.enabled, env.flag("MCP_ENABLE_METRICS"));
        set_if(&mut self.export_enabled, env.flag("MCP_METRICS_EXPORT"));
        set_if(&mut self.export_path, env.path("MCP_METRICS_EXPORT_PATH"));
        set_if(
            &mut self.export_interval_secs,
            env.parse("MCP_METRICS_EXPORT_INTERVAL"),
        );
        set_if(&mut self.prometheus_enabled, env.flag("MCP_PROMETHEUS"));
        set_if(&mut self.prometheus_addr, env.get("MCP_PROMETHEUS_ADDR"));
        set_if(&mut self.prometheus_port, env.parse("MCP_PROMETHEUS_PORT"));
    }

    /// Export interval, never shorter than one second.
    pub fn export_interval(&self) -> Duration {
        Duration::from_secs(self.export_interval_secs.max(1))
    }

    pub fn prometheus_bind_addr(&self) -> String {
        format!("{}:{}", self.prometheus_addr, self.prometheus_port)
    }
}

/// Point-in-time copy of all metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub counters: BTreeMap<String, u64>,
    /// Seconds, oldest first
    pub latencies: BTreeMap<String, Vec<f64>>,
}

impl MetricsSnapshot {
    /// Mean latency per operation; `None` for operations without samples.
    pub fn average_latencies(&self) -> BTreeMap<String, Option<f64>> {
        self.latencies
            .iter()
            .map(|(op, samples)| {
                let avg = (!samples.is_empty())
                    .then(|| samples.iter().sum::<f64>() / samples.len() as f64);
                (op.clone(), avg)
            })
            .collect()
    }
}

#[derive(Debug, Default)]
struct Registry {
    counters: BTreeMap<String, u64>,
    latencies: BTreeMap<String, VecDeque<f64>>,
}

pub type SharedMetrics = Arc<Metrics>;

/// Thread-safe counters and latency samples.
///
/// When disabled every recording call is a no-op.
#[derive(Debug)]
pub struct Metrics {
    enabled: bool,
    registry: Mutex<Registry>,
}

impl Metrics {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            registry: Mutex::new(Registry::default()),
        }
    }

    pub fn shared(self) -> SharedMetrics {
        Arc::new(self)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn inc_counter(&self, name: &str, delta: u64) {
        if !self.enabled {
            return;
        }
        let mut registry = self.lock();
        let value = registry.counters.entry(name.to_string()).or_insert(0);
        *value += delta;
        debug!(counter = name, value = *value, "counter incremented");
    }

    pub fn record_latency(&self, op: &str, seconds: f64) {
        if !self.enabled {
            return;
        }
        let mut registry = self.lock();
        let samples = registry.latencies.entry(op.to_string()).or_default();
        samples.push_back(seconds);
        while samples.len() > MAX_LATENCY_SAMPLES {
            samples.pop_front();
        }
    }

    /// Run `f` and record how long it took under `op`.
    pub fn time<T>(&self, op: &str, f: impl FnOnce() -> T) -> T {
        let started = Instant::now();
        let out = f();
        self.record_latency(op, started.elapsed().as_secs_f64());
        out
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let registry = self.lock();
        MetricsSnapshot {
            counters: registry.counters.clone(),
            latencies: registry
                .latencies
                .iter()
                .map(|(op, samples)| (op.clone(), samples.iter().copied().collect()))
                .collect(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Owns the metric exporters for one server process.
#[derive(Debug)]
pub struct MetricsSidecar {
    metrics: SharedMetrics,
    config: MetricsConfig,
    exporter: BackgroundTask,
    prometheus: BackgroundTask,
}

impl MetricsSidecar {
    pub fn new(metrics: SharedMetrics, config: MetricsConfig) -> Self {
        Self {
            metrics,
            config,
            exporter: BackgroundTask::new("metrics-export"),
            prometheus: BackgroundTask::new("prometheus"),
        }
    }

    pub fn metrics(&self) -> &SharedMetrics {
        &self.metrics
    }

    /// Start whichever exporters are enabled. Safe to call repeatedly.
    ///
    /// A Prometheus bind failure is returned; the JSON exporter is started
    /// regardless.
    pub async fn start(&self) -> std::io::Result<()> {
        if self.config.export_enabled {
            let metrics = self.metrics.clone();
            let path = self.config.export_path.clone();
            let interval = self.config.export_interval();
            if self
                .exporter
                .start(move |token| export::run(metrics, path, interval, token))
            {
                info!(
                    path = %self.config.export_path.display(),
                    interval_secs = interval.as_secs(),
                    "Metrics exporter started"
                );
            }
        }

        if self.config.prometheus_enabled && !self.prometheus.is_running() {
            let addr = self.config.prometheus_bind_addr();
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            let metrics = self.metrics.clone();
            self.prometheus.start(move |token| async move {
                if let Err(e) = prometheus::serve(metrics, listener, token).await {
                    warn!(error = %e, "Prometheus endpoint stopped with an error");
                }
            });
            info!(%addr, "Prometheus endpoint listening on /metrics");
        }
        Ok(())
    }

    pub fn exporter_running(&self) -> bool {
        self.exporter.is_running()
    }

    pub fn prometheus_running(&self) -> bool {
        self.prometheus.is_running()
    }

    /// Stop both exporters, waiting at most `timeout` for each.
    pub async fn shutdown(&self, timeout: Duration) {
        self.exporter.stop(timeout).await;
        self.prometheus.stop(timeout).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = Metrics::new(true);
        metrics.inc_counter("agent_ops", 1);
        metrics.inc_counter("agent_ops", 2);
        assert_eq!(metrics.snapshot().counters["agent_ops"], 3);
    }

    #[test]
    fn test_latency_samples_capped() {
        let metrics = Metrics::new(true);
        for i in 0..(MAX_LATENCY_SAMPLES + 10) {
            metrics.record_latency("contribute", i as f64);
        }
        let snapshot = metrics.snapshot();
        let samples = &snapshot.latencies["contribute"];
        assert_eq!(samples.len(), MAX_LATENCY_SAMPLES);
        // Oldest samples were dropped
        assert_eq!(samples[0], 10.0);
    }

    #[test]
    fn test_disabled_is_noop() {
        let metrics = Metrics::new(false);
        metrics.inc_counter("agent_ops", 1);
        metrics.record_latency("contribute", 0.1);
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_average_latencies() {
        let metrics = Metrics::new(true);
        metrics.record_latency("synthesize", 0.2);
        metrics.record_latency("synthesize", 0.4);
        let avg = metrics.snapshot().average_latencies();
        assert!((avg["synthesize"].unwrap() - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_time_records_sample() {
        let metrics = Metrics::new(true);
        let value = metrics.time("op", || 42);
        assert_eq!(value, 42);
        assert_eq!(metrics.snapshot().latencies["op"].len(), 1);
    }

    #[test]
    fn test_config_env_and_interval_floor() {
        let mut config = MetricsConfig::default();
        config.apply_env(&Env::from_pairs([
            ("MCP_ENABLE_METRICS", "false"),
            ("MCP_METRICS_EXPORT", "1"),
            ("MCP_METRICS_EXPORT_INTERVAL", "0"),
            ("MCP_PROMETHEUS_PORT", "9200"),
        ]));
        assert!(!config.enabled);
        assert!(config.export_enabled);
        assert_eq!(config.export_interval(), Duration::from_secs(1));
        assert_eq!(config.prometheus_bind_addr(), "127.0.0.1:9200");
    }

    #[tokio::test]
    async fn test_sidecar_start_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let config = MetricsConfig {
            export_enabled: true,
            export_path: dir.path().join("metrics.json"),
            prometheus_enabled: true,
            prometheus_port: 0,
            ..MetricsConfig::default()
        };
        let sidecar = MetricsSidecar::new(Metrics::new(true).shared(), config);
        sidecar.start().await.unwrap();
        sidecar.start().await.unwrap();
        assert!(sidecar.exporter_running());
        assert!(sidecar.prometheus_running());

        sidecar.shutdown(Duration::from_secs(2)).await;
        assert!(!sidecar.exporter_running());
        assert!(!sidecar.prometheus_running());
    }
}
