//! Thinking Tools MCP server binary
//!
//! Runs one of the servers over stdio:
//!
//! ```bash
//! thinking-tools ensemble
//! thinking-tools federated
//! thinking-tools lateral --concepts ./data/concepts.json
//! thinking-tools clock --timezone Europe/Berlin
//! ```
//!
//! Configuration is layered: defaults, then the YAML file from `--config` or
//! `THINKING_TOOLS_CONFIG`, then `MCP_*` environment variables, then flags.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use thinking_tools::clock::Clock;
use thinking_tools::ensemble::{EnsembleTools, SessionStore};
use thinking_tools::federated::FederatedTools;
use thinking_tools::lateral::LateralTools;
use thinking_tools::metrics::{Metrics, MetricsSidecar};
use thinking_tools::server::{self, ClockServer, EnsembleServer, FederatedServer, LateralServer};
use thinking_tools::{telemetry, AppConfig, Env};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML config file (overrides THINKING_TOOLS_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Root directory for logs, event logs, transcripts and history
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Also write JSON logs under the log directory
    #[arg(long, global = true, default_value_t = false)]
    log_file: bool,

    #[command(subcommand)]
    server: ServerCommand,
}

#[derive(Subcommand, Debug)]
enum ServerCommand {
    /// Multi-lens collaborative reasoning
    Ensemble {
        /// Disable metrics collection and exporters
        #[arg(long, default_value_t = false)]
        no_metrics: bool,
    },
    /// Consult external model providers
    Federated,
    /// Random-concept lateral thinking sessions
    Lateral {
        /// concepts.json word list for the random strategy
        #[arg(long)]
        concepts: Option<PathBuf>,
    },
    /// Current time with a self-refreshing tool description
    Clock {
        /// IANA time zone (overrides MCP_CLOCK_TIMEZONE)
        #[arg(long)]
        timezone: Option<String>,
    },
}

impl ServerCommand {
    fn name(&self) -> &'static str {
        match self {
            ServerCommand::Ensemble { .. } => "ensemble",
            ServerCommand::Federated => "federated",
            ServerCommand::Lateral { .. } => "lateral",
            ServerCommand::Clock { .. } => "clock",
        }
    }
}

/// Flags are the last configuration layer.
fn apply_cli(config: &mut AppConfig, args: &Args) {
    if let Some(root) = &args.log_dir {
        config.relocate_logs(root);
    }
    if args.log_file {
        config.logging.file_enabled = true;
    }
    match &args.server {
        ServerCommand::Ensemble { no_metrics: true } => config.metrics.enabled = false,
        ServerCommand::Lateral {
            concepts: Some(path),
        } => config.lateral.concepts_path = Some(path.clone()),
        ServerCommand::Clock {
            timezone: Some(tz),
        } => config.clock.timezone = tz.clone(),
        _ => {}
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = AppConfig::load(args.config.as_deref(), &Env::process())?;
    apply_cli(&mut config, &args);
    let _log_guard = telemetry::init(args.server.name(), &config.logging)?;

    info!(
        server = args.server.name(),
        version = env!("CARGO_PKG_VERSION"),
        "Starting Thinking Tools MCP server"
    );

    match args.server {
        ServerCommand::Ensemble { .. } => run_ensemble(config).await,
        ServerCommand::Federated => run_federated(config).await,
        ServerCommand::Lateral { .. } => run_lateral(config).await,
        ServerCommand::Clock { .. } => run_clock(config).await,
    }
}

async fn run_ensemble(config: AppConfig) -> Result<()> {
    let metrics = Metrics::new(config.metrics.enabled).shared();
    let sidecar = MetricsSidecar::new(metrics.clone(), config.metrics.clone());
    if let Err(e) = sidecar.start().await {
        warn!(error = %e, "Failed to start metrics exporters, continuing without them");
    }

    info!(
        event_log = config.ensemble.event_log_enabled,
        dir = %config.ensemble.event_log_dir.display(),
        rate_limit_ops = config.ensemble.rate_limit_ops,
        "Ensemble config"
    );
    let store = SessionStore::new(config.ensemble).shared();
    let tools = EnsembleTools::new(store, metrics);

    let result = server::serve_stdio("ensemble", EnsembleServer::new(tools)).await;
    sidecar.shutdown(SHUTDOWN_TIMEOUT).await;
    result
}

async fn run_federated(config: AppConfig) -> Result<()> {
    let tools = FederatedTools::from_config(&config.federated)
        .context("Failed to build provider HTTP clients")?;
    let enabled: Vec<_> = tools
        .registry()
        .enabled()
        .map(|(kind, _)| kind.as_str())
        .collect();
    if enabled.is_empty() {
        warn!("No providers enabled; set MCP_<PROVIDER>_ENABLED=true");
    } else {
        info!(providers = ?enabled, "Federated providers");
    }
    server::serve_stdio("federated", FederatedServer::new(tools)).await
}

async fn run_lateral(config: AppConfig) -> Result<()> {
    info!(
        method = %config.lateral.divergence_method,
        count = config.lateral.divergence_count,
        persistence = config.lateral.persistence_enabled,
        "Lateral config"
    );
    let tools = LateralTools::from_config(config.lateral);
    server::serve_stdio("lateral", LateralServer::new(tools)).await
}

async fn run_clock(config: AppConfig) -> Result<()> {
    let clock = Clock::new(&config.clock)?;
    info!(
        timezone = %config.clock.timezone,
        location = %config.clock.location,
        "Clock config"
    );
    ClockServer::new(clock)
        .serve_stdio(config.clock.refresh_interval())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config() {
        let args = Args::parse_from([
            "thinking-tools",
            "--log-dir",
            "/tmp/tt",
            "clock",
            "--timezone",
            "Asia/Tokyo",
        ]);
        let mut config = AppConfig::default();
        apply_cli(&mut config, &args);
        assert_eq!(config.clock.timezone, "Asia/Tokyo");
        assert_eq!(config.ensemble.event_log_dir, PathBuf::from("/tmp/tt/ensemble"));
        assert_eq!(config.lateral.history_dir, PathBuf::from("/tmp/tt/lateral"));
    }

    #[test]
    fn test_no_metrics_flag() {
        let args = Args::parse_from(["thinking-tools", "ensemble", "--no-metrics"]);
        let mut config = AppConfig::default();
        apply_cli(&mut config, &args);
        assert!(!config.metrics.enabled);
        assert_eq!(args.server.name(), "ensemble");
    }
}
