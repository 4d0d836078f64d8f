//! Periodic JSON snapshot export

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{MetricsSnapshot, SharedMetrics};

/// On-disk layout of the snapshot file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportDocument {
    pub timestamp: DateTime<Utc>,
    pub metrics: MetricsSnapshot,
}

/// Write `snapshot` to `path` via a sibling `.tmp` file and a rename, so
/// readers never observe a partial document.
pub fn write_snapshot(path: &Path, snapshot: MetricsSnapshot) -> io::Result<()> {
    let document = ExportDocument {
        timestamp: Utc::now(),
        metrics: snapshot,
    };
    let body = serde_json::to_vec(&document)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, body)?;
    fs::rename(&tmp, path)
}

/// Exporter loop: write immediately, then once per `interval` until
/// cancelled, with a final write on the way out.
pub async fn run(
    metrics: SharedMetrics,
    path: PathBuf,
    interval: Duration,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => export_once(&metrics, &path),
        }
    }
    export_once(&metrics, &path);
    debug!(path = %path.display(), "metrics exporter stopped");
}

fn export_once(metrics: &SharedMetrics, path: &Path) {
    if let Err(e) = write_snapshot(path, metrics.snapshot()) {
        warn!(path = %path.display(), error = %e, "metrics export failed, retrying next tick");
    }
}
