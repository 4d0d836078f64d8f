//! Prometheus text exposition over HTTP
//!
//! `GET /metrics` returns the current snapshot in text format 0.0.4;
//! every other path is a 404.

use std::fmt::Write;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use super::{MetricsSnapshot, SharedMetrics};

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Render a snapshot as Prometheus text.
///
/// Counters become `mcp_<name>_total`. Each latency operation becomes a
/// `mcp_<op>_seconds` summary (`_sum`, `_count`) plus an
/// `mcp_<op>_avg_seconds` gauge.
pub fn render(snapshot: &MetricsSnapshot) -> String {
    let mut out = String::new();

    for (name, value) in &snapshot.counters {
        let base = sanitize(name.strip_suffix("_total").unwrap_or(name));
        let metric = format!("mcp_{}_total", base);
        let _ = writeln!(out, "# TYPE {} counter", metric);
        let _ = writeln!(out, "{} {}", metric, value);
    }

    for (op, samples) in &snapshot.latencies {
        let base = sanitize(op);
        let sum: f64 = samples.iter().sum();
        let count = samples.len();
        let avg = if count == 0 { 0.0 } else { sum / count as f64 };

        let summary = format!("mcp_{}_seconds", base);
        let _ = writeln!(out, "# TYPE {} summary", summary);
        let _ = writeln!(out, "{}_sum {:.6}", summary, sum);
        let _ = writeln!(out, "{}_count {}", summary, count);

        let gauge = format!("mcp_{}_avg_seconds", base);
        let _ = writeln!(out, "# TYPE {} gauge", gauge);
        let _ = writeln!(out, "{} {:.6}", gauge, avg);
    }

    out
}

/// Metric names allow `[a-zA-Z0-9_]`; anything else becomes `_`.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

pub fn router(metrics: SharedMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .fallback(not_found)
        .with_state(metrics)
}

async fn metrics_handler(State(metrics): State<SharedMetrics>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, CONTENT_TYPE)],
        render(&metrics.snapshot()),
    )
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Serve until `token` is cancelled.
pub async fn serve(
    metrics: SharedMetrics,
    listener: TcpListener,
    token: CancellationToken,
) -> std::io::Result<()> {
    axum::serve(listener, router(metrics))
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await
}
