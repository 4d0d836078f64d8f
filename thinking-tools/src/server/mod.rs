//! MCP server wrappers
//!
//! Each server is a thin `rmcp` handler over its tool surface: argument
//! schemas come from the request types, bodies delegate to the tool
//! structs, and every result is the JSON envelope as text.

pub mod clock;
pub mod ensemble;
pub mod federated;
pub mod lateral;

use rmcp::{ServerHandler, ServiceExt};
use tokio::io::{stdin, stdout};
use tracing::info;

pub use clock::ClockServer;
pub use ensemble::EnsembleServer;
pub use federated::FederatedServer;
pub use lateral::LateralServer;

/// Serve `server` over stdio until the host disconnects.
pub async fn serve_stdio<S: ServerHandler>(name: &str, server: S) -> anyhow::Result<()> {
    let service = server.serve((stdin(), stdout())).await?;
    info!(server = name, "MCP server ready on stdio");
    let reason = service.waiting().await?;
    info!(server = name, ?reason, "MCP server stopped");
    Ok(())
}
