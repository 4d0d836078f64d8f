//! Clock MCP server
//!
//! `get_current_time` carries the current time in its description. A
//! notifier sends `notifications/tools/list_changed` every refresh interval
//! so hosts re-list tools and pick up the new description.

use std::borrow::Cow;
use std::time::Duration;

use chrono::Utc;
use rmcp::{
    handler::server::tool::{ToolCallContext, ToolRouter},
    model::{
        CallToolRequestParam, CallToolResult, ListToolsResult, PaginatedRequestParam,
        ServerCapabilities, ServerInfo,
    },
    service::{Peer, RequestContext},
    tool, tool_router, ErrorData, RoleServer, ServerHandler, ServiceExt,
};
use tokio::io::{stdin, stdout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::task::BackgroundTask;

pub const TOOL_NAME: &str = "get_current_time";

#[derive(Clone)]
pub struct ClockServer {
    clock: Clock,
    tool_router: ToolRouter<Self>,
}

impl ClockServer {
    pub fn new(clock: Clock) -> Self {
        Self {
            clock,
            tool_router: Self::tool_router(),
        }
    }

    /// Tool listing with the description stamped with the current time.
    pub fn tools(&self) -> Vec<rmcp::model::Tool> {
        let now = Utc::now();
        let mut tools = self.tool_router.list_all();
        for tool in tools.iter_mut().filter(|t| t.name == TOOL_NAME) {
            tool.description = Some(Cow::Owned(self.clock.tool_description(now)));
        }
        tools
    }

    /// Serve over stdio, nudging the host to re-list tools every `refresh`.
    pub async fn serve_stdio(self, refresh: Duration) -> anyhow::Result<()> {
        let service = self.serve((stdin(), stdout())).await?;
        let notifier = BackgroundTask::new("clock-notifier");
        let peer = service.peer().clone();
        notifier.start(move |token| notify_loop(peer, refresh, token));
        info!(refresh_secs = refresh.as_secs(), "Clock server ready on stdio");

        let reason = service.waiting().await;
        notifier.stop(Duration::from_secs(2)).await;
        let reason = reason?;
        info!(?reason, "Clock server stopped");
        Ok(())
    }
}

async fn notify_loop(peer: Peer<RoleServer>, refresh: Duration, token: CancellationToken) {
    let mut ticker = tokio::time::interval(refresh);
    // The first tick completes immediately.
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(e) = peer.notify_tool_list_changed().await {
                    warn!(error = %e, "Failed to send tools/list_changed, stopping notifier");
                    break;
                }
                debug!("Sent tools/list_changed");
            }
        }
    }
}

#[tool_router]
impl ClockServer {
    #[tool(description = "Current time in UTC and local time.")]
    async fn get_current_time(&self) -> Result<String, String> {
        Ok(self.clock.report(Utc::now()))
    }
}

impl ServerHandler for ClockServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Clock: the get_current_time description always shows the current time; \
                 call it for a formatted report."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_tool_list_changed()
                .build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        Ok(ListToolsResult::with_all_items(self.tools()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let tcc = ToolCallContext::new(self, request, context);
        self.tool_router.call(tcc).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ClockConfig;

    #[test]
    fn test_listing_carries_current_time() {
        let server = ClockServer::new(Clock::new(&ClockConfig::default()).unwrap());
        let tools = server.tools();
        assert_eq!(tools.len(), 1);
        let description = tools[0].description.as_deref().unwrap();
        assert!(description.starts_with("NOW: "));
        assert!(description.contains(" UTC | "));
    }
}
