//! Lateral synthesis MCP server

use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ServerHandler,
};

use crate::lateral::tools::{
    GenerateDivergenceRequest, GetSessionRequest, ListSessionsRequest, RecordSynthesisRequest,
    ReflectRequest, StartSessionRequest,
};
use crate::lateral::LateralTools;

#[derive(Clone)]
pub struct LateralServer {
    tools: LateralTools,
    tool_router: ToolRouter<Self>,
}

impl LateralServer {
    pub fn new(tools: LateralTools) -> Self {
        Self {
            tools,
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router]
impl LateralServer {
    #[tool(description = "Start a lateral synthesis session from an origin concept, phrase or question.")]
    async fn start_session(
        &self,
        Parameters(req): Parameters<StartSessionRequest>,
    ) -> Result<String, String> {
        self.tools.start_session(req).into_tool_result()
    }

    #[tool(
        description = "Draw random, unrelated concepts for the session. Refuses to regenerate unless override is true, which also clears earlier syntheses."
    )]
    async fn generate_divergence(
        &self,
        Parameters(req): Parameters<GenerateDivergenceRequest>,
    ) -> Result<String, String> {
        self.tools.generate_divergence(req).into_tool_result()
    }

    #[tool(
        description = "Record how one divergent concept connects back to the origin: connection type, confidence (0.0-1.0) and the bridging insight."
    )]
    async fn record_synthesis(
        &self,
        Parameters(req): Parameters<RecordSynthesisRequest>,
    ) -> Result<String, String> {
        self.tools.record_synthesis(req).into_tool_result()
    }

    #[tool(
        description = "Close the session with a reflection once every concept has a synthesis."
    )]
    async fn reflect_on_session(
        &self,
        Parameters(req): Parameters<ReflectRequest>,
    ) -> Result<String, String> {
        self.tools.reflect_on_session(req).into_tool_result()
    }

    #[tool(description = "Return a session with its progress status.")]
    async fn get_session(
        &self,
        Parameters(req): Parameters<GetSessionRequest>,
    ) -> Result<String, String> {
        self.tools.get_session(req).into_tool_result()
    }

    #[tool(description = "List sessions, optionally including completed ones saved to disk.")]
    async fn list_sessions(
        &self,
        Parameters(req): Parameters<ListSessionsRequest>,
    ) -> Result<String, String> {
        self.tools.list_sessions(req).into_tool_result()
    }
}

#[tool_handler]
impl ServerHandler for LateralServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Lateral synthesis forces creative leaps.\n\
                 1. start_session with an origin\n\
                 2. generate_divergence to draw unrelated concepts\n\
                 3. record_synthesis once per concept\n\
                 4. reflect_on_session to finish"
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
