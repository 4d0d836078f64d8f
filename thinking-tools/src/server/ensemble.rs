//! Ensemble reasoning MCP server

use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ServerHandler,
};

use crate::ensemble::tools::{
    ContributeRequest, EndorseRequest, ProposeRequest, ResetRateRequest, SessionRequest,
    StartRequest, SynthesizeRequest,
};
use crate::ensemble::EnsembleTools;

#[derive(Clone)]
pub struct EnsembleServer {
    tools: EnsembleTools,
    tool_router: ToolRouter<Self>,
}

impl EnsembleServer {
    pub fn new(tools: EnsembleTools) -> Self {
        Self {
            tools,
            tool_router: Self::tool_router(),
        }
    }

    pub fn tools(&self) -> &EnsembleTools {
        &self.tools
    }
}

#[tool_router]
impl EnsembleServer {
    #[tool(
        description = "Start a collaborative reasoning session. Pick at least two agent lenses (analytical, skeptical, creative, pragmatic, ethical); the new session becomes current."
    )]
    async fn start_collaborative_reasoning(
        &self,
        Parameters(req): Parameters<StartRequest>,
    ) -> Result<String, String> {
        self.tools.start_collaborative_reasoning(req).into_tool_result()
    }

    #[tool(
        description = "Contribute a thought from one agent lens, optionally building on earlier thought IDs and with a confidence weight (0.0-1.0)."
    )]
    async fn contribute_perspective(
        &self,
        Parameters(req): Parameters<ContributeRequest>,
    ) -> Result<String, String> {
        self.tools.contribute_perspective(req).into_tool_result()
    }

    #[tool(
        description = "Endorse (positive level) or challenge (negative level) another agent's thought. Levels range from -1.0 to 1.0; an agent cannot endorse its own thought."
    )]
    async fn endorse_or_challenge(
        &self,
        Parameters(req): Parameters<EndorseRequest>,
    ) -> Result<String, String> {
        self.tools.endorse_or_challenge(req).into_tool_result()
    }

    #[tool(
        description = "Analyze the session: consensus thoughts above the threshold, tensions between positive and negative endorsements, circular reasoning and an overall convergence score."
    )]
    async fn synthesize_convergence(
        &self,
        Parameters(req): Parameters<SynthesizeRequest>,
    ) -> Result<String, String> {
        self.tools.synthesize_convergence(req).into_tool_result()
    }

    #[tool(
        description = "Propose an integration that reconciles a list of existing thought IDs."
    )]
    async fn propose_integration(
        &self,
        Parameters(req): Parameters<ProposeRequest>,
    ) -> Result<String, String> {
        self.tools.propose_integration(req).into_tool_result()
    }

    #[tool(description = "Render a text map of consensus, tensions and reasoning chains.")]
    async fn get_convergence_map(
        &self,
        Parameters(req): Parameters<SessionRequest>,
    ) -> Result<String, String> {
        self.tools.get_convergence_map(req).into_tool_result()
    }

    #[tool(description = "Return the current session with all thoughts and integrations.")]
    async fn get_active_session(&self) -> Result<String, String> {
        self.tools.get_active_session().into_tool_result()
    }

    #[tool(description = "Return operation counters and average latencies.")]
    async fn get_metrics(&self) -> Result<String, String> {
        self.tools.get_metrics().into_tool_result()
    }

    #[tool(description = "Return how many operations each agent has used in the current rate window.")]
    async fn get_rate_status(&self) -> Result<String, String> {
        self.tools.get_rate_status().into_tool_result()
    }

    #[tool(description = "Clear an agent's rate window, for one session or all of them.")]
    async fn reset_agent_rate(
        &self,
        Parameters(req): Parameters<ResetRateRequest>,
    ) -> Result<String, String> {
        self.tools.reset_agent_rate(req).into_tool_result()
    }
}

#[tool_handler]
impl ServerHandler for EnsembleServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Ensemble reasoning: several agent lenses contribute, endorse and challenge \
                 thoughts in a shared session.\n\
                 1. start_collaborative_reasoning with 2+ lenses\n\
                 2. contribute_perspective / endorse_or_challenge / propose_integration\n\
                 3. synthesize_convergence or get_convergence_map to see where the lenses agree\n\
                 Every tool answers with {\"status\": \"success\"|\"error\", ...}."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
