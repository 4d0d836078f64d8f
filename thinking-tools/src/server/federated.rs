//! Federated intelligence MCP server

use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ServerHandler,
};

use crate::federated::tools::{
    ConsultMultipleRequest, ConsultRequest, CreateSessionRequest, ListModelsRequest,
};
use crate::federated::FederatedTools;

#[derive(Clone)]
pub struct FederatedServer {
    tools: FederatedTools,
    tool_router: ToolRouter<Self>,
}

impl FederatedServer {
    pub fn new(tools: FederatedTools) -> Self {
        Self {
            tools,
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router]
impl FederatedServer {
    #[tool(
        description = "Consult one external model (ollama, openai, openrouter or google). Pass session_id from create_session to continue a multi-turn conversation."
    )]
    async fn consult_model(
        &self,
        Parameters(req): Parameters<ConsultRequest>,
    ) -> Result<String, String> {
        self.tools.consult_model(req).await.into_tool_result()
    }

    #[tool(
        description = "Send the same query to several models in parallel and collect every answer or error."
    )]
    async fn consult_multiple_models(
        &self,
        Parameters(req): Parameters<ConsultMultipleRequest>,
    ) -> Result<String, String> {
        self.tools.consult_multiple_models(req).await.into_tool_result()
    }

    #[tool(description = "Create a conversation session for multi-turn consultations.")]
    async fn create_session(
        &self,
        Parameters(req): Parameters<CreateSessionRequest>,
    ) -> Result<String, String> {
        self.tools.create_session(req).into_tool_result()
    }

    #[tool(description = "List conversation sessions, newest first.")]
    async fn list_sessions(&self) -> Result<String, String> {
        self.tools.list_sessions().into_tool_result()
    }

    #[tool(description = "List the models a provider offers.")]
    async fn list_models(
        &self,
        Parameters(req): Parameters<ListModelsRequest>,
    ) -> Result<String, String> {
        self.tools.list_models(req).await.into_tool_result()
    }

    #[tool(description = "Check which providers are enabled and reachable.")]
    async fn health_check(&self) -> Result<String, String> {
        self.tools.health_check().await.into_tool_result()
    }
}

#[tool_handler]
impl ServerHandler for FederatedServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Federated intelligence: consult external models for a second opinion.\n\
                 - consult_model: one provider/model; model defaults to the provider's configured default\n\
                 - consult_multiple_models: fan the same query out to several models\n\
                 - create_session + session_id: keep a multi-turn conversation\n\
                 - health_check: see which providers are enabled and reachable"
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
