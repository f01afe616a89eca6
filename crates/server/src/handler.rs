//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::tools::cache::{CacheInstallParams, CacheStatusParams, install_impl, status_impl};
use crate::tools::{CacheRouteParams, SiteFetchParams, fetch_impl, route_impl};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use sitecache_core::{AppConfig, ClientId, Registration};
use url::Url;

/// The main MCP server handler for sitecache.
///
/// The server acts as one open page: `client` is the identity its requests
/// are issued under.
#[derive(Clone)]
pub struct SiteCacheServer {
    tool_router: ToolRouter<Self>,
    registration: Arc<Registration>,
    client: ClientId,
    config: Arc<AppConfig>,
    origin: Url,
}

#[tool_router]
impl SiteCacheServer {
    /// Create a new server handler.
    pub fn new(registration: Arc<Registration>, client: ClientId, config: Arc<AppConfig>, origin: Url) -> Self {
        Self { tool_router: Self::tool_router(), registration, client, config, origin }
    }

    /// Fetch a site URL through the offline cache.
    ///
    /// Manifest assets are served cache-first; everything else is fetched
    /// from the network first, stored, and served from cache when offline.
    #[tool(
        description = "Fetch a site URL through the offline cache. Core assets are cache-first; pages are network-first with cached fallback."
    )]
    async fn site_fetch(&self, params: Parameters<SiteFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.registration, self.client, &self.origin, params.0).await
    }

    #[tool(
        description = "Install a cache generation: pre-cache every manifest asset, then activate it and delete other generations. Defaults come from server config."
    )]
    async fn cache_install(&self, params: Parameters<CacheInstallParams>) -> Result<CallToolResult, McpError> {
        install_impl(&self.registration, &self.config, params.0).await
    }

    #[tool(description = "Show the active and waiting generations, stored container tags, and active entry count.")]
    async fn cache_status(&self, params: Parameters<CacheStatusParams>) -> Result<CallToolResult, McpError> {
        status_impl(&self.registration, params.0).await
    }

    /// Explain how a URL would be routed without fetching it.
    #[tool(description = "Show whether a URL would be served cache-first or network-first by the active generation.")]
    async fn cache_route(&self, params: Parameters<CacheRouteParams>) -> Result<CallToolResult, McpError> {
        route_impl(&self.registration, &self.origin, params.0).await
    }
}

impl ServerHandler for SiteCacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "sitecache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(format!("Offline asset cache for {}", self.origin)),
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
