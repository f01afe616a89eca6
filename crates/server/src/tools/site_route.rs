//! cache_route tool implementation.
//!
//! Reports how the active generation would route a request without sending it.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sitecache_core::{Error, Registration, Request, Route};
use url::Url;

/// Parameters for the cache_route tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheRouteParams {
    /// Absolute URL or root-relative path.
    pub url: String,
}

/// Output from the cache_route tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheRouteOutput {
    pub url: String,
    pub path: String,
    /// `None` when no generation is active; the request would go straight to the network.
    pub route: Option<Route>,
    pub generation: Option<String>,
    /// Manifest entry the path matched, if any.
    pub matched: Option<String>,
}

/// Implementation of the cache_route tool.
pub async fn route_impl(
    registration: &Registration, origin: &Url, params: CacheRouteParams,
) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()).into());
    }

    let request = Request::resolve("GET", &params.url, origin)?;
    let active = registration.controller().await;

    let (route, generation, matched) = match &active {
        Some(worker) => {
            let route = worker.route(&request);
            let matched = worker.manifest().matching(request.path()).map(String::from);
            (Some(route), Some(worker.generation().to_string()), matched)
        }
        None => (None, None, None),
    };

    let output =
        CacheRouteOutput { url: request.url().to_string(), path: request.path().to_string(), route, generation, matched };

    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
