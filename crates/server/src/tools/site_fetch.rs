//! site_fetch tool implementation.
//!
//! Sends one request through the registration, exactly as a controlled page
//! would: manifest assets cache-first, everything else network-first.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sitecache_core::{ClientId, Error, Registration, Request, ResponseSource, Route};
use url::Url;

/// Input parameters for the site_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SiteFetchParams {
    /// Absolute URL or root-relative path (resolved against the site origin).
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,
}

fn default_method() -> String {
    "GET".into()
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// Output structure for the site_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SiteFetchOutput {
    /// The resolved request URL.
    pub url: String,
    pub method: String,
    pub status: u16,
    pub headers: Vec<Header>,
    /// Body decoded as UTF-8 (lossy).
    pub body: String,
    /// Whether the response came from the cache or the network.
    pub source: ResponseSource,
    /// Route taken; absent when no generation controlled the request.
    pub route: Option<Route>,
    /// Generation that handled the request.
    pub generation: Option<String>,
}

/// Implementation of the site_fetch tool.
pub async fn fetch_impl(
    registration: &Registration, client: ClientId, origin: &Url, params: SiteFetchParams,
) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()).into());
    }

    let request = Request::resolve(&params.method, &params.url, origin)?;
    let generation = registration.client_controller(client).await;
    let served = registration.handle_fetch(client, &request).await?;

    let output = SiteFetchOutput {
        url: request.url().to_string(),
        method: request.method().to_string(),
        status: served.response.status,
        headers: served
            .response
            .headers
            .iter()
            .map(|(name, value)| Header { name: name.clone(), value: value.clone() })
            .collect(),
        body: served.response.body_text(),
        source: served.source,
        route: served.route,
        generation: served.route.and(generation),
    };

    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
