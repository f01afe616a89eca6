//! cache_install tool implementation.
//!
//! Registers a new generation. Unset fields fall back to the server
//! configuration, so calling it with `{}` reinstalls the configured generation.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sitecache_core::{AppConfig, CacheContainer, Error, Manifest, Registration, WorkerState};

/// Parameters for the cache_install tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheInstallParams {
    /// Generation tag (default: the configured generation).
    #[serde(default)]
    pub generation: Option<String>,

    /// Root-relative asset paths to pre-cache (default: the configured manifest).
    #[serde(default)]
    pub manifest: Option<Vec<String>>,
}

/// Output from the cache_install tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheInstallOutput {
    pub generation: String,
    /// State of the new worker after registration.
    pub state: WorkerState,
    /// Number of manifest assets stored.
    pub cached: usize,
    /// Generation now controlling clients.
    pub active: Option<String>,
    /// Generation waiting for open clients to close.
    pub waiting: Option<String>,
    /// Stale containers removed on activation (empty while waiting).
    pub deleted: Vec<String>,
    /// Stale containers that could not be removed.
    pub retained: Vec<String>,
}

/// Implementation of the cache_install tool.
pub async fn install_impl(
    registration: &Registration, config: &AppConfig, params: CacheInstallParams,
) -> Result<CallToolResult, McpError> {
    let mut generation = config.generation_config()?;

    if let Some(tag) = params.generation {
        if tag.trim().is_empty() {
            return Err(Error::InvalidInput("generation cannot be empty".into()).into());
        }
        generation.generation = tag;
    }
    if let Some(entries) = params.manifest {
        generation.manifest = Manifest::new(entries)?;
    }

    tracing::info!(generation = %generation.generation, assets = generation.manifest.len(), "installing generation");

    let worker = registration.register(generation).await?;
    let cached = worker.container().await?.len().await?;
    let (deleted, retained) = worker
        .activation()
        .map(|summary| (summary.deleted.clone(), summary.retained.clone()))
        .unwrap_or_default();

    let output = CacheInstallOutput {
        generation: worker.generation().to_string(),
        state: worker.state().await,
        cached,
        active: registration.controller().await.map(|w| w.generation().to_string()),
        waiting: registration.waiting().await.map(|w| w.generation().to_string()),
        deleted,
        retained,
    };

    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
