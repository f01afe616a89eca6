//! cache_status tool implementation.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sitecache_core::{CacheContainer, CacheStorage, CachedRequest, Error, OfflineCache, Registration, WorkerState};

/// Parameters for the cache_status tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheStatusParams {
    /// List the stored request identities of the active container (default: false).
    #[serde(default)]
    pub include_entries: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerStatus {
    pub generation: String,
    pub state: WorkerState,
    pub manifest: Vec<String>,
}

impl WorkerStatus {
    async fn of(worker: &OfflineCache) -> Self {
        Self {
            generation: worker.generation().to_string(),
            state: worker.state().await,
            manifest: worker.manifest().entries().to_vec(),
        }
    }
}

/// Output from the cache_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheStatusOutput {
    pub active: Option<WorkerStatus>,
    pub waiting: Option<WorkerStatus>,
    /// Every container tag present in storage.
    pub containers: Vec<String>,
    /// Entry count of the active generation's container.
    pub entry_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entries: Option<Vec<CachedRequest>>,
}

/// Implementation of the cache_status tool.
pub async fn status_impl(registration: &Registration, params: CacheStatusParams) -> Result<CallToolResult, McpError> {
    let containers = registration.storage().keys().await?;

    let (active, entry_count, entries) = match registration.controller().await {
        Some(worker) => {
            let requests = worker.container().await?.requests().await?;
            let count = requests.len();
            (Some(WorkerStatus::of(&worker).await), count, params.include_entries.then_some(requests))
        }
        None => (None, 0, None),
    };

    let mut waiting = None;
    if let Some(worker) = registration.waiting().await {
        waiting = Some(WorkerStatus::of(&worker).await);
    }

    let output = CacheStatusOutput { active, waiting, containers, entry_count, entries };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
