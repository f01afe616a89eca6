//! Offline asset cache manager.
//!
//! An [`OfflineCache`] is one worker instance bound to one generation. It owns
//! the container named after that generation and walks a fixed lifecycle:
//!
//! ```text
//! Unregistered -> Installing -> Installed -> Activating -> Active
//!                     |                                      |
//!                     +---------------> Redundant <----------+
//! ```
//!
//! - **install** pre-caches every manifest asset; any unreachable asset makes
//!   the worker redundant and leaves the previous generation in charge.
//! - **activate** deletes every container except the current generation's.
//!   Storage failures here are logged and reported, never fatal.
//! - **serve** answers a request cache-first (manifest assets) or
//!   network-first (everything else).

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::sync::atomic::{AtomicBool, Ordering};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::{OnceCell, RwLock};
use url::Url;

use crate::Error;
use crate::manifest::{Manifest, Route};
use crate::network::Network;
use crate::request::{Request, Response};
use crate::storage::{CacheContainer, CacheStorage};

/// Everything that identifies one generation.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Version tag; also the name of the generation's container.
    pub generation: String,
    pub manifest: Manifest,
    /// Base URL root-relative paths resolve against.
    pub origin: Url,
    /// Take over as soon as install succeeds instead of waiting for the
    /// previous generation's clients to close.
    pub skip_waiting: bool,
    /// Take control of already-open, uncontrolled clients on activation.
    pub claim_clients: bool,
}

impl GenerationConfig {
    pub fn new(generation: impl Into<String>, manifest: Manifest, origin: Url) -> Self {
        Self { generation: generation.into(), manifest, origin, skip_waiting: true, claim_clients: true }
    }
}

/// Lifecycle state of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Unregistered,
    Installing,
    Installed,
    Activating,
    Active,
    Redundant,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkerState::Unregistered => "unregistered",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Active => "active",
            WorkerState::Redundant => "redundant",
        };
        f.write_str(s)
    }
}

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Cache,
    Network,
}

/// A response plus how it was obtained.
#[derive(Debug, Clone)]
pub struct Served {
    pub response: Response,
    pub source: ResponseSource,
    /// `None` when no worker controlled the request.
    pub route: Option<Route>,
}

/// Outcome of stale-generation cleanup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ActivationSummary {
    pub generation: String,
    /// Containers removed.
    pub deleted: Vec<String>,
    /// Stale containers that could not be removed.
    pub retained: Vec<String>,
}

/// One worker instance bound to one generation.
pub struct OfflineCache {
    config: GenerationConfig,
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    state: RwLock<WorkerState>,
    container: OnceCell<Arc<dyn CacheContainer>>,
    skip_waiting: AtomicBool,
    clients_claimed: AtomicBool,
    activation: OnceLock<ActivationSummary>,
}

impl fmt::Debug for OfflineCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OfflineCache")
            .field("generation", &self.config.generation)
            .field("manifest", &self.config.manifest)
            .finish_non_exhaustive()
    }
}

impl OfflineCache {
    pub fn new(config: GenerationConfig, storage: Arc<dyn CacheStorage>, network: Arc<dyn Network>) -> Self {
        Self {
            config,
            storage,
            network,
            state: RwLock::new(WorkerState::Unregistered),
            container: OnceCell::new(),
            skip_waiting: AtomicBool::new(false),
            clients_claimed: AtomicBool::new(false),
            activation: OnceLock::new(),
        }
    }

    pub fn generation(&self) -> &str {
        &self.config.generation
    }

    pub fn manifest(&self) -> &Manifest {
        &self.config.manifest
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    /// Whether install asked the host to skip the waiting phase.
    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    /// Cleanup outcome of this worker's activation; `None` until it has activated.
    pub fn activation(&self) -> Option<&ActivationSummary> {
        self.activation.get()
    }

    /// Whether activation asked the host to hand over every open client.
    pub fn clients_claimed(&self) -> bool {
        self.clients_claimed.load(Ordering::SeqCst)
    }

    /// Pre-cache every manifest asset into this generation's container.
    ///
    /// Allowed from `Unregistered`, and again from `Installed` (same entries,
    /// same single container).
    ///
    /// # Errors
    ///
    /// - `Error::InvalidState` when called from any other state
    /// - `Error::Install` when a manifest asset is unreachable; nothing is
    ///   written and the worker becomes `Redundant`
    pub async fn install(&self) -> Result<(), Error> {
        {
            let mut state = self.state.write().await;
            if !matches!(*state, WorkerState::Unregistered | WorkerState::Installed) {
                return Err(Error::InvalidState(format!(
                    "cannot install {} while {}",
                    self.config.generation, *state
                )));
            }
            *state = WorkerState::Installing;
        }

        tracing::info!(
            generation = %self.config.generation,
            assets = self.config.manifest.len(),
            "installing generation"
        );

        match self.populate().await {
            Ok(()) => {
                *self.state.write().await = WorkerState::Installed;
                if self.config.skip_waiting {
                    self.skip_waiting.store(true, Ordering::SeqCst);
                }
                tracing::info!(generation = %self.config.generation, "generation installed");
                Ok(())
            }
            Err(e) => {
                *self.state.write().await = WorkerState::Redundant;
                tracing::warn!(generation = %self.config.generation, error = %e, "install failed");
                Err(e)
            }
        }
    }

    async fn populate(&self) -> Result<(), Error> {
        let container = self.container().await?;
        let mut entries = Vec::with_capacity(self.config.manifest.len());

        for path in self.config.manifest.entries() {
            let request = Request::resolve("GET", path, &self.config.origin)?;
            let response = self.network.fetch(&request).await.map_err(|source| Error::Install {
                generation: self.config.generation.clone(),
                path: path.clone(),
                source,
            })?;

            if !response.is_ok() {
                tracing::warn!(path = %path, status = response.status, "caching non-success manifest response");
            }
            entries.push((request, response));
        }

        container.add_all(entries).await
    }

    /// Remove every container except this generation's, then become active.
    ///
    /// # Errors
    ///
    /// Returns `Error::Activation` only when the worker is not `Installed`.
    /// Listing or deletion failures are logged and left in
    /// [`ActivationSummary::retained`].
    pub async fn activate(&self) -> Result<ActivationSummary, Error> {
        {
            let mut state = self.state.write().await;
            if *state != WorkerState::Installed {
                return Err(Error::Activation(format!(
                    "cannot activate {} while {}",
                    self.config.generation, *state
                )));
            }
            *state = WorkerState::Activating;
        }

        let mut summary = ActivationSummary { generation: self.config.generation.clone(), ..Default::default() };

        match self.storage.keys().await {
            Ok(keys) => {
                for key in keys.into_iter().filter(|k| *k != self.config.generation) {
                    match self.storage.delete(&key).await {
                        Ok(_) => summary.deleted.push(key),
                        Err(e) => {
                            tracing::warn!(container = %key, error = %e, "failed to delete stale container");
                            summary.retained.push(key);
                        }
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to list containers; skipping cleanup"),
        }

        *self.state.write().await = WorkerState::Active;
        if self.config.claim_clients {
            self.clients_claimed.store(true, Ordering::SeqCst);
        }

        tracing::info!(
            generation = %self.config.generation,
            deleted = summary.deleted.len(),
            retained = summary.retained.len(),
            "generation active"
        );

        let _ = self.activation.set(summary.clone());
        Ok(summary)
    }

    /// Retire this worker; it will not serve again.
    pub async fn mark_redundant(&self) {
        *self.state.write().await = WorkerState::Redundant;
    }

    pub fn route(&self, request: &Request) -> Route {
        self.config.manifest.route(request)
    }

    /// Answer a request according to its route.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidState` unless the worker is `Active`
    /// - `Error::RequestFailed` when the network fails and nothing is cached
    pub async fn serve(&self, request: &Request) -> Result<Served, Error> {
        let state = self.state().await;
        if state != WorkerState::Active {
            return Err(Error::InvalidState(format!(
                "{} cannot serve while {}",
                self.config.generation, state
            )));
        }

        self.respond(request).await
    }

    /// Answer a request already handed to this worker while it was active.
    ///
    /// A worker retired mid-request still answers it, but no longer writes to
    /// the cache.
    pub(crate) async fn respond(&self, request: &Request) -> Result<Served, Error> {
        let route = self.route(request);
        tracing::debug!(method = request.method(), url = %request.url(), %route, "routing request");

        match route {
            Route::CacheFirst => self.cache_first(request).await,
            Route::NetworkFirst => self.network_first(request).await,
        }
    }

    async fn cache_first(&self, request: &Request) -> Result<Served, Error> {
        if let Some(response) = self.lookup(request).await {
            tracing::debug!(url = %request.url(), "cache hit");
            return Ok(Served { response, source: ResponseSource::Cache, route: Some(Route::CacheFirst) });
        }

        tracing::debug!(url = %request.url(), "cache miss; fetching");
        let response = self.network.fetch(request).await.map_err(|source| Error::RequestFailed {
            method: request.method().to_string(),
            url: request.url().to_string(),
            source,
        })?;

        Ok(Served { response, source: ResponseSource::Network, route: Some(Route::CacheFirst) })
    }

    async fn network_first(&self, request: &Request) -> Result<Served, Error> {
        match self.network.fetch(request).await {
            Ok(response) => {
                if request.is_get() && response.is_ok() {
                    self.store(request, &response).await;
                }
                Ok(Served { response, source: ResponseSource::Network, route: Some(Route::NetworkFirst) })
            }
            Err(source) => match self.lookup(request).await {
                Some(response) => {
                    tracing::debug!(url = %request.url(), error = %source, "network failed; serving cached copy");
                    Ok(Served { response, source: ResponseSource::Cache, route: Some(Route::NetworkFirst) })
                }
                None => Err(Error::RequestFailed {
                    method: request.method().to_string(),
                    url: request.url().to_string(),
                    source,
                }),
            },
        }
    }

    /// Cached copy for this request, treating storage errors as a miss.
    async fn lookup(&self, request: &Request) -> Option<Response> {
        let result = match self.container().await {
            Ok(container) => container.match_request(request).await,
            Err(e) => Err(e),
        };

        result.unwrap_or_else(|e| {
            tracing::warn!(url = %request.url(), error = %e, "cache lookup failed");
            None
        })
    }

    async fn store(&self, request: &Request, response: &Response) {
        if self.state().await != WorkerState::Active {
            tracing::debug!(url = %request.url(), generation = %self.config.generation, "worker retired; not caching");
            return;
        }

        let result = match self.container().await {
            Ok(container) => container.put(request, response).await,
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            tracing::warn!(url = %request.url(), error = %e, "failed to cache response");
        }
    }

    /// This generation's container, opened once.
    pub async fn container(&self) -> Result<Arc<dyn CacheContainer>, Error> {
        self.container
            .get_or_try_init(|| self.storage.open(&self.config.generation))
            .await
            .cloned()
    }
}
