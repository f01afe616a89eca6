//! Host runtime: which worker controls which client.
//!
//! A [`Registration`] owns at most one active and one waiting
//! [`OfflineCache`], plus the set of connected clients (open pages).
//!
//! Promotion rules for a freshly installed worker:
//! - it requested skip-waiting, or
//! - nothing is active yet, or
//! - no connected client is controlled by the active worker.
//!
//! Otherwise it waits until the last client of the active generation
//! disconnects. On promotion, clients controlled by the old worker move to the
//! new one; uncontrolled clients move only when the new worker claims them.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;

use crate::Error;
use crate::network::Network;
use crate::request::Request;
use crate::storage::CacheStorage;
use crate::worker::{GenerationConfig, OfflineCache, ResponseSource, Served};

/// Identifier of a connected client.
pub type ClientId = u64;

#[derive(Default)]
struct Slots {
    active: Option<Arc<OfflineCache>>,
    waiting: Option<Arc<OfflineCache>>,
    /// Client → generation controlling it, if any.
    clients: HashMap<ClientId, Option<String>>,
}

impl Slots {
    fn active_has_clients(&self) -> bool {
        match &self.active {
            Some(active) => self
                .clients
                .values()
                .any(|controller| controller.as_deref() == Some(active.generation())),
            None => false,
        }
    }
}

/// Lifecycle driver shared by every request handler.
pub struct Registration {
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    slots: RwLock<Slots>,
    next_client: AtomicU64,
}

impl Registration {
    pub fn new(storage: Arc<dyn CacheStorage>, network: Arc<dyn Network>) -> Self {
        Self { storage, network, slots: RwLock::new(Slots::default()), next_client: AtomicU64::new(1) }
    }

    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    /// Install a new generation and promote it when the rules allow.
    ///
    /// A promoted worker carries its cleanup report in
    /// [`OfflineCache::activation`].
    ///
    /// # Errors
    ///
    /// Returns the install error when population fails; the current active
    /// worker (if any) keeps serving.
    pub async fn register(&self, config: GenerationConfig) -> Result<Arc<OfflineCache>, Error> {
        let worker = Arc::new(OfflineCache::new(config, Arc::clone(&self.storage), Arc::clone(&self.network)));

        if let Err(e) = worker.install().await {
            let active = self.controller().await;
            tracing::warn!(
                generation = worker.generation(),
                active = active.as_ref().map(|a| a.generation()),
                "install failed; keeping current generation"
            );
            return Err(e);
        }

        let mut slots = self.slots.write().await;
        if worker.skip_waiting_requested() || slots.active.is_none() || !slots.active_has_clients() {
            Self::promote(&mut slots, Arc::clone(&worker)).await?;
        } else {
            tracing::info!(generation = worker.generation(), "installed; waiting for open clients to close");
            if let Some(previous) = slots.waiting.replace(Arc::clone(&worker)) {
                previous.mark_redundant().await;
            }
        }

        Ok(worker)
    }

    async fn promote(slots: &mut Slots, worker: Arc<OfflineCache>) -> Result<(), Error> {
        let summary = worker.activate().await?;
        if !summary.retained.is_empty() {
            tracing::warn!(generation = worker.generation(), retained = ?summary.retained, "stale containers left behind");
        }

        if let Some(waiting) = slots.waiting.take()
            && !Arc::ptr_eq(&waiting, &worker)
        {
            waiting.mark_redundant().await;
        }

        let generation = worker.generation().to_string();
        let claim = worker.clients_claimed();
        for controller in slots.clients.values_mut() {
            if controller.is_some() || claim {
                *controller = Some(generation.clone());
            }
        }

        if let Some(previous) = slots.active.replace(Arc::clone(&worker))
            && !Arc::ptr_eq(&previous, &worker)
        {
            previous.mark_redundant().await;
        }

        Ok(())
    }

    /// The active worker, if any.
    pub async fn controller(&self) -> Option<Arc<OfflineCache>> {
        self.slots.read().await.active.clone()
    }

    /// The installed worker waiting for promotion, if any.
    pub async fn waiting(&self) -> Option<Arc<OfflineCache>> {
        self.slots.read().await.waiting.clone()
    }

    /// Open a client; it is controlled by the active generation, if any.
    pub async fn connect_client(&self) -> ClientId {
        let id = self.next_client.fetch_add(1, Ordering::SeqCst);
        let mut slots = self.slots.write().await;
        let controller = slots.active.as_ref().map(|a| a.generation().to_string());
        slots.clients.insert(id, controller);
        id
    }

    /// Close a client, promoting a waiting worker once the active generation
    /// has no clients left.
    ///
    /// # Errors
    ///
    /// Propagates an activation error from the waiting worker.
    pub async fn disconnect_client(&self, id: ClientId) -> Result<(), Error> {
        let mut slots = self.slots.write().await;
        slots.clients.remove(&id);

        if !slots.active_has_clients()
            && let Some(waiting) = slots.waiting.take()
        {
            Self::promote(&mut slots, waiting).await?;
        }

        Ok(())
    }

    /// Generation controlling a client; `None` when uncontrolled or unknown.
    pub async fn client_controller(&self, id: ClientId) -> Option<String> {
        self.slots.read().await.clients.get(&id).cloned().flatten()
    }

    /// Handle a request issued by `client`.
    ///
    /// Controlled clients go through the active worker; uncontrolled clients
    /// fall through to the network untouched. A worker replaced while the
    /// request is in flight still answers it.
    ///
    /// # Errors
    ///
    /// `Error::RequestFailed` when the request cannot be satisfied.
    pub async fn handle_fetch(&self, client: ClientId, request: &Request) -> Result<Served, Error> {
        let worker = {
            let slots = self.slots.read().await;
            match slots.clients.get(&client) {
                Some(Some(_)) => slots.active.clone(),
                _ => None,
            }
        };

        match worker {
            Some(worker) => worker.respond(request).await,
            None => {
                let response = self.network.fetch(request).await.map_err(|source| Error::RequestFailed {
                    method: request.method().to_string(),
                    url: request.url().to_string(),
                    source,
                })?;
                Ok(Served { response, source: ResponseSource::Network, route: None })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{Manifest, Route};
    use crate::storage::MemoryStorage;
    use crate::testing::{GatedNetwork, StaticNetwork, origin};
    use crate::worker::WorkerState;

    const MAIN_JS: &str = "/assets/js/main.js";
    const STYLES: &str = "/assets/css/styles.css";

    fn config(generation: &str, manifest: &[&str]) -> GenerationConfig {
        GenerationConfig::new(generation, Manifest::new(manifest.iter().copied()).unwrap(), origin())
    }

    fn site() -> Arc<StaticNetwork> {
        let network = StaticNetwork::new();
        network.serve(STYLES, 200, "body{}");
        network.serve(MAIN_JS, 200, "v1 script");
        network.serve("/index.html", 200, "<h1>home</h1>");
        Arc::new(network)
    }

    fn get(path: &str) -> Request {
        Request::resolve("GET", path, &origin()).unwrap()
    }

    #[tokio::test]
    async fn test_first_registration_becomes_active() {
        let registration = Registration::new(Arc::new(MemoryStorage::new()), site());
        let worker = registration.register(config("site-v1", &[STYLES, MAIN_JS])).await.unwrap();

        assert_eq!(worker.state().await, WorkerState::Active);
        let controller = registration.controller().await.unwrap();
        assert_eq!(controller.generation(), "site-v1");
    }

    #[tokio::test]
    async fn test_new_generation_replaces_old_containers() {
        let storage = Arc::new(MemoryStorage::new());
        let registration = Registration::new(storage.clone(), site());

        let v1 = registration.register(config("site-v1", &[STYLES])).await.unwrap();
        registration.register(config("site-v2", &[STYLES])).await.unwrap();
        let v3 = registration.register(config("site-v3", &[STYLES, MAIN_JS])).await.unwrap();

        assert_eq!(storage.keys().await.unwrap(), vec!["site-v3"]);
        assert_eq!(v1.state().await, WorkerState::Redundant);
        assert_eq!(v3.activation().unwrap().deleted, vec!["site-v2"]);
    }

    #[tokio::test]
    async fn test_install_failure_keeps_previous_generation() {
        let storage = Arc::new(MemoryStorage::new());
        let network = site();
        let registration = Registration::new(storage.clone(), network.clone());
        registration.register(config("site-v1", &[STYLES, MAIN_JS])).await.unwrap();

        network.serve(MAIN_JS, 200, "v2 script");
        network.fail("/assets/js/new-widget.js");
        let result = registration
            .register(config("site-v2", &[STYLES, MAIN_JS, "/assets/js/new-widget.js"]))
            .await;
        assert!(matches!(result, Err(Error::Install { .. })));

        let controller = registration.controller().await.unwrap();
        assert_eq!(controller.generation(), "site-v1");
        assert_eq!(controller.state().await, WorkerState::Active);

        network.set_offline(true);
        let client = registration.connect_client().await;
        let served = registration.handle_fetch(client, &get(MAIN_JS)).await.unwrap();
        assert_eq!(served.route, Some(Route::CacheFirst));
        assert_eq!(served.source, ResponseSource::Cache);
        assert_eq!(served.response.body_text(), "v1 script");
    }

    #[tokio::test]
    async fn test_waiting_until_clients_close() {
        let registration = Registration::new(Arc::new(MemoryStorage::new()), site());
        registration.register(config("site-v1", &[STYLES])).await.unwrap();
        let client = registration.connect_client().await;

        let mut v2 = config("site-v2", &[STYLES]);
        v2.skip_waiting = false;
        let worker = registration.register(v2).await.unwrap();

        assert_eq!(worker.state().await, WorkerState::Installed);
        assert!(worker.activation().is_none());
        assert_eq!(registration.waiting().await.unwrap().generation(), "site-v2");
        assert_eq!(registration.controller().await.unwrap().generation(), "site-v1");

        registration.disconnect_client(client).await.unwrap();

        assert_eq!(worker.state().await, WorkerState::Active);
        assert_eq!(worker.activation().unwrap().deleted, vec!["site-v1"]);
        assert!(registration.waiting().await.is_none());
        assert_eq!(registration.controller().await.unwrap().generation(), "site-v2");
    }

    #[tokio::test]
    async fn test_in_flight_request_survives_promotion() {
        let pages = site();
        pages.serve("/slow.html", 200, "slow page");
        let network = Arc::new(GatedNetwork::new(pages, "/slow.html"));
        let storage = Arc::new(MemoryStorage::new());
        let registration = Arc::new(Registration::new(storage.clone(), network.clone()));
        registration.register(config("site-v1", &[STYLES])).await.unwrap();
        let client = registration.connect_client().await;

        let pending = tokio::spawn({
            let registration = Arc::clone(&registration);
            async move { registration.handle_fetch(client, &get("/slow.html")).await }
        });
        network.entered().await;

        registration.register(config("site-v2", &[STYLES])).await.unwrap();
        assert_eq!(storage.keys().await.unwrap(), vec!["site-v2"]);

        network.release();
        let served = pending.await.unwrap().unwrap();

        assert_eq!(served.source, ResponseSource::Network);
        assert_eq!(served.response.body_text(), "slow page");
        assert_eq!(storage.keys().await.unwrap(), vec!["site-v2"]);
    }

    #[tokio::test]
    async fn test_skip_waiting_moves_controlled_clients() {
        let registration = Registration::new(Arc::new(MemoryStorage::new()), site());
        registration.register(config("site-v1", &[STYLES])).await.unwrap();
        let client = registration.connect_client().await;
        assert_eq!(registration.client_controller(client).await.as_deref(), Some("site-v1"));

        registration.register(config("site-v2", &[STYLES])).await.unwrap();

        assert_eq!(registration.client_controller(client).await.as_deref(), Some("site-v2"));
    }

    #[tokio::test]
    async fn test_claim_takes_uncontrolled_clients() {
        let registration = Registration::new(Arc::new(MemoryStorage::new()), site());
        let early = registration.connect_client().await;
        assert!(registration.client_controller(early).await.is_none());

        registration.register(config("site-v1", &[STYLES])).await.unwrap();

        assert_eq!(registration.client_controller(early).await.as_deref(), Some("site-v1"));
    }

    #[tokio::test]
    async fn test_without_claim_early_clients_stay_uncontrolled() {
        let registration = Registration::new(Arc::new(MemoryStorage::new()), site());
        let early = registration.connect_client().await;

        let mut v1 = config("site-v1", &[STYLES]);
        v1.claim_clients = false;
        registration.register(v1).await.unwrap();

        assert!(registration.client_controller(early).await.is_none());
        let served = registration.handle_fetch(early, &get(STYLES)).await.unwrap();
        assert_eq!(served.route, None);
        assert_eq!(served.source, ResponseSource::Network);

        let late = registration.connect_client().await;
        assert_eq!(registration.client_controller(late).await.as_deref(), Some("site-v1"));
    }

    #[tokio::test]
    async fn test_uncontrolled_fetch_failure_propagates() {
        let network = site();
        let registration = Registration::new(Arc::new(MemoryStorage::new()), network.clone());
        let client = registration.connect_client().await;
        network.set_offline(true);

        let result = registration.handle_fetch(client, &get("/index.html")).await;
        assert!(matches!(result, Err(Error::RequestFailed { .. })));
    }
}
