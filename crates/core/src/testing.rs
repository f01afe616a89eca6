//! Fakes shared by unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Notify;
use url::Url;

use crate::Error;
use crate::network::{Network, NetworkError};
use crate::request::{Request, Response};
use crate::storage::{CacheContainer, CacheStorage, MemoryStorage};

pub fn origin() -> Url {
    Url::parse("http://localhost:8080/").unwrap()
}

/// Canned responses keyed by path; unknown paths answer 404.
#[derive(Default)]
pub struct StaticNetwork {
    pages: Mutex<HashMap<String, (u16, String)>>,
    unreachable: Mutex<HashSet<String>>,
    offline: AtomicBool,
    calls: AtomicUsize,
}

impl StaticNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, path: &str, status: u16, body: &str) {
        self.pages
            .lock()
            .unwrap()
            .insert(path.to_string(), (status, body.to_string()));
    }

    /// Make a single path fail at the transport level.
    pub fn fail(&self, path: &str) {
        self.unreachable.lock().unwrap().insert(path.to_string());
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Network for StaticNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let path = request.path();

        if self.offline.load(Ordering::SeqCst) || self.unreachable.lock().unwrap().contains(path) {
            return Err(NetworkError::Unreachable(format!("{} is unreachable", request.url())));
        }

        let (status, body) = self
            .pages
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .unwrap_or((404, "not found".to_string()));

        Ok(Response::new(request.url().as_str(), status, Vec::new(), body))
    }
}

/// Memory storage whose `delete` fails for one container name.
pub struct UndeletableStorage {
    inner: MemoryStorage,
    stuck: String,
}

impl UndeletableStorage {
    pub fn new(inner: MemoryStorage, stuck: &str) -> Self {
        Self { inner, stuck: stuck.to_string() }
    }
}

#[async_trait]
impl CacheStorage for UndeletableStorage {
    async fn open(&self, name: &str) -> Result<Arc<dyn CacheContainer>, Error> {
        self.inner.open(name).await
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.inner.keys().await
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        if name == self.stuck {
            return Err(Error::InvalidInput(format!("{name} is locked")));
        }
        self.inner.delete(name).await
    }
}

/// Memory storage whose `keys` always fails.
pub struct UnlistableStorage {
    inner: MemoryStorage,
}

impl UnlistableStorage {
    pub fn new(inner: MemoryStorage) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl CacheStorage for UnlistableStorage {
    async fn open(&self, name: &str) -> Result<Arc<dyn CacheContainer>, Error> {
        self.inner.open(name).await
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        Err(Error::InvalidState("container listing unavailable".into()))
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        self.inner.delete(name).await
    }
}

/// Wraps a [`StaticNetwork`], holding requests for one path until released.
pub struct GatedNetwork {
    inner: Arc<StaticNetwork>,
    path: String,
    entered: Notify,
    release: Notify,
}

impl GatedNetwork {
    pub fn new(inner: Arc<StaticNetwork>, path: &str) -> Self {
        Self { inner, path: path.to_string(), entered: Notify::new(), release: Notify::new() }
    }

    /// Wait until a request for the gated path is parked inside `fetch`.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl Network for GatedNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
        if request.path() == self.path {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.fetch(request).await
    }
}
