//! Process-local storage backend.
//!
//! Uses ordered maps behind a tokio RwLock, so container names list in
//! lexical order and entries list in key-hash order. Contents vanish with the
//! process.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CacheContainer, CacheStorage, CachedRequest};
use crate::Error;
use crate::request::{Request, Response};

type Entries = BTreeMap<String, (CachedRequest, Response)>;
type Containers = BTreeMap<String, Entries>;

/// In-memory [`CacheStorage`].
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    containers: Arc<RwLock<Containers>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, name: &str) -> Result<Arc<dyn CacheContainer>, Error> {
        self.containers.write().await.entry(name.to_string()).or_default();
        Ok(Arc::new(MemoryContainer { name: name.to_string(), containers: Arc::clone(&self.containers) }))
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        Ok(self.containers.read().await.keys().cloned().collect())
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        Ok(self.containers.write().await.remove(name).is_some())
    }

    async fn has(&self, name: &str) -> Result<bool, Error> {
        Ok(self.containers.read().await.contains_key(name))
    }
}

/// Handle to one container of a [`MemoryStorage`].
///
/// `put` through a handle whose container was deleted fails; `add_all`
/// recreates it.
struct MemoryContainer {
    name: String,
    containers: Arc<RwLock<Containers>>,
}

#[async_trait]
impl CacheContainer for MemoryContainer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn match_request(&self, request: &Request) -> Result<Option<Response>, Error> {
        let containers = self.containers.read().await;
        Ok(containers
            .get(&self.name)
            .and_then(|entries| entries.get(&request.key()))
            .map(|(_, response)| response.clone()))
    }

    async fn put(&self, request: &Request, response: &Response) -> Result<(), Error> {
        let mut containers = self.containers.write().await;
        let entries = containers
            .get_mut(&self.name)
            .ok_or_else(|| Error::InvalidState(format!("container {} has been deleted", self.name)))?;
        entries.insert(request.key(), (CachedRequest::from(request), response.clone()));
        Ok(())
    }

    async fn add_all(&self, entries: Vec<(Request, Response)>) -> Result<(), Error> {
        let mut containers = self.containers.write().await;
        let container = containers.entry(self.name.clone()).or_default();
        for (request, response) in entries {
            container.insert(request.key(), (CachedRequest::from(&request), response));
        }
        Ok(())
    }

    async fn requests(&self) -> Result<Vec<CachedRequest>, Error> {
        let containers = self.containers.read().await;
        Ok(containers
            .get(&self.name)
            .map(|entries| entries.values().map(|(req, _)| req.clone()).collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn request(path: &str) -> Request {
        Request::resolve("GET", path, &Url::parse("http://localhost:8080/").unwrap()).unwrap()
    }

    fn response(body: &'static str) -> Response {
        Response::new("http://localhost:8080/", 200, Vec::new(), body)
    }

    #[tokio::test]
    async fn test_open_creates_container() {
        let storage = MemoryStorage::new();
        assert!(!storage.has("site-v1").await.unwrap());

        let cache = storage.open("site-v1").await.unwrap();
        assert_eq!(cache.name(), "site-v1");
        assert!(storage.has("site-v1").await.unwrap());
        assert_eq!(cache.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let storage = MemoryStorage::new();
        let cache = storage.open("site-v1").await.unwrap();
        let req = request("/index.html");

        cache.put(&req, &response("old")).await.unwrap();
        cache.put(&req, &response("new")).await.unwrap();

        let stored = cache.match_request(&req).await.unwrap().unwrap();
        assert_eq!(stored.body_text(), "new");
        assert_eq!(cache.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_containers_are_isolated() {
        let storage = MemoryStorage::new();
        let v1 = storage.open("site-v1").await.unwrap();
        let v2 = storage.open("site-v2").await.unwrap();
        let req = request("/assets/js/main.js");

        v1.put(&req, &response("v1")).await.unwrap();

        assert!(v2.match_request(&req).await.unwrap().is_none());
        assert_eq!(storage.keys().await.unwrap(), vec!["site-v1", "site-v2"]);
    }

    #[tokio::test]
    async fn test_put_after_delete_does_not_recreate() {
        let storage = MemoryStorage::new();
        let cache = storage.open("site-v1").await.unwrap();

        assert!(storage.delete("site-v1").await.unwrap());
        assert!(!storage.delete("site-v1").await.unwrap());
        assert!(cache.match_request(&request("/a.css")).await.unwrap().is_none());

        let result = cache.put(&request("/a.css"), &response("a")).await;
        assert!(matches!(result, Err(Error::InvalidState(_))));
        assert!(!storage.has("site-v1").await.unwrap());

        cache.add_all(vec![(request("/a.css"), response("a"))]).await.unwrap();
        assert!(storage.has("site-v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_add_all_lists_requests() {
        let storage = MemoryStorage::new();
        let cache = storage.open("site-v1").await.unwrap();
        cache
            .add_all(vec![(request("/a.css"), response("a")), (request("/b.js"), response("b"))])
            .await
            .unwrap();

        let mut urls: Vec<String> = cache.requests().await.unwrap().into_iter().map(|r| r.url).collect();
        urls.sort();
        assert_eq!(urls, vec!["http://localhost:8080/a.css", "http://localhost:8080/b.js"]);
    }
}
