//! Named-container key-value store consumed by the cache manager.
//!
//! A [`CacheStorage`] holds any number of containers addressed by name (one
//! per generation). Each [`CacheContainer`] maps request identity to a stored
//! [`Response`]. Writes to a single key are atomic and last-write-wins.
//!
//! Two backends ship with the crate:
//! - [`crate::cache::CacheDb`]: persistent, SQLite
//! - [`MemoryStorage`]: ephemeral, process-local

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Error;
use crate::request::{Request, Response};

pub use memory::MemoryStorage;

/// Identity of a stored entry as listed by [`CacheContainer::requests`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CachedRequest {
    pub method: String,
    pub url: String,
}

impl From<&Request> for CachedRequest {
    fn from(request: &Request) -> Self {
        Self { method: request.method().to_string(), url: request.url().to_string() }
    }
}

/// The set of named containers.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open the named container, creating it if absent.
    async fn open(&self, name: &str) -> Result<Arc<dyn CacheContainer>, Error>;

    /// Names of all existing containers.
    async fn keys(&self) -> Result<Vec<String>, Error>;

    /// Delete a container and every entry in it. Returns false if absent.
    async fn delete(&self, name: &str) -> Result<bool, Error>;

    async fn has(&self, name: &str) -> Result<bool, Error> {
        Ok(self.keys().await?.iter().any(|k| k == name))
    }
}

/// One named container of request → response entries.
#[async_trait]
pub trait CacheContainer: Send + Sync {
    fn name(&self) -> &str;

    /// Look up the stored response for this request's identity.
    async fn match_request(&self, request: &Request) -> Result<Option<Response>, Error>;

    /// Store (or overwrite) the response for this request's identity.
    ///
    /// Fails with `Error::InvalidState` once the container has been deleted.
    async fn put(&self, request: &Request, response: &Response) -> Result<(), Error>;

    /// Store a batch of entries; either all are written or none are.
    async fn add_all(&self, entries: Vec<(Request, Response)>) -> Result<(), Error>;

    /// Identities of every stored entry.
    async fn requests(&self) -> Result<Vec<CachedRequest>, Error>;

    async fn len(&self) -> Result<usize, Error> {
        Ok(self.requests().await?.len())
    }
}
