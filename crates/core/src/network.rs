//! Network seam consumed by the cache manager.
//!
//! The manager never talks to a socket itself; hosts inject a [`Network`]
//! (HTTP in production, canned responses in tests).

use async_trait::async_trait;

use crate::request::{Request, Response};

/// Transport-level fetch failures.
///
/// An HTTP error status is not a `NetworkError`: a 404 or 500 arrives as an
/// ordinary [`Response`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    /// Connection refused, DNS failure, reset, TLS failure.
    #[error("unreachable: {0}")]
    Unreachable(String),

    /// The transport gave up waiting.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The response body exceeded the configured byte limit.
    #[error("response too large: {0}")]
    TooLarge(String),
}

/// Something that can turn a request into a response.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError>;
}
