//! HTTP network for the cache manager.
//!
//! ### Behavior
//! - Any method, sent as-is; redirects followed up to `max_redirects`
//! - Every HTTP status is a response, including 4xx/5xx
//! - Transport failures map to [`NetworkError`]: timeouts to `Timeout`,
//!   everything else to `Unreachable`
//! - Bodies larger than `max_bytes` fail with `TooLarge`
//!
//! ### Origin
//! - `canonicalize_origin` normalizes the base URL that root-relative
//!   manifest paths and page requests resolve against.

pub mod url;

use async_trait::async_trait;
use reqwest::{Client, Method, header};
use sitecache_core::{AppConfig, Error, Network, NetworkError, Request, Response};
use std::time::{Duration, Instant};

pub use url::{UrlError, canonicalize_origin};

/// Configuration for the HTTP network.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "sitecache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "sitecache/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// reqwest-backed [`Network`].
pub struct HttpNetwork {
    http: Client,
    config: FetchConfig,
}

fn classify(err: reqwest::Error) -> NetworkError {
    if err.is_timeout() { NetworkError::Timeout(err.to_string()) } else { NetworkError::Unreachable(err.to_string()) }
}

impl HttpNetwork {
    /// Create a new HTTP network with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::InvalidInput(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    fn too_large(&self, len: usize) -> NetworkError {
        NetworkError::TooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes))
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
        let start = Instant::now();
        let method = Method::from_bytes(request.method().as_bytes())
            .map_err(|e| NetworkError::Unreachable(format!("invalid method {}: {e}", request.method())))?;

        let response = self
            .http
            .request(method, request.url().as_str())
            .send()
            .await
            .map_err(classify)?;

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(self.too_large(len as usize));
        }

        let status = response.status();
        let final_url = response.url().to_string();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect();

        let bytes = response.bytes().await.map_err(classify)?;

        if bytes.len() > self.config.max_bytes {
            return Err(self.too_large(bytes.len()));
        }

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            "fetched {} {} -> {} ({}) in {}ms ({} bytes, {})",
            request.method(),
            request.url(),
            final_url,
            status.as_u16(),
            fetch_ms,
            bytes.len(),
            headers
                .iter()
                .find(|(k, _)| k == header::CONTENT_TYPE.as_str())
                .map(|(_, v)| v.as_str())
                .unwrap_or("no content-type")
        );

        Ok(Response::new(final_url, status.as_u16(), headers, bytes))
    }
}
