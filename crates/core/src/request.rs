//! Request identity and stored response snapshots.

use bytes::Bytes;
use url::Url;

use crate::Error;
use crate::cache::hash::compute_entry_key;

/// An intercepted request: method plus absolute URL.
///
/// Fragments are dropped on construction, so `page.html#top` and `page.html`
/// share one cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Request {
    method: String,
    url: Url,
}

impl Request {
    pub fn new(method: &str, mut url: Url) -> Self {
        url.set_fragment(None);
        Self { method: method.trim().to_ascii_uppercase(), url }
    }

    /// Resolve `raw` (absolute or root-relative) against `base`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUrl` if `raw` does not parse or resolves to a
    /// non-http(s) scheme, and `Error::InvalidInput` for an empty method.
    pub fn resolve(method: &str, raw: &str, base: &Url) -> Result<Self, Error> {
        if method.trim().is_empty() {
            return Err(Error::InvalidInput("method cannot be empty".into()));
        }

        let url = base
            .join(raw.trim())
            .map_err(|e| Error::InvalidUrl(format!("{raw}: {e}")))?;

        match url.scheme() {
            "http" | "https" => Ok(Self::new(method, url)),
            scheme => Err(Error::InvalidUrl(format!("unsupported scheme: {scheme}"))),
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    /// Content-addressed key of this request's identity.
    pub fn key(&self) -> String {
        compute_entry_key(&self.method, self.url.as_str())
    }
}

/// Snapshot of a response: enough to replay it verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Final URL after redirects.
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Response {
    pub fn new(url: impl Into<String>, status: u16, headers: Vec<(String, String)>, body: impl Into<Bytes>) -> Self {
        Self { url: url.into(), status, headers, body: body.into() }
    }

    /// True for 2xx statuses, the only ones worth caching lazily.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup; first match wins.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
