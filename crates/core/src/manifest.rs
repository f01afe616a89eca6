//! Asset manifest and per-request routing.
//!
//! The manifest is the ordered list of root-relative paths a generation
//! pre-caches at install time. Routing is a pure function of the request path
//! and the manifest:
//!
//! - a path ending with any manifest entry (leading `/` stripped) is
//!   [`Route::CacheFirst`]
//! - everything else is [`Route::NetworkFirst`]
//!
//! Matching is by suffix, so `/other/assets/js/main.js` also routes cache-first
//! when `/assets/js/main.js` is declared.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Error;
use crate::request::Request;

/// Routing policy chosen for a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    CacheFirst,
    NetworkFirst,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::CacheFirst => f.write_str("cache-first"),
            Route::NetworkFirst => f.write_str("network-first"),
        }
    }
}

/// Immutable, ordered list of core asset paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<String>,
}

impl Manifest {
    /// Build a manifest, rejecting entries that are not root-relative.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for an empty entry or one that does not
    /// start with `/`.
    pub fn new<I, S>(entries: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries: Vec<String> = entries.into_iter().map(Into::into).collect();

        for entry in &entries {
            if !entry.starts_with('/') || entry.len() < 2 {
                return Err(Error::InvalidInput(format!("manifest entry must be a root-relative path: {entry:?}")));
            }
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First entry whose path (minus its leading `/`) is a suffix of `path`.
    pub fn matching(&self, path: &str) -> Option<&str> {
        self.entries
            .iter()
            .map(String::as_str)
            .find(|entry| path.ends_with(entry.strip_prefix('/').unwrap_or(entry)))
    }

    /// Whether `path` names a core asset.
    pub fn matches(&self, path: &str) -> bool {
        self.matching(path).is_some()
    }

    pub fn route(&self, request: &Request) -> Route {
        if self.matches(request.path()) { Route::CacheFirst } else { Route::NetworkFirst }
    }
}
