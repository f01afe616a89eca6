//! Client code for sitecache.
//!
//! This crate provides the HTTP network the cache manager fetches through,
//! plus origin canonicalization shared by the server.

pub mod fetch;

pub use fetch::{FetchConfig, HttpNetwork, UrlError, canonicalize_origin};
