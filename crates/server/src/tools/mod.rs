//! MCP tool implementations.
//!
//! This module contains all tools exposed by the sitecache server.

pub mod cache;
pub mod site_fetch;
pub mod site_route;

pub use site_fetch::{SiteFetchParams, fetch_impl};
pub use site_route::{CacheRouteParams, route_impl};
