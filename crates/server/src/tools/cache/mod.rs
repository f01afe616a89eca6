//! Cache lifecycle MCP tools.
//!
//! This module provides tools for installing generations and inspecting the
//! container store.

pub mod install;
pub mod status;

pub use install::{CacheInstallParams, install_impl};
pub use status::{CacheStatusParams, status_impl};
