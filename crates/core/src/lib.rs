//! Core types and shared functionality for sitecache.
//!
//! This crate provides:
//! - The offline asset cache manager and its lifecycle state machine
//! - Manifest-driven request routing (cache-first / network-first)
//! - Named-container storage with SQLite and in-memory backends
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod manifest;
pub mod network;
pub mod registration;
pub mod request;
pub mod storage;
pub mod worker;

#[cfg(test)]
mod testing;

pub use cache::CacheDb;
pub use config::{AppConfig, ConfigError, StorageBackend};
pub use error::Error;
pub use manifest::{Manifest, Route};
pub use network::{Network, NetworkError};
pub use registration::{ClientId, Registration};
pub use request::{Request, Response};
pub use storage::{CacheContainer, CacheStorage, CachedRequest, MemoryStorage};
pub use worker::{ActivationSummary, GenerationConfig, OfflineCache, ResponseSource, Served, WorkerState};
