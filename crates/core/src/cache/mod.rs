//! SQLite-backed storage for cache containers.
//!
//! This module provides the persistent [`CacheStorage`](crate::storage::CacheStorage)
//! backend using SQLite with async access via tokio-rusqlite. It supports:
//!
//! - Content-addressed entry keys (SHA-256 of method and URL)
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Cascade deletion of a container's entries

pub mod connection;
pub mod containers;
pub mod entries;
pub mod hash;
pub mod migrations;

pub use crate::Error;

pub use connection::CacheDb;
