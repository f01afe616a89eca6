//! sitecache server entry point.
//!
//! This is the main binary that boots the MCP server on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use sitecache_client::{FetchConfig, HttpNetwork, canonicalize_origin};
use sitecache_core::{AppConfig, CacheDb, CacheStorage, MemoryStorage, Registration, StorageBackend};
use tracing_subscriber::EnvFilter;

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let mut config = AppConfig::load().context("loading configuration")?;
    let origin = canonicalize_origin(&config.origin).context("invalid origin")?;
    config.origin = origin.to_string();

    tracing::info!(
        generation = %config.generation,
        origin = %origin,
        storage = ?config.storage,
        "Starting sitecache server on stdio transport"
    );

    let storage: Arc<dyn CacheStorage> = match config.storage {
        StorageBackend::Sqlite => Arc::new(
            CacheDb::open(&config.db_path)
                .await
                .with_context(|| format!("opening cache database {}", config.db_path.display()))?,
        ),
        StorageBackend::Memory => Arc::new(MemoryStorage::new()),
    };
    let network = Arc::new(HttpNetwork::new(FetchConfig::from(&config))?);
    let registration = Arc::new(Registration::new(storage, network));

    match registration.register(config.generation_config()?).await {
        Ok(worker) => tracing::info!(generation = worker.generation(), "generation ready"),
        Err(e) => tracing::warn!(error = %e, "initial install failed; requests pass through to the network"),
    }

    let client = registration.connect_client().await;
    let handler = handler::SiteCacheServer::new(registration, client, Arc::new(config), origin);
    let server = serve_server(handler, stdio()).await?;

    server.waiting().await?;

    Ok(())
}
