//! Unified error types for sitecache.
//!
//! Every variant renders with an upper-case code prefix so log lines and tool
//! errors can be grepped by failure class.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

use crate::network::NetworkError;

/// Unified error type for the cache manager, its storage and its host.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A manifest asset could not be fetched while populating a generation.
    #[error("INSTALL_FAILED: {generation}: {path}: {source}")]
    Install {
        generation: String,
        path: String,
        #[source]
        source: NetworkError,
    },

    /// Activation was attempted from a state that does not allow it.
    #[error("ACTIVATION_FAILED: {0}")]
    Activation(String),

    /// Network fetch failed and no cached copy exists for the request.
    #[error("REQUEST_FAILED: {method} {url}: {source}")]
    RequestFailed {
        method: String,
        url: String,
        #[source]
        source: NetworkError,
    },

    /// Lifecycle operation invoked in the wrong worker state.
    #[error("INVALID_STATE: {0}")]
    InvalidState(String),

    /// Invalid input parameters (e.g., empty manifest entry).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Stored entry could not be encoded or decoded.
    #[error("CACHE_ERROR: serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let code = match &err {
            Error::InvalidInput(_) => -32602,
            Error::Install { .. } => -32000,
            Error::Activation(_) => -32001,
            Error::RequestFailed { .. } => -32003,
            Error::InvalidState(_) => -32004,
            Error::InvalidUrl(_) => -32005,
            Error::Database(_) | Error::MigrationFailed(_) | Error::Serialization(_) => -32002,
        };

        McpError { code: ErrorCode(code), message: err.to_string().into(), data: None }
    }
}
