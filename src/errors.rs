//! Dependency-Watching Error Hierarchy
//!
//! Defines error types for the watch core, categorized by where they arise:
//! dependency construction and fetching, backend transport, configuration
//! loading and coordinator lifecycle.

use std::time::Duration;

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Dependency construction and polling failures
    #[error(transparent)]
    Dependency(#[from] DependencyError),

    /// Backend transport failures
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Configuration validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Coordinator registry and lifecycle failures
    #[error(transparent)]
    Watch(#[from] WatchError),
}

/// Errors produced by a [`crate::Dependency`] factory or fetch call.
#[derive(Debug, thiserror::Error)]
pub enum DependencyError {
    /// Malformed dependency arguments, surfaced at construction, never retried
    #[error("invalid argument for {query}: {reason}")]
    InvalidArgument {
        query: &'static str,
        reason: String,
    },

    /// Polling was deliberately stopped. Distinct from every other kind so a
    /// caller driving the polling loop can tell intentional shutdown apart
    /// from backend failure.
    #[error("dependency polling stopped")]
    Stopped,

    /// A consumer-supplied overall deadline on a single fetch elapsed
    #[error("fetch deadline elapsed after {0:?}")]
    Timeout(Duration),

    /// A read-style query against a path that holds no secret
    #[error("no secret exists at {path}")]
    NotFound { path: String },

    /// Transient backend failure; absorbed by the view retry loop
    #[error(transparent)]
    Client(#[from] ClientError),
}

impl DependencyError {
    /// Whether this error is the stop sentinel.
    pub fn is_stopped(&self) -> bool {
        matches!(self, DependencyError::Stopped)
    }
}

/// Transport-level failures reported by a backend client implementation.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Backend endpoint unreachable
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    /// Backend answered with a non-success status
    #[error("backend returned {status}: {message}")]
    Status { status: u16, message: String },

    /// Backend answered with a payload the client could not interpret
    #[error("malformed backend response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The handle was never issued or was already unregistered
    #[error("unknown watch handle {0}")]
    UnknownHandle(u64),

    /// Registration attempted after shutdown
    #[error("watcher is shut down")]
    ShutDown,

    /// Not every view acknowledged the stop within the shutdown bound
    #[error("shutdown timed out after {timeout:?} with {pending} views still running")]
    ShutdownTimeout { timeout: Duration, pending: usize },
}
