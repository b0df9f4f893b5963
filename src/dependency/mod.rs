//! The dependency abstraction.
//!
//! A dependency is an immutable query descriptor: it knows how to perform one
//! blocking fetch against one backend and how to compute a stable fingerprint
//! for deduplication. Concrete variants live in this module; the polling
//! loop that drives them lives in [`crate::view`].

mod catalog_services;
mod vault_list;
mod vault_read;
pub use catalog_services::*;
pub use vault_list::*;
pub use vault_read::*;

#[cfg(test)]
mod vault_list_test;

//---
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::constants::DEFAULT_WAIT_MS;
use crate::BlockingOptions;
use crate::ClientError;
use crate::ClientSet;
use crate::DependencyError;
use crate::KvVersion;
use crate::MountInfo;

/// Stable identity of a dependency. Two dependencies with equal fingerprints
/// are interchangeable: same view, same cache slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub(crate) fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Last-known version marker plus an optional wait-timeout hint, passed into
/// every fetch call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Version marker from the previous fetch; `None` on the first fetch
    pub wait_index: Option<u64>,
    /// How long the backend may hold the query open before answering
    /// "unchanged"; a default applies when unset
    pub wait_time: Option<Duration>,
}

impl QueryOptions {
    pub(crate) fn to_blocking(self) -> BlockingOptions {
        BlockingOptions {
            wait_index: self.wait_index.unwrap_or(0),
            wait_time: self.wait_time.unwrap_or(Duration::from_millis(DEFAULT_WAIT_MS)),
        }
    }
}

/// Version marker attached to a successful fetch. Monotonic per backend,
/// opaque otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseMetadata {
    pub last_index: u64,
}

/// A successful fetch result.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched {
    pub value: DependencyValue,
    pub meta: ResponseMetadata,
}

/// Backend-specific payloads, one variant per dependency kind. Value equality
/// is what the view uses to suppress notifications for no-op updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DependencyValue {
    /// Entry names from a list-style query
    Entries(Vec<String>),
    /// Contents of a single secret
    Secret(VaultSecret),
    /// Service catalog listing
    Services(Vec<CatalogService>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultSecret {
    pub data: HashMap<String, String>,
    /// Advisory lease length reported by the backend; consumed by the lease
    /// renewal scheduler, not by the watch core
    #[serde(default)]
    pub lease_duration_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogService {
    pub name: String,
    pub tags: Vec<String>,
}

/// A polymorphic query descriptor.
///
/// Implementations must observe the cancellation token at entry and at every
/// suspension point of `fetch`, returning [`DependencyError::Stopped`]
/// promptly when it fires, even mid-wait.
#[async_trait]
pub trait Dependency: fmt::Display + Send + Sync + 'static {
    /// Perform exactly one blocking call against the backend. Success with an
    /// unchanged version marker is a valid no-op answer, not an error.
    async fn fetch(
        &self,
        clients: &ClientSet,
        opts: &QueryOptions,
        cancel: &CancellationToken,
    ) -> std::result::Result<Fetched, DependencyError>;

    /// Pure, deterministic identity; equal for value-equal descriptors. The
    /// canonical display form serves as the identity.
    fn fingerprint(&self) -> Fingerprint {
        Fingerprint::new(self.to_string())
    }
}

/// Drive one fetch outside continuous-watch mode with an overall deadline.
/// The call returns [`DependencyError::Timeout`] instead of blocking past the
/// deadline; transient errors propagate to the caller instead of being
/// retried.
pub async fn fetch_with_deadline(
    dependency: &dyn Dependency,
    clients: &ClientSet,
    opts: &QueryOptions,
    cancel: &CancellationToken,
    deadline: Duration,
) -> std::result::Result<Fetched, DependencyError> {
    match tokio::time::timeout(deadline, dependency.fetch(clients, opts, cancel)).await {
        Ok(res) => res,
        Err(_) => Err(DependencyError::Timeout(deadline)),
    }
}

/// Race a backend call against the cancellation token so a blocked long-poll
/// returns within a bounded interval once stop is requested.
pub(crate) async fn with_cancellation<T, F>(
    cancel: &CancellationToken,
    fut: F,
) -> std::result::Result<T, DependencyError>
where
    F: Future<Output = std::result::Result<T, ClientError>>,
{
    if cancel.is_cancelled() {
        return Err(DependencyError::Stopped);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(DependencyError::Stopped),
        res = fut => res.map_err(DependencyError::from),
    }
}

/// Strip leading and trailing separators from a raw path argument.
pub(crate) fn normalize_path(raw: &str) -> String {
    raw.trim_matches('/').to_string()
}

/// Rewrite a logical secret path into the API-versioned request path. KV v1
/// paths pass through untouched; KV v2 splices `data`/`metadata` between the
/// mount point and the rest of the path.
pub(crate) fn rewrite_kv_path(path: &str, mount: &MountInfo, segment: &str) -> String {
    match mount.version {
        KvVersion::V1 => path.to_string(),
        KvVersion::V2 => {
            let mount_path = mount.path.trim_matches('/');
            let rest = match path.strip_prefix(mount_path) {
                Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
                _ => path,
            };
            if rest.is_empty() {
                format!("{}/{}", mount_path, segment)
            } else {
                format!("{}/{}/{}", mount_path, segment, rest)
            }
        }
    }
}
