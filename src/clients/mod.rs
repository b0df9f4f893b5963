//! Backend client collaborators.
//!
//! The watch core does not construct network clients and does not know their
//! transport details; it only asks them to perform backend operations through
//! the traits below. Blocking ("long poll") behavior lives behind these
//! traits: a call may legitimately hold for seconds to minutes until the
//! backend observes a change or its server-side wait elapses.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
#[cfg(test)]
use mockall::automock;
use serde::Deserialize;
use tracing::debug;

use crate::CatalogService;
use crate::ClientError;
use crate::VaultSecret;

/// Long-poll parameters in backend form, translated from
/// [`crate::QueryOptions`] by each dependency's fetch implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockingOptions {
    /// Last-seen version marker; 0 asks the backend to answer immediately
    pub wait_index: u64,
    /// Server-side hold time before an unchanged answer is returned
    pub wait_time: Duration,
}

/// A backend answer plus the version marker it was observed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendResponse<T> {
    pub value: T,
    pub index: u64,
}

/// KV secret engine API shapes. Different backend configurations expose the
/// same logical store at different API-versioned paths.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum KvVersion {
    V1,
    V2,
}

/// Outcome of the one-time mount probe for a secret path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountInfo {
    /// Mount point, no leading or trailing separator (e.g. `secret`)
    pub path: String,
    pub version: KvVersion,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait VaultBackend: Send + Sync + 'static {
    /// Resolve the mount point and KV engine version serving `path`.
    async fn mount_info(&self, path: &str) -> std::result::Result<MountInfo, ClientError>;

    /// List the entry names directly under `path`. `None` means the path does
    /// not exist; the version marker is still reported.
    async fn list(
        &self,
        path: &str,
        opts: &BlockingOptions,
    ) -> std::result::Result<BackendResponse<Option<Vec<String>>>, ClientError>;

    /// Read the secret stored at `path`. `None` means no secret exists there.
    async fn read(
        &self,
        path: &str,
        opts: &BlockingOptions,
    ) -> std::result::Result<BackendResponse<Option<VaultSecret>>, ClientError>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ConsulBackend: Send + Sync + 'static {
    /// List the service catalog, optionally scoped to one datacenter.
    async fn catalog_services(
        &self,
        datacenter: Option<String>,
        opts: &BlockingOptions,
    ) -> std::result::Result<BackendResponse<Vec<CatalogService>>, ClientError>;
}

/// One handle per backend, shared by every view.
///
/// Also carries the per-mount KV API-version probe cache so the probe runs
/// once per client set and mount, not once per fetch.
pub struct ClientSet {
    vault: Arc<dyn VaultBackend>,
    consul: Arc<dyn ConsulBackend>,
    kv_mounts: DashMap<String, MountInfo>,
}

impl ClientSet {
    pub fn new(vault: Arc<dyn VaultBackend>, consul: Arc<dyn ConsulBackend>) -> Self {
        Self {
            vault,
            consul,
            kv_mounts: DashMap::new(),
        }
    }

    pub fn vault(&self) -> &dyn VaultBackend {
        self.vault.as_ref()
    }

    pub fn consul(&self) -> &dyn ConsulBackend {
        self.consul.as_ref()
    }

    /// Mount info for the given normalized secret path, probing the backend
    /// on first use and caching per mount point afterwards.
    pub(crate) async fn kv_mount_for(&self, path: &str) -> std::result::Result<MountInfo, ClientError> {
        let mount_key = path.split('/').next().unwrap_or(path).to_string();
        if let Some(cached) = self.kv_mounts.get(&mount_key) {
            return Ok(cached.value().clone());
        }

        let info = self.vault.mount_info(path).await?;
        debug!("resolved mount for {}: {:?}", path, info);
        self.kv_mounts.insert(mount_key, info.clone());
        Ok(info)
    }
}
