use std::fmt;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::normalize_path;
use super::rewrite_kv_path;
use super::with_cancellation;
use crate::constants::KV2_READ_SEGMENT;
use crate::ClientSet;
use crate::Dependency;
use crate::DependencyError;
use crate::DependencyValue;
use crate::Fetched;
use crate::QueryOptions;
use crate::ResponseMetadata;

/// Reads the secret stored at a single path.
///
/// Unlike a listing, a template that references a missing secret is a hard
/// miss: `fetch` surfaces [`DependencyError::NotFound`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultReadQuery {
    path: String,
}

impl VaultReadQuery {
    pub fn new(raw: &str) -> std::result::Result<Self, DependencyError> {
        let path = normalize_path(raw);
        if path.is_empty() {
            return Err(DependencyError::InvalidArgument {
                query: "vault.read",
                reason: "path is empty".to_string(),
            });
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for VaultReadQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vault.read({})", self.path)
    }
}

#[async_trait]
impl Dependency for VaultReadQuery {
    async fn fetch(
        &self,
        clients: &ClientSet,
        opts: &QueryOptions,
        cancel: &CancellationToken,
    ) -> std::result::Result<Fetched, DependencyError> {
        let mount = with_cancellation(cancel, clients.kv_mount_for(&self.path)).await?;
        let read_path = rewrite_kv_path(&self.path, &mount, KV2_READ_SEGMENT);

        let blocking = opts.to_blocking();
        debug!("{} polling {} (wait_index={})", self, read_path, blocking.wait_index);

        let resp = with_cancellation(cancel, clients.vault().read(&read_path, &blocking)).await?;

        let secret = resp.value.ok_or_else(|| DependencyError::NotFound {
            path: self.path.clone(),
        })?;

        Ok(Fetched {
            value: DependencyValue::Secret(secret),
            meta: ResponseMetadata { last_index: resp.index },
        })
    }
}
