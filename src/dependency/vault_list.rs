use std::fmt;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::normalize_path;
use super::rewrite_kv_path;
use super::with_cancellation;
use crate::constants::KV2_LIST_SEGMENT;
use crate::ClientSet;
use crate::Dependency;
use crate::DependencyError;
use crate::DependencyValue;
use crate::Fetched;
use crate::QueryOptions;
use crate::ResponseMetadata;

/// Lists the secret names directly under a path.
///
/// A missing path is a valid empty listing, not a failure: templates iterate
/// over the result, and "nothing there yet" renders as an empty loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultListQuery {
    path: String,
}

impl VaultListQuery {
    /// Build a list query from a raw path string. Leading and trailing
    /// separators are stripped; an empty normalized path is rejected.
    pub fn new(raw: &str) -> std::result::Result<Self, DependencyError> {
        let path = normalize_path(raw);
        if path.is_empty() {
            return Err(DependencyError::InvalidArgument {
                query: "vault.list",
                reason: "path is empty".to_string(),
            });
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for VaultListQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vault.list({})", self.path)
    }
}

#[async_trait]
impl Dependency for VaultListQuery {
    async fn fetch(
        &self,
        clients: &ClientSet,
        opts: &QueryOptions,
        cancel: &CancellationToken,
    ) -> std::result::Result<Fetched, DependencyError> {
        let mount = with_cancellation(cancel, clients.kv_mount_for(&self.path)).await?;
        let list_path = rewrite_kv_path(&self.path, &mount, KV2_LIST_SEGMENT);

        let blocking = opts.to_blocking();
        debug!("{} polling {} (wait_index={})", self, list_path, blocking.wait_index);

        let resp = with_cancellation(cancel, clients.vault().list(&list_path, &blocking)).await?;

        let mut entries = resp.value.unwrap_or_default();
        entries.sort();

        Ok(Fetched {
            value: DependencyValue::Entries(entries),
            meta: ResponseMetadata { last_index: resp.index },
        })
    }
}
