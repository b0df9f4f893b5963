//! In-memory backends with real blocking-query semantics.
//!
//! The fakes keep a monotonically increasing revision per store. A call with
//! a non-zero wait index holds until the revision moves past it or the
//! requested wait time elapses, exactly the contract a real backend client
//! implementation must satisfy.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::BackendResponse;
use crate::BlockingOptions;
use crate::CatalogService;
use crate::ClientError;
use crate::ConsulBackend;
use crate::KvVersion;
use crate::MountInfo;
use crate::VaultBackend;
use crate::VaultSecret;

use super::secret;

struct VaultState {
    secrets: BTreeMap<String, VaultSecret>,
    revision: u64,
}

/// Single-mount in-memory secret store.
pub struct FakeVault {
    mount: MountInfo,
    state: Mutex<VaultState>,
    notify: Notify,
    fail_times: AtomicUsize,
}

impl FakeVault {
    pub fn new(mount_path: &str, version: KvVersion) -> Arc<Self> {
        Arc::new(Self {
            mount: MountInfo {
                path: mount_path.trim_matches('/').to_string(),
                version,
            },
            state: Mutex::new(VaultState {
                secrets: BTreeMap::new(),
                revision: 1,
            }),
            notify: Notify::new(),
            fail_times: AtomicUsize::new(0),
        })
    }

    /// Store a secret at `relative_path` under the mount; bumps the revision
    /// and wakes blocked queries.
    pub fn create_secret(&self, relative_path: &str, pairs: &[(&str, &str)]) {
        {
            let mut state = self.state.lock();
            state
                .secrets
                .insert(relative_path.trim_matches('/').to_string(), secret(pairs));
            state.revision += 1;
        }
        self.notify.notify_waiters();
    }

    /// Force the revision to an arbitrary value, e.g. to simulate a backend
    /// whose version marker went backwards.
    pub fn set_revision(&self, revision: u64) {
        self.state.lock().revision = revision;
        self.notify.notify_waiters();
    }

    /// Make the next `n` calls fail with a transport error.
    pub fn fail_next(&self, n: usize) {
        self.fail_times.store(n, Ordering::SeqCst);
    }

    fn take_failure(&self) -> bool {
        self.fail_times
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    async fn wait_for_change(&self, opts: &BlockingOptions) {
        let deadline = tokio::time::Instant::now() + opts.wait_time;
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            if self.state.lock().revision > opts.wait_index {
                return;
            }
            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep_until(deadline) => return,
            }
        }
    }

    /// Translate an API request path into a mount-relative key prefix.
    /// Returns `None` when the path shape does not match the engine version,
    /// e.g. a KV v2 store queried without its `metadata`/`data` segment.
    fn resolve(&self, path: &str, segment: &str) -> Option<String> {
        let path = path.trim_matches('/');
        let rest = match path.strip_prefix(self.mount.path.as_str()) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
            _ => path,
        };
        match self.mount.version {
            KvVersion::V1 => Some(rest.to_string()),
            KvVersion::V2 => match rest.strip_prefix(segment) {
                Some(sub) if sub.is_empty() => Some(String::new()),
                Some(sub) if sub.starts_with('/') => Some(sub.trim_start_matches('/').to_string()),
                _ => None,
            },
        }
    }

    fn list_children(state: &VaultState, prefix: &str) -> Option<Vec<String>> {
        let mut children = BTreeSet::new();
        for key in state.secrets.keys() {
            let rel = if prefix.is_empty() {
                Some(key.as_str())
            } else {
                key.strip_prefix(prefix)
                    .and_then(|rest| rest.strip_prefix('/'))
            };
            if let Some(rel) = rel {
                match rel.split_once('/') {
                    Some((head, _)) => children.insert(format!("{}/", head)),
                    None => children.insert(rel.to_string()),
                };
            }
        }
        if children.is_empty() {
            None
        } else {
            Some(children.into_iter().collect())
        }
    }
}

#[async_trait]
impl VaultBackend for FakeVault {
    async fn mount_info(&self, _path: &str) -> std::result::Result<MountInfo, ClientError> {
        if self.take_failure() {
            return Err(ClientError::Unreachable("fake vault down".to_string()));
        }
        Ok(self.mount.clone())
    }

    async fn list(
        &self,
        path: &str,
        opts: &BlockingOptions,
    ) -> std::result::Result<BackendResponse<Option<Vec<String>>>, ClientError> {
        if self.take_failure() {
            return Err(ClientError::Unreachable("fake vault down".to_string()));
        }
        if opts.wait_index != 0 {
            self.wait_for_change(opts).await;
        }
        let state = self.state.lock();
        let value = self
            .resolve(path, "metadata")
            .and_then(|prefix| Self::list_children(&state, &prefix));
        Ok(BackendResponse {
            value,
            index: state.revision,
        })
    }

    async fn read(
        &self,
        path: &str,
        opts: &BlockingOptions,
    ) -> std::result::Result<BackendResponse<Option<VaultSecret>>, ClientError> {
        if self.take_failure() {
            return Err(ClientError::Unreachable("fake vault down".to_string()));
        }
        if opts.wait_index != 0 {
            self.wait_for_change(opts).await;
        }
        let state = self.state.lock();
        let value = self
            .resolve(path, "data")
            .and_then(|key| state.secrets.get(&key).cloned());
        Ok(BackendResponse {
            value,
            index: state.revision,
        })
    }
}

struct ConsulState {
    services: BTreeMap<String, Vec<String>>,
    index: u64,
}

/// In-memory service catalog with native blocking queries.
pub struct FakeConsul {
    state: Mutex<ConsulState>,
    notify: Notify,
    fail_times: AtomicUsize,
}

impl FakeConsul {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ConsulState {
                services: BTreeMap::new(),
                index: 1,
            }),
            notify: Notify::new(),
            fail_times: AtomicUsize::new(0),
        })
    }

    pub fn set_service(&self, name: &str, tags: &[&str]) {
        {
            let mut state = self.state.lock();
            state
                .services
                .insert(name.to_string(), tags.iter().map(|t| t.to_string()).collect());
            state.index += 1;
        }
        self.notify.notify_waiters();
    }

    /// Bump the catalog version without changing its content.
    pub fn touch(&self) {
        self.state.lock().index += 1;
        self.notify.notify_waiters();
    }

    /// Make the next `n` calls fail with a transport error.
    pub fn fail_next(&self, n: usize) {
        self.fail_times.store(n, Ordering::SeqCst);
    }

    fn take_failure(&self) -> bool {
        self.fail_times
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    async fn wait_for_change(&self, opts: &BlockingOptions) {
        let deadline = tokio::time::Instant::now() + opts.wait_time;
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            if self.state.lock().index > opts.wait_index {
                return;
            }
            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep_until(deadline) => return,
            }
        }
    }
}

#[async_trait]
impl ConsulBackend for FakeConsul {
    async fn catalog_services(
        &self,
        _datacenter: Option<String>,
        opts: &BlockingOptions,
    ) -> std::result::Result<BackendResponse<Vec<CatalogService>>, ClientError> {
        if self.take_failure() {
            return Err(ClientError::Unreachable("fake consul down".to_string()));
        }
        if opts.wait_index != 0 {
            self.wait_for_change(opts).await;
        }
        let state = self.state.lock();
        let value = state
            .services
            .iter()
            .map(|(name, tags)| CatalogService {
                name: name.clone(),
                tags: tags.clone(),
            })
            .collect();
        Ok(BackendResponse {
            value,
            index: state.index,
        })
    }
}
