//! The coordinator.
//!
//! Owns the set of active views, deduplicates identical dependencies by
//! fingerprint (reference counting), collects their change signals through a
//! single event queue and applies a quiescence window so a burst of backend
//! changes produces one downstream notification instead of many.
//!
//! Registry mutations are linearized behind one lock; change aggregation and
//! the quiescence timer live in a dedicated coordination loop task.

mod quiescence;
use quiescence::QuiescenceTimer;

#[cfg(test)]
mod quiescence_test;

use std::collections::BTreeSet;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep_until;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::trace;
use tracing::warn;

use crate::constants::CHANGE_BUFFER;
use crate::constants::ERROR_BUFFER;
use crate::constants::VIEW_EVENT_BUFFER;
use crate::view::View;
use crate::view::ViewEvent;
use crate::Brain;
use crate::CacheEntry;
use crate::ClientSet;
use crate::Dependency;
use crate::Fingerprint;
use crate::PollError;
use crate::QuiescenceConfig;
use crate::WatchError;
use crate::WatchSettings;

/// One settled batch of changes: every fingerprint that changed since the
/// previous notification. The consumer re-reads the cache for each
/// dependency it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    /// Sorted, deduplicated
    pub fingerprints: Vec<Fingerprint>,
}

/// Proof of one registration. Feed it back to [`Watcher::unregister`];
/// dropping it without unregistering deliberately keeps the view alive.
#[derive(Debug)]
pub struct WatchHandle {
    id: u64,
    fingerprint: Fingerprint,
}

impl WatchHandle {
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }
}

struct ViewEntry {
    refcount: usize,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

struct Registry {
    views: HashMap<Fingerprint, ViewEntry>,
    handles: HashMap<u64, Fingerprint>,
    next_handle_id: u64,
}

pub struct Watcher {
    clients: Arc<ClientSet>,
    brain: Arc<Brain>,
    settings: WatchSettings,
    registry: Mutex<Registry>,
    event_tx: mpsc::Sender<ViewEvent>,
    change_rx: Option<mpsc::Receiver<ChangeSet>>,
    error_rx: Option<mpsc::Receiver<PollError>>,
    shutdown: CancellationToken,
    coordinator: Option<JoinHandle<()>>,
}

impl Watcher {
    /// Build the watcher and start its coordination loop. Must be called
    /// from within a tokio runtime.
    pub fn new(clients: Arc<ClientSet>, settings: WatchSettings) -> Self {
        let brain = Arc::new(Brain::new());
        let (event_tx, event_rx) = mpsc::channel(VIEW_EVENT_BUFFER);
        let (change_tx, change_rx) = mpsc::channel(CHANGE_BUFFER);
        let (error_tx, error_rx) = mpsc::channel(ERROR_BUFFER);
        let shutdown = CancellationToken::new();

        let coordinator = tokio::spawn(coordinate(
            event_rx,
            change_tx,
            error_tx,
            settings.quiescence,
            shutdown.child_token(),
        ));

        Self {
            clients,
            brain,
            settings,
            registry: Mutex::new(Registry {
                views: HashMap::new(),
                handles: HashMap::new(),
                next_handle_id: 1,
            }),
            event_tx,
            change_rx: Some(change_rx),
            error_rx: Some(error_rx),
            shutdown,
            coordinator: Some(coordinator),
        }
    }

    /// Declare interest in a dependency. The first registration of a
    /// fingerprint spawns its view; later registrations of an equal
    /// dependency share it.
    pub fn register(&self, dependency: Arc<dyn Dependency>) -> std::result::Result<WatchHandle, WatchError> {
        if self.shutdown.is_cancelled() {
            return Err(WatchError::ShutDown);
        }

        let fingerprint = dependency.fingerprint();
        let mut registry = self.registry.lock();

        match registry.views.get_mut(&fingerprint) {
            Some(entry) => {
                entry.refcount += 1;
                debug!("{} already watched, refcount now {}", dependency, entry.refcount);
            }
            None => {
                let cancel = self.shutdown.child_token();
                let view = View::new(
                    dependency.clone(),
                    self.clients.clone(),
                    self.brain.clone(),
                    self.settings.retry,
                    self.settings.default_wait(),
                    cancel.clone(),
                    self.event_tx.clone(),
                );
                let task = tokio::spawn(view.run());
                registry.views.insert(
                    fingerprint.clone(),
                    ViewEntry {
                        refcount: 1,
                        cancel,
                        task,
                    },
                );
                info!("watching {}", dependency);
            }
        }

        let id = registry.next_handle_id;
        registry.next_handle_id += 1;
        registry.handles.insert(id, fingerprint.clone());
        Ok(WatchHandle { id, fingerprint })
    }

    /// Withdraw one registration. The last one for a fingerprint stops its
    /// view and purges the cache entry.
    pub fn unregister(&self, handle: WatchHandle) -> std::result::Result<(), WatchError> {
        let mut registry = self.registry.lock();
        let fingerprint = registry
            .handles
            .remove(&handle.id)
            .ok_or(WatchError::UnknownHandle(handle.id))?;

        let remove = match registry.views.get_mut(&fingerprint) {
            Some(entry) => {
                entry.refcount -= 1;
                entry.refcount == 0
            }
            None => {
                warn!("no view found for {} during unregister", fingerprint);
                false
            }
        };

        if remove {
            if let Some(entry) = registry.views.remove(&fingerprint) {
                entry.cancel.cancel();
                // detached: the task winds down on its own once the in-flight
                // fetch observes the token
                drop(entry.task);
            }
            self.brain.forget(&fingerprint);
            info!("stopped watching {}", fingerprint);
        }
        Ok(())
    }

    /// Number of live views, i.e. distinct fingerprints being polled.
    pub fn watching(&self) -> usize {
        self.registry.lock().views.len()
    }

    /// Take the change-notification stream. One stream per watcher; returns
    /// `None` once taken.
    pub fn changes(&mut self) -> Option<ReceiverStream<ChangeSet>> {
        self.change_rx.take().map(ReceiverStream::new)
    }

    /// Take the transient-error observation stream the consumer may log.
    pub fn errors(&mut self) -> Option<ReceiverStream<PollError>> {
        self.error_rx.take().map(ReceiverStream::new)
    }

    pub fn cache_get(&self, fingerprint: &Fingerprint) -> Option<CacheEntry> {
        self.brain.get(fingerprint)
    }

    /// Shared cache handle for collaborators that read it directly (the
    /// rendering layer, the lease renewal scheduler).
    pub fn brain(&self) -> Arc<Brain> {
        self.brain.clone()
    }

    /// Stop every view and the coordination loop, then wait (bounded) for
    /// their acknowledgment.
    pub async fn shutdown(mut self, timeout: Duration) -> std::result::Result<(), WatchError> {
        info!("watcher shutting down");
        self.shutdown.cancel();

        let mut tasks: Vec<JoinHandle<()>> = {
            let mut registry = self.registry.lock();
            registry.handles.clear();
            registry.views.drain().map(|(_, entry)| entry.task).collect()
        };
        if let Some(coordinator) = self.coordinator.take() {
            tasks.push(coordinator);
        }

        let deadline = tokio::time::Instant::now() + timeout;
        let mut pending = 0usize;
        for task in tasks {
            match tokio::time::timeout_at(deadline, task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => warn!("watch task ended abnormally: {}", join_err),
                Err(_) => pending += 1,
            }
        }

        if pending > 0 {
            return Err(WatchError::ShutdownTimeout { timeout, pending });
        }
        debug!("watcher shutdown complete");
        Ok(())
    }
}

/// The coordination loop: single consumer of view events, single owner of the
/// quiescence timer and of the pending batch.
async fn coordinate(
    mut event_rx: mpsc::Receiver<ViewEvent>,
    change_tx: mpsc::Sender<ChangeSet>,
    error_tx: mpsc::Sender<PollError>,
    quiescence: QuiescenceConfig,
    shutdown: CancellationToken,
) {
    let mut pending: BTreeSet<Fingerprint> = BTreeSet::new();
    let mut timer: Option<QuiescenceTimer> = None;

    loop {
        let deadline = timer.as_ref().map(|t| t.next_deadline());
        let settle = async {
            match deadline {
                Some(at) => sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            // Use biased to ensure branch order
            biased;
            // P0: shutdown received
            _ = shutdown.cancelled() => {
                debug!("coordinator shutdown signal received");
                return;
            }
            // P1: the batch settled, notify once
            _ = settle => {
                timer = None;
                let batch = ChangeSet {
                    fingerprints: pending.iter().cloned().collect(),
                };
                pending.clear();
                debug!("notifying {} changed dependencies", batch.fingerprints.len());
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => return,
                    sent = change_tx.send(batch) => if sent.is_err() {
                        warn!("change stream dropped, notification lost");
                    }
                }
            }
            // P2: view events
            Some(event) = event_rx.recv() => match event {
                ViewEvent::Changed { fingerprint, last_index } => {
                    trace!("{} changed (index {})", fingerprint, last_index);
                    pending.insert(fingerprint);
                    match timer.as_mut() {
                        Some(t) => t.extend(),
                        None => {
                            timer = Some(QuiescenceTimer::new(
                                quiescence.min_wait(),
                                quiescence.max_wait(),
                            ));
                        }
                    }
                }
                ViewEvent::Errored(observation) => {
                    warn!(
                        "{} poll error (attempt {}): {}",
                        observation.fingerprint, observation.attempt, observation.message
                    );
                    // observations are diagnostics; the retry already happened
                    // inside the view, so overflow drops rather than blocks
                    if error_tx.try_send(observation).is_err() {
                        trace!("error stream full or dropped, observation discarded");
                    }
                }
            }
        }
    }
}
