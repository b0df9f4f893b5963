//! Per-dependency polling worker.
//!
//! A view owns exactly one dependency and runs an independent polling loop:
//! `Idle -> Fetching -> (Updated | Unchanged | Errored) -> Idle`, terminal
//! state `Stopped`. The long-poll itself provides the pacing: an unchanged
//! answer loops straight back into the next fetch, and an updated answer
//! re-polls immediately because the backend just proved something moved.


use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::trace;
use tracing::warn;

use crate::BackoffPolicy;
use crate::Brain;
use crate::ClientSet;
use crate::Dependency;
use crate::DependencyError;
use crate::Fetched;
use crate::Fingerprint;
use crate::QueryOptions;

/// Signals a view reports to the coordinator.
#[derive(Debug, Clone)]
pub(crate) enum ViewEvent {
    Changed {
        fingerprint: Fingerprint,
        last_index: u64,
    },
    Errored(PollError),
}

/// One transient polling failure, observable by the consumer for logging.
/// The view keeps retrying; nothing crashes on this path.
#[derive(Debug, Clone)]
pub struct PollError {
    pub fingerprint: Fingerprint,
    /// Consecutive-failure count at the time of this observation
    pub attempt: usize,
    pub message: String,
}

enum Flow {
    Continue,
    Stop,
}

pub(crate) struct View {
    dependency: Arc<dyn Dependency>,
    fingerprint: Fingerprint,
    clients: Arc<ClientSet>,
    brain: Arc<Brain>,
    retry: BackoffPolicy,
    wait_time: Duration,
    last_index: u64,
    retries: usize,
    cancel: CancellationToken,
    event_tx: mpsc::Sender<ViewEvent>,
}

impl View {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        dependency: Arc<dyn Dependency>,
        clients: Arc<ClientSet>,
        brain: Arc<Brain>,
        retry: BackoffPolicy,
        wait_time: Duration,
        cancel: CancellationToken,
        event_tx: mpsc::Sender<ViewEvent>,
    ) -> Self {
        let fingerprint = dependency.fingerprint();
        Self {
            dependency,
            fingerprint,
            clients,
            brain,
            retry,
            wait_time,
            last_index: 0,
            retries: 0,
            cancel,
            event_tx,
        }
    }

    pub(crate) async fn run(mut self) {
        debug!("view started: {}", self.dependency);
        loop {
            match self.poll().await {
                Flow::Continue => {}
                Flow::Stop => break,
            }
        }
        debug!("view stopped: {}", self.dependency);
    }

    /// One `Idle -> Fetching -> outcome` cycle.
    async fn poll(&mut self) -> Flow {
        if self.cancel.is_cancelled() {
            return Flow::Stop;
        }

        let opts = QueryOptions {
            wait_index: (self.last_index != 0).then_some(self.last_index),
            wait_time: Some(self.wait_time),
        };

        match self.dependency.fetch(&self.clients, &opts, &self.cancel).await {
            Ok(fetched) => self.handle_success(fetched).await,
            Err(err) if err.is_stopped() => Flow::Stop,
            Err(err) => self.handle_error(err).await,
        }
    }

    async fn handle_success(&mut self, fetched: Fetched) -> Flow {
        // the fetch may have completed in the same instant stop was raised;
        // no cache write may happen past that point
        if self.cancel.is_cancelled() {
            return Flow::Stop;
        }

        self.retries = 0;
        let index = fetched.meta.last_index;

        if index < self.last_index {
            // Version markers move forward; a regression means the backend
            // state was rebuilt. Start over with no marker.
            warn!(
                "{} index regressed ({} -> {}), resetting",
                self.dependency, self.last_index, index
            );
            self.last_index = 0;
            return Flow::Continue;
        }

        if index == self.last_index && self.last_index != 0 {
            trace!("{} unchanged at index {}", self.dependency, index);
            return Flow::Continue;
        }

        self.last_index = index;

        // A moved marker over an identical payload is still a no-op for the
        // consumer; remember the marker, skip the notification.
        if let Some(entry) = self.brain.get(&self.fingerprint) {
            if entry.value == fetched.value {
                trace!("{} value unchanged at index {}", self.dependency, index);
                self.brain.set(self.fingerprint.clone(), fetched.value, index);
                return Flow::Continue;
            }
        }

        debug!("{} changed at index {}", self.dependency, index);
        self.brain.set(self.fingerprint.clone(), fetched.value, index);
        self.send_event(ViewEvent::Changed {
            fingerprint: self.fingerprint.clone(),
            last_index: index,
        })
        .await
    }

    async fn handle_error(&mut self, err: DependencyError) -> Flow {
        self.retries += 1;
        warn!(
            "{} fetch failed (attempt {}): {}",
            self.dependency, self.retries, err
        );

        if let Flow::Stop = self
            .send_event(ViewEvent::Errored(PollError {
                fingerprint: self.fingerprint.clone(),
                attempt: self.retries,
                message: err.to_string(),
            }))
            .await
        {
            return Flow::Stop;
        }

        if self.retry.exhausted(self.retries) {
            error!(
                "{} giving up after {} consecutive failures",
                self.dependency, self.retries
            );
            return Flow::Stop;
        }

        let delay = self.retry.delay_for_attempt(self.retries);
        trace!("{} backing off {:?}", self.dependency, delay);
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Flow::Stop,
            _ = tokio::time::sleep(delay) => Flow::Continue,
        }
    }

    async fn send_event(&self, event: ViewEvent) -> Flow {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Flow::Stop,
            sent = self.event_tx.send(event) => match sent {
                Ok(()) => Flow::Continue,
                Err(_) => {
                    debug!("{} coordinator gone, stopping", self.dependency);
                    Flow::Stop
                }
            }
        }
    }
}
