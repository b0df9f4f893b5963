use std::time::Duration;

use tokio::time::Instant;

/// Settle window for one notification batch.
///
/// Armed by the first change event of a batch. Every further event pushes the
/// min deadline out again; the max deadline is fixed at arm time so a steady
/// stream of changes cannot defer the notification forever.
#[derive(Clone, Debug)]
pub(crate) struct QuiescenceTimer {
    min_wait: Duration,
    min_deadline: Instant,
    max_deadline: Instant,
}

impl QuiescenceTimer {
    pub(crate) fn new(min_wait: Duration, max_wait: Duration) -> Self {
        let now = Instant::now();
        Self {
            min_wait,
            min_deadline: now + min_wait,
            max_deadline: now + max_wait,
        }
    }

    /// Another change arrived: re-arm the min deadline, leave max untouched.
    pub(crate) fn extend(&mut self) {
        self.min_deadline = Instant::now() + self.min_wait;
    }

    pub(crate) fn next_deadline(&self) -> Instant {
        self.min_deadline.min(self.max_deadline)
    }

    pub(crate) fn remaining(&self) -> Duration {
        self.next_deadline().saturating_duration_since(Instant::now())
    }

    pub(crate) fn is_expired(&self) -> bool {
        self.next_deadline() <= Instant::now()
    }
}
