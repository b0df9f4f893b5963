// -
// Quiescence defaults

/// Minimum settle window after the first change of a batch
pub(crate) const DEFAULT_MIN_QUIESCE_MS: u64 = 500;
/// Upper bound on how long a batch may keep absorbing changes
pub(crate) const DEFAULT_MAX_QUIESCE_MS: u64 = 4000;

// -
// Polling defaults

/// Long-poll wait hint handed to backends when the consumer supplies none
pub(crate) const DEFAULT_WAIT_MS: u64 = 300_000;

/// View retry backoff defaults
pub(crate) const DEFAULT_BASE_DELAY_MS: u64 = 250;
pub(crate) const DEFAULT_MAX_DELAY_MS: u64 = 30_000;

// -
// Channel capacities

/// View -> coordinator event queue
pub(crate) const VIEW_EVENT_BUFFER: usize = 1024;
/// Coordinator -> consumer notification queue
pub(crate) const CHANGE_BUFFER: usize = 16;
/// Transient-error observation queue; overflow drops, never blocks
pub(crate) const ERROR_BUFFER: usize = 64;

// -
// Vault KV v2 path segments

pub(crate) const KV2_LIST_SEGMENT: &str = "metadata";
pub(crate) const KV2_READ_SEGMENT: &str = "data";
