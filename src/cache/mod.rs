//! Process-wide cache of the most recently fetched value per dependency.
//!
//! Written only by the view that owns each fingerprint; read by any number of
//! consumers (the rendering layer, the lease renewal scheduler). Entries are
//! locked individually, so readers and the single writer per key never need
//! cross-key coordination.


use std::time::SystemTime;

use dashmap::DashMap;

use crate::DependencyValue;
use crate::Fingerprint;

/// One cached observation.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub value: DependencyValue,
    pub last_index: u64,
    pub fetched_at: SystemTime,
}

/// The cache. A miss means "not yet fetched", never "does not exist"; an
/// existing-but-empty answer is stored as an entry with an empty value.
pub struct Brain {
    entries: DashMap<Fingerprint, CacheEntry>,
}

impl Brain {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Non-blocking read; never fabricates data.
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<CacheEntry> {
        self.entries.get(fingerprint).map(|entry| entry.value().clone())
    }

    /// Overwrite the entry for `fingerprint`. Called only by the view that
    /// owns the fingerprint.
    pub(crate) fn set(&self, fingerprint: Fingerprint, value: DependencyValue, last_index: u64) {
        self.entries.insert(
            fingerprint,
            CacheEntry {
                value,
                last_index,
                fetched_at: SystemTime::now(),
            },
        );
    }

    /// Drop the entry for `fingerprint`. Called by the coordinator when the
    /// owning view is torn down.
    pub(crate) fn forget(&self, fingerprint: &Fingerprint) -> bool {
        self.entries.remove(fingerprint).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Brain {
    fn default() -> Self {
        Self::new()
    }
}
