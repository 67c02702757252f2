//! LRU Tracking Module
//!
//! Recency is a monotonically increasing tick stamped on each entry when it
//! is stored or read. Stamping is atomic, so readers holding the shared lock
//! can record a hit; only eviction needs the exclusive lock.

use std::sync::atomic::{AtomicU64, Ordering};

// == Recency Clock ==
/// Source of recency ticks.
#[derive(Debug, Default)]
pub struct RecencyClock {
    next: AtomicU64,
}

impl RecencyClock {
    // == Constructor ==
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(0),
        }
    }

    // == Tick ==
    /// Returns a tick strictly greater than every tick handed out before.
    pub fn tick(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

// == Least Recent ==
/// Picks the key with the smallest recency tick.
///
/// Returns None if the iterator is empty.
pub fn least_recent<'a, I>(entries: I) -> Option<&'a str>
where
    I: IntoIterator<Item = (&'a str, u64)>,
{
    entries
        .into_iter()
        .min_by_key(|(_, tick)| *tick)
        .map(|(key, _)| key)
}
