//! Cache Entry Module
//!
//! A stored value: compressed payload bytes plus the bookkeeping needed for
//! expiry and recency.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

// == Cache Entry ==
/// A single cache entry.
///
/// The payload is an immutable encoded value; it is shared with readers by
/// reference count so decoding can happen outside the cache lock.
#[derive(Debug)]
pub struct CacheEntry {
    /// Encoded value
    pub payload: Arc<[u8]>,
    /// Type name the payload was encoded from
    pub kind: &'static str,
    /// When the entry was stored
    pub stored_at: DateTime<Utc>,
    /// When the entry stops being served
    pub expires_at: DateTime<Utc>,
    /// Recency tick of the last store or hit
    last_used: AtomicU64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an entry.
    ///
    /// Callers guarantee `expires_at > stored_at`.
    pub fn new(
        payload: Vec<u8>,
        kind: &'static str,
        stored_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        tick: u64,
    ) -> Self {
        Self {
            payload: payload.into(),
            kind,
            stored_at,
            expires_at,
            last_used: AtomicU64::new(tick),
        }
    }

    // == Is Expired ==
    /// An entry is expired once `now` is past `expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Checks expiry against the current time.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Records a use at the given recency tick.
    pub fn touch(&self, tick: u64) {
        self.last_used.fetch_max(tick, Ordering::Relaxed);
    }

    /// Recency tick of the last use.
    pub fn last_used(&self) -> u64 {
        self.last_used.load(Ordering::Relaxed)
    }
}
