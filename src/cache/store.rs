//! Cache Store Module
//!
//! Expiring, entry-count-bounded cache of serialized values.

use std::any::type_name;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::cache::lru::{least_recent, RecencyClock};
use crate::cache::{codec, CacheCounters, CacheEntry, CacheStats, MAX_KEY_LENGTH, MAX_VALUE_SIZE};
use crate::error::{CacheError, CacheResult};

/// State guarded by the cache lock.
#[derive(Debug)]
struct CacheStore {
    entries: HashMap<String, CacheEntry>,
    max_entries: usize,
}

impl CacheStore {
    /// Removes the least recently used entry, returning its key.
    fn evict_lru(&mut self) -> Option<String> {
        let victim = least_recent(
            self.entries
                .iter()
                .map(|(key, entry)| (key.as_str(), entry.last_used())),
        )?
        .to_string();
        self.entries.remove(&victim);
        Some(victim)
    }
}

// == Expiring Cache ==
/// Shared handle to the cache. Clones refer to the same store.
///
/// Values are stored serialized and compressed, tagged with the Rust type
/// they were encoded from; `get` checks the tag before decoding so asking for
/// the wrong shape is a [`CacheError::Decode`] rather than a garbled value.
#[derive(Debug, Clone)]
pub struct ExpiringCache {
    store: Arc<RwLock<CacheStore>>,
    counters: Arc<CacheCounters>,
    clock: Arc<RecencyClock>,
}

impl ExpiringCache {
    // == Constructor ==
    /// Creates a cache holding at most `max_entries` entries (at least one).
    pub fn new(max_entries: usize) -> Self {
        Self {
            store: Arc::new(RwLock::new(CacheStore {
                entries: HashMap::new(),
                max_entries: max_entries.max(1),
            })),
            counters: Arc::new(CacheCounters::new()),
            clock: Arc::new(RecencyClock::new()),
        }
    }

    // == Set ==
    /// Stores `value` under `key` for `ttl`.
    ///
    /// Overwrites any existing entry. If the cache is at capacity, the least
    /// recently used entry is evicted.
    ///
    /// The entry is tagged with `T`, and only `get::<T>` reads it back. `T`
    /// must be an owned type, so a borrowed slice or a double reference
    /// cannot be stored under a tag no reader can ask for:
    ///
    /// ```compile_fail
    /// # async fn store(cache: logview::ExpiringCache) {
    /// let sids: &[&str] = &["SM1", "SM2"];
    /// let _ = cache.set("page", &sids, std::time::Duration::from_secs(60)).await;
    /// # }
    /// ```
    pub async fn set<T>(&self, key: &str, value: &T, ttl: Duration) -> CacheResult<()>
    where
        T: Serialize + DeserializeOwned,
    {
        validate_key(key)?;
        if ttl.is_zero() {
            return Err(CacheError::InvalidTtl(key.to_string()));
        }

        let payload = codec::encode(value).map_err(|reason| CacheError::Encode {
            key: key.to_string(),
            reason,
        })?;
        if payload.len() > MAX_VALUE_SIZE {
            return Err(CacheError::TooLarge {
                key: key.to_string(),
                size: payload.len(),
                limit: MAX_VALUE_SIZE,
            });
        }

        let stored_at = Utc::now();
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| stored_at.checked_add_signed(ttl))
            .ok_or_else(|| CacheError::InvalidTtl(key.to_string()))?;
        let size = payload.len();

        let mut store = self.store.write().await;
        if !store.entries.contains_key(key) && store.entries.len() >= store.max_entries {
            if let Some(evicted) = store.evict_lru() {
                self.counters.record_eviction();
                debug!(key = %evicted, "evicted least recently used entry");
            }
        }

        let entry = CacheEntry::new(payload, type_name::<T>(), stored_at, expires_at, self.clock.tick());
        store.entries.insert(key.to_string(), entry);
        debug!(key, size, cache_size = store.entries.len(), "stored data in cache");

        Ok(())
    }

    // == Get ==
    /// Returns the time `key` was stored and its decoded value.
    ///
    /// An expired entry is removed by this call and reported as
    /// [`CacheError::Expired`]; the next lookup sees [`CacheError::NotFound`].
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> CacheResult<(DateTime<Utc>, T)> {
        let now = Utc::now();
        let found = {
            let store = self.store.read().await;
            let found = match store.entries.get(key) {
                None => {
                    self.counters.record_miss();
                    debug!(key, "cache miss");
                    return Err(CacheError::NotFound(key.to_string()));
                }
                Some(entry) if entry.is_expired_at(now) => None,
                Some(entry) => {
                    entry.touch(self.clock.tick());
                    Some((entry.stored_at, entry.kind, Arc::clone(&entry.payload)))
                }
            };
            found
        };

        let Some((stored_at, kind, payload)) = found else {
            return Err(self.expire(key, now).await);
        };

        if kind != type_name::<T>() {
            self.counters.record_miss();
            return Err(CacheError::Decode {
                key: key.to_string(),
                reason: format!("stored as {}, requested as {}", kind, type_name::<T>()),
            });
        }

        let value = codec::decode(&payload).map_err(|reason| {
            self.counters.record_miss();
            CacheError::Decode {
                key: key.to_string(),
                reason,
            }
        })?;

        self.counters.record_hit();
        debug!(key, size = payload.len(), "cache hit");
        Ok((stored_at, value))
    }

    /// Removes `key` after a reader saw it expired.
    ///
    /// The entry is re-checked under the exclusive lock: a concurrent `set`
    /// may have replaced it in between.
    async fn expire(&self, key: &str, now: DateTime<Utc>) -> CacheError {
        let mut store = self.store.write().await;
        let still_expired = store
            .entries
            .get(key)
            .map(|entry| entry.is_expired_at(now))
            .unwrap_or(false);
        if still_expired {
            store.entries.remove(key);
            self.counters.record_expirations(1);
            debug!(key, "found expired value in cache");
        }
        self.counters.record_miss();
        CacheError::Expired(key.to_string())
    }

    // == Contains ==
    /// True if `key` holds an unexpired entry. Does not count as a use.
    pub async fn contains(&self, key: &str) -> bool {
        let store = self.store.read().await;
        store
            .entries
            .get(key)
            .map(|entry| !entry.is_expired())
            .unwrap_or(false)
    }

    // == Remove ==
    /// Removes an entry, returning whether one was present.
    pub async fn remove(&self, key: &str) -> bool {
        self.store.write().await.entries.remove(key).is_some()
    }

    // == Cleanup Expired ==
    /// Removes all expired entries, returning how many were dropped.
    pub async fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        let mut store = self.store.write().await;
        let before = store.entries.len();
        store.entries.retain(|_, entry| !entry.is_expired_at(now));
        let removed = before - store.entries.len();
        self.counters.record_expirations(removed as u64);
        removed
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub async fn stats(&self) -> CacheStats {
        let store = self.store.read().await;
        self.counters.snapshot(store.entries.len(), store.max_entries)
    }

    // == Length ==
    /// Returns the current number of entries, expired or not.
    pub async fn len(&self) -> usize {
        self.store.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Maximum number of entries.
    pub async fn capacity(&self) -> usize {
        self.store.read().await.max_entries
    }
}

fn validate_key(key: &str) -> CacheResult<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidKey("key cannot be empty".to_string()));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(CacheError::InvalidKey(format!(
            "key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        )));
    }
    Ok(())
}
