//! Cache Module
//!
//! In-memory cache of serialized values with TTL expiration and LRU eviction.
//! Fetching a later page of records from the upstream can take a second or
//! more; pages we expect a user to ask for next are stored here ahead of time.

mod codec;
mod entry;
mod lru;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use lru::RecencyClock;
pub use stats::{CacheCounters, CacheStats};
pub use store::ExpiringCache;

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 2048;

/// Maximum allowed encoded value size in bytes
pub const MAX_VALUE_SIZE: usize = 1024 * 1024; // 1 MB
