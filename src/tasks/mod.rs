//! Background Tasks Module
//!
//! # Tasks
//! - TTL Cleanup: Removes expired cache entries at configured intervals
//! - Prefetch: Bounded worker pool that warms the cache with upcoming pages

mod cleanup;
mod prefetch;

pub use cleanup::spawn_cleanup_task;
pub use prefetch::{PrefetchQueue, PrefetchStats};
