//! Response DTOs for the log viewer API
//!
//! Page bodies are [`PageResponse`](crate::pager::PageResponse); the types
//! here cover everything else.

use serde::Serialize;

use crate::cache::CacheStats;
use crate::tasks::PrefetchStats;

/// Response body for the media endpoint (GET /messages/:sid/media)
#[derive(Debug, Clone, Serialize)]
pub struct MediaResponse {
    pub message_sid: String,
    /// Local paths, one per media item
    pub urls: Vec<String>,
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub cache: CacheStats,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
    pub prefetch: PrefetchStats,
}

impl StatsResponse {
    /// Creates a new StatsResponse from cache and prefetch statistics
    pub fn new(cache: CacheStats, prefetch: PrefetchStats) -> Self {
        Self {
            hit_rate: cache.hit_rate(),
            cache,
            prefetch,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
