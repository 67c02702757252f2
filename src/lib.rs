//! logview - A permission-filtered viewer over an upstream communications log
//!
//! Pages through messages, calls, alerts and call recordings held by an
//! upstream API, redacting each record for the requesting user. Continuation
//! cursors and media URLs are handed out only as sealed tokens, and the next
//! page is prefetched into an expiring cache.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod pager;
pub mod tasks;
pub mod token;
pub mod upstream;
pub mod views;

pub use api::{create_router, AppState};
pub use cache::ExpiringCache;
pub use config::Config;
pub use error::{CacheError, TokenError, UpstreamError, ViewError};
pub use pager::{PageRequest, PageResponse, ResourcePager};
pub use tasks::{spawn_cleanup_task, PrefetchQueue};
pub use token::{TokenCodec, TokenPurpose};
pub use upstream::{MemoryUpstream, UpstreamClient};
pub use views::{PolicyStore, User, ViewClient};
