//! Upstream records API
//!
//! The pager and the permission filter only ever talk to the upstream through
//! [`UpstreamClient`]. Cursors are the upstream's own next/previous page URIs,
//! passed back verbatim.

mod memory;

pub use memory::{FixtureSet, MemoryUpstream};

use async_trait::async_trait;

use crate::error::UpstreamError;
use crate::views::{Call, Message, PageQuery, RawPage, Recording, Resource, ResourceKind};

/// Result type for upstream calls.
pub type UpstreamResult<T> = std::result::Result<T, UpstreamError>;

#[async_trait]
pub trait UpstreamClient: Send + Sync + 'static {
    /// Prefix every continuation cursor for `kind` starts with.
    ///
    /// An inbound cursor that does not start with this prefix was not issued
    /// for `kind` and must not be followed.
    fn continuation_prefix(&self, kind: ResourceKind) -> String;

    /// Fetches the newest page of `R` matching `query`.
    async fn first_page<R: Resource>(&self, query: &PageQuery) -> UpstreamResult<RawPage<R>>;

    /// Follows a continuation cursor.
    ///
    /// Returns [`UpstreamError::NoMoreResults`] when the cursor points past
    /// the end of the listing.
    async fn next_page<R: Resource>(&self, cursor: &str) -> UpstreamResult<RawPage<R>>;

    async fn message(&self, sid: &str) -> UpstreamResult<Message>;

    async fn call(&self, sid: &str) -> UpstreamResult<Call>;

    /// Upstream URLs of every media item attached to a message.
    async fn media_urls(&self, message_sid: &str) -> UpstreamResult<Vec<String>>;

    /// First page of recordings made during a call.
    async fn call_recordings(
        &self,
        call_sid: &str,
        query: &PageQuery,
    ) -> UpstreamResult<RawPage<Recording>>;
}
