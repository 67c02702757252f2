//! Resource Pager
//!
//! Serves one page of records per request. Continuation cursors leave the
//! process only as sealed tokens; the page after the one being served is
//! fetched in the background and cached so the next request is fast.
//!
//! # Request flow
//! 1. Open the inbound token and check it is a cursor for the requested kind
//! 2. Clamp the requested time range to the configured maximum age
//! 3. Serve from the cache if the cursor's page was prefetched, otherwise
//!    ask the upstream, bounded by the fetch deadline
//! 4. Redact records and seal the outgoing cursors
//! 5. Queue a prefetch of the next page
//! 6. Summarize alert frequency on the first page of alerts

mod frequency;

pub use frequency::{alert_frequency, AlertFrequencyBucket, FREQUENCY_WINDOWS};

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use crate::cache::ExpiringCache;
use crate::config::Config;
use crate::error::{Result, UpstreamError, ViewError};
use crate::tasks::PrefetchQueue;
use crate::token::TokenPurpose;
use crate::upstream::UpstreamClient;
use crate::views::{
    PageQuery, RawPage, Recording, Resource, ResourceKind, TimeRange, User, ViewClient, ViewPage,
};

/// Cache key a page is stored under.
pub fn cache_key(kind: ResourceKind, cursor: &str) -> String {
    format!("{}:{}", kind, cursor)
}

// == Pager Config ==
#[derive(Debug, Clone)]
pub struct PagerConfig {
    pub page_size: u32,
    pub max_resource_age: Option<Duration>,
    pub fetch_timeout: Duration,
    pub prefetch_ttl: Duration,
}

impl Default for PagerConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for PagerConfig {
    fn from(config: &Config) -> Self {
        Self {
            page_size: config.page_size,
            max_resource_age: config.max_resource_age,
            fetch_timeout: config.fetch_timeout,
            prefetch_ttl: config.prefetch_ttl,
        }
    }
}

// == Request / Response ==
/// A caller's page request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    /// Sealed continuation token from a previous response
    pub token: Option<String>,
    /// Upstream filters for the first page
    pub filters: BTreeMap<String, String>,
}

impl PageRequest {
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageResponse<V> {
    pub records: Vec<V>,
    pub next_token: Option<String>,
    pub previous_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency: Option<Vec<AlertFrequencyBucket>>,
    /// When the page was fetched, if it was served from the cache
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_at: Option<DateTime<Utc>>,
}

// == Resource Pager ==
pub struct ResourcePager<C> {
    views: ViewClient<C>,
    cache: ExpiringCache,
    prefetch: Arc<PrefetchQueue>,
    config: PagerConfig,
}

impl<C: UpstreamClient> ResourcePager<C> {
    pub fn new(
        views: ViewClient<C>,
        cache: ExpiringCache,
        prefetch: Arc<PrefetchQueue>,
        config: PagerConfig,
    ) -> Self {
        Self {
            views,
            cache,
            prefetch,
            config,
        }
    }

    pub fn views(&self) -> &ViewClient<C> {
        &self.views
    }

    pub fn cache(&self) -> &ExpiringCache {
        &self.cache
    }

    pub fn prefetch(&self) -> &PrefetchQueue {
        &self.prefetch
    }

    pub fn config(&self) -> &PagerConfig {
        &self.config
    }

    /// Serves one page of `R` to `user`.
    pub async fn fetch<R: Resource>(
        &self,
        user: &User,
        request: PageRequest,
    ) -> Result<PageResponse<R::View>> {
        self.views.authorize(user, R::KIND)?;
        let cursor = request
            .token
            .as_deref()
            .map(|token| self.resolve_token(R::KIND, token))
            .transpose()?;
        let now = Utc::now();
        let range = self.apply_range(request.start, request.end, now)?;

        let (raw, cached_at) = match &cursor {
            Some(cursor) => self.next_raw::<R>(user, cursor).await?,
            None => {
                let query = self.query(range, request.filters);
                let raw = self
                    .within_deadline(self.views.fetch_first::<R>(user, &query))
                    .await?;
                (raw, None)
            }
        };

        let mut response = self.finish(user, raw, &range)?;
        response.cached_at = cached_at;
        // Counts the alerts served, after range filtering
        if R::KIND == ResourceKind::Alerts && cursor.is_none() {
            response.frequency = Some(alert_frequency(&response.records, now));
        }
        Ok(response)
    }

    /// Serves one page of a call's recordings.
    ///
    /// Later pages are followed with [`fetch`](Self::fetch) for
    /// [`Recording`], using the returned token.
    pub async fn call_recordings(
        &self,
        user: &User,
        call_sid: &str,
        request: PageRequest,
    ) -> Result<PageResponse<<Recording as Resource>::View>> {
        if request.token.is_some() {
            self.views.authorize(user, ResourceKind::Calls)?;
            return self.fetch::<Recording>(user, request).await;
        }
        let range = self.apply_range(request.start, request.end, Utc::now())?;
        let query = self.query(range, request.filters);
        let raw = self
            .within_deadline(self.views.fetch_recordings(user, call_sid, &query))
            .await?;
        self.finish(user, raw, &range)
    }

    /// Opens an inbound token and checks it is a cursor for `kind`.
    ///
    /// Nothing here contacts the upstream.
    pub fn resolve_token(&self, kind: ResourceKind, token: &str) -> Result<String> {
        let cursor = self
            .views
            .codec()
            .open(TokenPurpose::Cursor, token)
            .map_err(|e| {
                warn!(%kind, "Rejected token that failed to open");
                ViewError::from(e)
            })?;

        if Url::parse(&cursor).is_err() {
            warn!(%kind, "Rejected token that is not a URL");
            return Err(ViewError::InvalidToken);
        }
        let prefix = self.views.upstream().continuation_prefix(kind);
        if !cursor.starts_with(&prefix) {
            warn!(%kind, "Rejected token issued for another resource");
            return Err(ViewError::InvalidToken);
        }
        Ok(cursor)
    }

    /// Merges caller bounds with the configured maximum age.
    pub fn apply_range(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<TimeRange> {
        let floor = self
            .config
            .max_resource_age
            .and_then(|age| chrono::Duration::from_std(age).ok())
            .and_then(|age| now.checked_sub_signed(age));

        let start = match (start, floor) {
            (Some(start), Some(floor)) => Some(start.max(floor)),
            (start, floor) => start.or(floor),
        };

        if let (Some(start), Some(end)) = (start, end) {
            if end < start {
                return Err(ViewError::InvalidRequest(
                    "end must not be before start".to_string(),
                ));
            }
        }
        Ok(TimeRange::new(start, end))
    }

    fn query(&self, range: TimeRange, filters: BTreeMap<String, String>) -> PageQuery {
        PageQuery {
            page_size: self.config.page_size,
            range,
            filters,
        }
    }

    /// Serves a cursor from the cache when it was prefetched.
    async fn next_raw<R: Resource>(
        &self,
        user: &User,
        cursor: &str,
    ) -> Result<(RawPage<R>, Option<DateTime<Utc>>)> {
        let key = cache_key(R::KIND, cursor);
        match self.cache.get::<RawPage<R>>(&key).await {
            Ok((stored_at, raw)) => {
                debug!(key = %key, "Serving page from cache");
                return Ok((raw, Some(stored_at)));
            }
            Err(e) => debug!(key = %key, reason = %e, "Page not cached"),
        }

        let raw = self
            .within_deadline(self.views.fetch_next::<R>(user, cursor))
            .await?;
        Ok((raw, None))
    }

    /// Bounds an upstream fetch by the fetch deadline.
    ///
    /// "No more results" is not an error to the caller: it is an empty page.
    async fn within_deadline<R, F>(&self, fetch: F) -> Result<RawPage<R>>
    where
        F: Future<Output = Result<RawPage<R>>>,
    {
        match tokio::time::timeout(self.config.fetch_timeout, fetch).await {
            Err(_) => {
                warn!(timeout = ?self.config.fetch_timeout, "Upstream fetch timed out");
                Err(ViewError::Timeout(self.config.fetch_timeout))
            }
            Ok(Err(ViewError::Upstream(UpstreamError::NoMoreResults))) => Ok(RawPage::new(Vec::new())),
            Ok(result) => result,
        }
    }

    /// Redacts, seals cursors and queues the prefetch of the next page.
    fn finish<R: Resource>(
        &self,
        user: &User,
        raw: RawPage<R>,
        range: &TimeRange,
    ) -> Result<PageResponse<R::View>> {
        let ViewPage {
            records,
            next_page_uri,
            previous_page_uri,
        } = self.views.redact_page(user, raw, range)?;

        if let Some(next) = &next_page_uri {
            self.schedule_prefetch::<R>(next);
        }

        let seal = |uri: String| self.views.codec().seal(TokenPurpose::Cursor, &uri);
        Ok(PageResponse {
            records,
            next_token: next_page_uri.map(seal).transpose()?,
            previous_token: previous_page_uri.map(seal).transpose()?,
            frequency: None,
            cached_at: None,
        })
    }

    fn schedule_prefetch<R: Resource>(&self, cursor: &str) {
        let key = cache_key(R::KIND, cursor);
        if self.prefetch.is_pending(&key) {
            return;
        }

        let job = prefetch_page::<C, R>(
            Arc::clone(self.views.upstream()),
            self.cache.clone(),
            cursor.to_string(),
            key.clone(),
            self.config.prefetch_ttl,
        );
        self.prefetch.submit(key, job);
    }
}

/// Fetches the page behind `cursor` and caches it under `key`.
async fn prefetch_page<C: UpstreamClient, R: Resource>(
    upstream: Arc<C>,
    cache: ExpiringCache,
    cursor: String,
    key: String,
    ttl: Duration,
) -> anyhow::Result<()> {
    if cache.contains(&key).await {
        return Ok(());
    }
    match upstream.next_page::<R>(&cursor).await {
        Ok(page) => {
            cache.set(&key, &page, ttl).await?;
            debug!(key = %key, records = page.records.len(), "Prefetched page");
            Ok(())
        }
        Err(UpstreamError::NoMoreResults) => Ok(()),
        Err(e) => Err(e.into()),
    }
}
