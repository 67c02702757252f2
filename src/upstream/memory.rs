//! In-memory upstream
//!
//! Serves fixture pages and records from memory. Every request is logged so
//! callers can assert on what reached the upstream, and failures or latency
//! can be injected per request key.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::UpstreamError;
use crate::upstream::{UpstreamClient, UpstreamResult};
use crate::views::{
    Alert, Call, Message, PageQuery, RawPage, Recording, Resource, ResourceKind,
};

/// Records to serve, newest first within each list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FixtureSet {
    pub base_url: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub calls: Vec<Call>,
    #[serde(default)]
    pub alerts: Vec<Alert>,
    #[serde(default)]
    pub recordings: Vec<Recording>,
    /// Media URLs by message sid
    #[serde(default)]
    pub media: HashMap<String, Vec<String>>,
}

#[derive(Debug, Default)]
struct Tables {
    /// Pages by request key: `"<kind>:first"`, `"recordings:<call_sid>"` or a cursor URI
    pages: HashMap<String, Value>,
    /// Single records by sid
    records: HashMap<String, Value>,
    media: HashMap<String, Vec<String>>,
    failures: HashMap<String, UpstreamError>,
    delay: Option<Duration>,
    requests: Vec<String>,
    queries: Vec<PageQuery>,
}

// == Memory Upstream ==
#[derive(Debug)]
pub struct MemoryUpstream {
    base_url: String,
    tables: RwLock<Tables>,
    request_count: AtomicUsize,
}

impl MemoryUpstream {
    /// Creates an empty upstream whose cursors live under `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tables: RwLock::new(Tables::default()),
            request_count: AtomicUsize::new(0),
        }
    }

    /// Builds an upstream serving `fixtures` in pages of `page_size`.
    pub fn from_fixtures(fixtures: FixtureSet, page_size: usize) -> serde_json::Result<Self> {
        let upstream = Self::new(fixtures.base_url);
        for message in &fixtures.messages {
            upstream.insert_message(message)?;
        }
        for call in &fixtures.calls {
            upstream.insert_call(call)?;
        }
        upstream.seed(fixtures.messages, page_size)?;
        upstream.seed(fixtures.calls, page_size)?;
        upstream.seed(fixtures.alerts, page_size)?;

        let mut by_call: HashMap<String, Vec<Recording>> = HashMap::new();
        for recording in fixtures.recordings {
            by_call
                .entry(recording.call_sid.clone())
                .or_default()
                .push(recording);
        }
        for (call_sid, recordings) in by_call {
            upstream.insert_recordings(&call_sid, &RawPage::new(recordings))?;
        }
        for (message_sid, urls) in fixtures.media {
            upstream.insert_media(&message_sid, urls);
        }
        Ok(upstream)
    }

    /// Splits `records` into chained pages of `page_size`.
    pub fn seed<R: Resource>(&self, records: Vec<R>, page_size: usize) -> serde_json::Result<()> {
        let chunks: Vec<Vec<R>> = records
            .chunks(page_size.max(1))
            .map(|chunk| chunk.to_vec())
            .collect();
        let last = chunks.len().saturating_sub(1);

        for (index, chunk) in chunks.into_iter().enumerate() {
            let mut page = RawPage::new(chunk);
            if index < last {
                page = page.with_next(self.cursor(R::KIND, index as u32 + 1));
            }
            if index > 0 {
                page = page.with_previous(self.cursor(R::KIND, index as u32 - 1));
            }
            match index {
                0 => self.insert_first_page(&page)?,
                _ => self.insert_page(&self.cursor(R::KIND, index as u32), &page)?,
            }
        }
        Ok(())
    }

    /// A cursor URI for `kind` that passes the continuation prefix check.
    pub fn cursor(&self, kind: ResourceKind, page: u32) -> String {
        format!("{}?Page={}", self.continuation_prefix(kind), page)
    }

    pub fn insert_first_page<R: Resource>(&self, page: &RawPage<R>) -> serde_json::Result<()> {
        self.insert_page_at(format!("{}:first", R::KIND), page)
    }

    pub fn insert_page<R: Resource>(
        &self,
        cursor: &str,
        page: &RawPage<R>,
    ) -> serde_json::Result<()> {
        self.insert_page_at(cursor.to_string(), page)
    }

    pub fn insert_recordings(
        &self,
        call_sid: &str,
        page: &RawPage<Recording>,
    ) -> serde_json::Result<()> {
        self.insert_page_at(format!("recordings:{}", call_sid), page)
    }

    pub fn insert_message(&self, message: &Message) -> serde_json::Result<()> {
        self.insert_record(message.sid.clone(), message)
    }

    pub fn insert_call(&self, call: &Call) -> serde_json::Result<()> {
        self.insert_record(call.sid.clone(), call)
    }

    pub fn insert_media(&self, message_sid: &str, urls: Vec<String>) {
        self.write().media.insert(message_sid.to_string(), urls);
    }

    /// Makes every request for `key` fail with `error`.
    pub fn fail(&self, key: impl Into<String>, error: UpstreamError) {
        self.write().failures.insert(key.into(), error);
    }

    /// Delays every response by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        self.write().delay = Some(delay);
    }

    /// Total requests served, including failed ones.
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Request keys in arrival order.
    pub fn requests(&self) -> Vec<String> {
        self.read().requests.clone()
    }

    /// Queries passed to first-page requests, in arrival order.
    pub fn queries(&self) -> Vec<PageQuery> {
        self.read().queries.clone()
    }

    fn insert_page_at<R: Resource>(&self, key: String, page: &RawPage<R>) -> serde_json::Result<()> {
        let value = serde_json::to_value(page)?;
        self.write().pages.insert(key, value);
        Ok(())
    }

    fn insert_record<T: Serialize>(&self, sid: String, record: &T) -> serde_json::Result<()> {
        let value = serde_json::to_value(record)?;
        self.write().records.insert(sid, value);
        Ok(())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Logs the request, waits out any injected delay, then returns the
    /// injected failure if one is set for `key`.
    async fn begin(&self, key: &str) -> UpstreamResult<()> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        let (delay, failure) = {
            let mut tables = self.write();
            tables.requests.push(key.to_string());
            (tables.delay, tables.failures.get(key).cloned())
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        failure.map_or(Ok(()), Err)
    }

    fn page<R: Resource>(&self, key: &str) -> UpstreamResult<RawPage<R>> {
        let value = self
            .read()
            .pages
            .get(key)
            .cloned()
            .ok_or(UpstreamError::NoMoreResults)?;
        decode(value)
    }

    fn record<T: DeserializeOwned>(&self, sid: &str) -> UpstreamResult<T> {
        let value = self
            .read()
            .records
            .get(sid)
            .cloned()
            .ok_or_else(|| not_found(sid))?;
        decode(value)
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> UpstreamResult<T> {
    serde_json::from_value(value)
        .map_err(|e| UpstreamError::Transport(format!("malformed fixture: {}", e)))
}

fn not_found(sid: &str) -> UpstreamError {
    UpstreamError::Status {
        status: 404,
        code: Some(20404),
        message: format!("The requested resource {} was not found", sid),
    }
}

#[async_trait]
impl UpstreamClient for MemoryUpstream {
    fn continuation_prefix(&self, kind: ResourceKind) -> String {
        format!("{}/{}", self.base_url, kind)
    }

    async fn first_page<R: Resource>(&self, query: &PageQuery) -> UpstreamResult<RawPage<R>> {
        let key = format!("{}:first", R::KIND);
        self.write().queries.push(query.clone());
        self.begin(&key).await?;
        self.page(&key)
    }

    async fn next_page<R: Resource>(&self, cursor: &str) -> UpstreamResult<RawPage<R>> {
        self.begin(cursor).await?;
        self.page(cursor)
    }

    async fn message(&self, sid: &str) -> UpstreamResult<Message> {
        self.begin(sid).await?;
        self.record(sid)
    }

    async fn call(&self, sid: &str) -> UpstreamResult<Call> {
        self.begin(sid).await?;
        self.record(sid)
    }

    async fn media_urls(&self, message_sid: &str) -> UpstreamResult<Vec<String>> {
        let key = format!("media:{}", message_sid);
        self.begin(&key).await?;
        self.read()
            .media
            .get(message_sid)
            .cloned()
            .ok_or_else(|| not_found(message_sid))
    }

    async fn call_recordings(
        &self,
        call_sid: &str,
        query: &PageQuery,
    ) -> UpstreamResult<RawPage<Recording>> {
        let key = format!("recordings:{}", call_sid);
        self.write().queries.push(query.clone());
        self.begin(&key).await?;
        self.page(&key)
    }
}
