//! Resource kinds, pages and query shapes shared by the filter and the pager.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::token::TokenCodec;
use crate::views::Capabilities;

// == Resource Kind ==
/// Kinds of record the upstream serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Messages,
    Calls,
    Alerts,
    Recordings,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Messages => "messages",
            ResourceKind::Calls => "calls",
            ResourceKind::Alerts => "alerts",
            ResourceKind::Recordings => "recordings",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Resource ==
/// A raw upstream record type and how it is shown to a user.
pub trait Resource: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Redacted form handed to callers.
    type View: ViewRecord;

    const KIND: ResourceKind;

    /// When the record was created upstream.
    fn created_at(&self) -> Option<DateTime<Utc>>;

    /// Converts to the user-facing view, dropping fields `caps` forbids.
    fn redact(self, caps: &Capabilities, codec: &TokenCodec) -> Result<Self::View>;
}

/// A redacted record.
pub trait ViewRecord: Serialize + Send + Sync + 'static {
    fn created_at(&self) -> Option<DateTime<Utc>>;
}

// == Raw Page ==
/// One page as returned by the upstream. Newest records first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "R: DeserializeOwned"))]
pub struct RawPage<R> {
    pub records: Vec<R>,
    #[serde(default)]
    pub next_page_uri: Option<String>,
    #[serde(default)]
    pub previous_page_uri: Option<String>,
}

impl<R> RawPage<R> {
    pub fn new(records: Vec<R>) -> Self {
        Self {
            records,
            next_page_uri: None,
            previous_page_uri: None,
        }
    }

    pub fn with_next(mut self, uri: impl Into<String>) -> Self {
        self.next_page_uri = Some(uri.into());
        self
    }

    pub fn with_previous(mut self, uri: impl Into<String>) -> Self {
        self.previous_page_uri = Some(uri.into());
        self
    }
}

// == View Page ==
/// A page of redacted records. Cursors are still the upstream's cleartext
/// URIs; the pager seals them before they leave the process.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewPage<V> {
    pub records: Vec<V>,
    pub next_page_uri: Option<String>,
    pub previous_page_uri: Option<String>,
}

// == Time Range ==
/// Inclusive creation-time bounds; a missing bound is open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    /// All time.
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start.map_or(true, |start| at >= start) && self.end.map_or(true, |end| at <= end)
    }

    /// True if `at` falls before the start bound.
    pub fn is_before_start(&self, at: DateTime<Utc>) -> bool {
        self.start.map_or(false, |start| at < start)
    }
}

// == Page Query ==
/// Parameters for a first-page request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageQuery {
    pub page_size: u32,
    pub range: TimeRange,
    /// Extra upstream filters, by upstream parameter name
    pub filters: BTreeMap<String, String>,
}

impl PageQuery {
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size,
            ..Self::default()
        }
    }

    pub fn with_range(mut self, range: TimeRange) -> Self {
        self.range = range;
        self
    }

    pub fn with_filter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(name.into(), value.into());
        self
    }
}
