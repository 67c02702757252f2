//! Permission-filtered access to the upstream.
//!
//! Every read goes through [`ViewClient`]: it refuses whole resource kinds a
//! user may not see before any upstream call is made, and redacts the fields
//! of each record it returns.

use std::sync::Arc;

use tracing::debug;

use crate::error::{Result, ViewError};
use crate::token::{TokenCodec, TokenPurpose};
use crate::upstream::UpstreamClient;
use crate::views::records::{sealed_path, split_sealed_path};
use crate::views::{
    CallView, Capability, MessageView, PageQuery, RawPage, Recording, RecordingView, Resource,
    ResourceKind, TimeRange, User, ViewPage, ViewRecord,
};

pub struct ViewClient<C> {
    upstream: Arc<C>,
    codec: TokenCodec,
}

impl<C> Clone for ViewClient<C> {
    fn clone(&self) -> Self {
        Self {
            upstream: Arc::clone(&self.upstream),
            codec: self.codec.clone(),
        }
    }
}

impl<C: UpstreamClient> ViewClient<C> {
    pub fn new(upstream: Arc<C>, codec: TokenCodec) -> Self {
        Self { upstream, codec }
    }

    pub fn upstream(&self) -> &Arc<C> {
        &self.upstream
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Fails with `PermissionDenied` if `user` may not see `kind` at all.
    pub fn authorize(&self, user: &User, kind: ResourceKind) -> Result<()> {
        self.require(user, Capability::for_kind(kind))
    }

    fn require(&self, user: &User, capability: Capability) -> Result<()> {
        if user.can(capability) {
            Ok(())
        } else {
            debug!(user = user.name(), ?capability, "Permission denied");
            Err(ViewError::PermissionDenied)
        }
    }

    // == Single Records ==
    pub async fn message(&self, user: &User, sid: &str) -> Result<MessageView> {
        self.authorize(user, ResourceKind::Messages)?;
        let message = self.upstream.message(sid).await?;
        message.redact(user.capabilities(), &self.codec)
    }

    pub async fn call(&self, user: &User, sid: &str) -> Result<CallView> {
        self.authorize(user, ResourceKind::Calls)?;
        let call = self.upstream.call(sid).await?;
        call.redact(user.capabilities(), &self.codec)
    }

    /// Local paths for every media item on a message.
    ///
    /// Each path is `/images/` followed by the upstream URL sealed for
    /// [`TokenPurpose::Media`], so the URL itself is never handed to the user.
    pub async fn media_urls(&self, user: &User, message_sid: &str) -> Result<Vec<String>> {
        self.authorize(user, ResourceKind::Messages)?;
        self.require(user, Capability::ViewMedia)?;
        let urls = self.upstream.media_urls(message_sid).await?;
        urls.iter()
            .map(|url| sealed_path(&self.codec, TokenPurpose::Media, url))
            .collect()
    }

    /// Recovers the upstream URL behind a media or recording path.
    ///
    /// `user` must be allowed to see what the path points at. Only tokens
    /// sealed for that kind of path open; a continuation token does not.
    pub fn open_media_path(&self, user: &User, path: &str) -> Result<String> {
        let (purpose, sealed) = split_sealed_path(path).ok_or(ViewError::InvalidToken)?;
        match purpose {
            TokenPurpose::Media => {
                self.authorize(user, ResourceKind::Messages)?;
                self.require(user, Capability::ViewMedia)?;
            }
            TokenPurpose::Recording => {
                self.authorize(user, ResourceKind::Calls)?;
                self.authorize(user, ResourceKind::Recordings)?;
                self.require(user, Capability::PlayCallRecordings)?;
            }
            TokenPurpose::Cursor => return Err(ViewError::InvalidToken),
        }
        Ok(self.codec.open(purpose, sealed)?)
    }

    // == Pages ==
    /// Newest page of `R`, unfiltered by time.
    pub async fn first_page<R: Resource>(
        &self,
        user: &User,
        query: &PageQuery,
    ) -> Result<ViewPage<R::View>> {
        let raw = self.fetch_first::<R>(user, query).await?;
        self.redact_page(user, raw, &TimeRange::unbounded())
    }

    pub async fn next_page<R: Resource>(
        &self,
        user: &User,
        cursor: &str,
    ) -> Result<ViewPage<R::View>> {
        let raw = self.fetch_next::<R>(user, cursor).await?;
        self.redact_page(user, raw, &TimeRange::unbounded())
    }

    /// Newest page of `R` within the query's time range.
    pub async fn first_page_in_range<R: Resource>(
        &self,
        user: &User,
        query: &PageQuery,
    ) -> Result<ViewPage<R::View>> {
        let raw = self.fetch_first::<R>(user, query).await?;
        self.redact_page(user, raw, &query.range)
    }

    pub async fn next_page_in_range<R: Resource>(
        &self,
        user: &User,
        cursor: &str,
        range: &TimeRange,
    ) -> Result<ViewPage<R::View>> {
        let raw = self.fetch_next::<R>(user, cursor).await?;
        self.redact_page(user, raw, range)
    }

    /// Recordings made during a call. Requires both call and recording access.
    pub async fn call_recordings(
        &self,
        user: &User,
        call_sid: &str,
        query: &PageQuery,
    ) -> Result<ViewPage<RecordingView>> {
        let raw = self.fetch_recordings(user, call_sid, query).await?;
        self.redact_page(user, raw, &query.range)
    }

    /// Fetches a raw first page of a call's recordings.
    pub async fn fetch_recordings(
        &self,
        user: &User,
        call_sid: &str,
        query: &PageQuery,
    ) -> Result<RawPage<Recording>> {
        self.authorize(user, ResourceKind::Calls)?;
        self.authorize(user, ResourceKind::Recordings)?;
        Ok(self.upstream.call_recordings(call_sid, query).await?)
    }

    /// Fetches a raw first page after checking the kind is visible to `user`.
    pub async fn fetch_first<R: Resource>(
        &self,
        user: &User,
        query: &PageQuery,
    ) -> Result<RawPage<R>> {
        self.authorize(user, R::KIND)?;
        Ok(self.upstream.first_page::<R>(query).await?)
    }

    /// Follows a cursor after checking the kind is visible to `user`.
    pub async fn fetch_next<R: Resource>(&self, user: &User, cursor: &str) -> Result<RawPage<R>> {
        self.authorize(user, R::KIND)?;
        Ok(self.upstream.next_page::<R>(cursor).await?)
    }

    /// Redacts a raw page for `user` and drops records outside `range`.
    ///
    /// Pages are newest first, so once a record older than the range start
    /// shows up no later page can match and the forward cursor is dropped.
    pub fn redact_page<R: Resource>(
        &self,
        user: &User,
        raw: RawPage<R>,
        range: &TimeRange,
    ) -> Result<ViewPage<R::View>> {
        self.authorize(user, R::KIND)?;
        let caps = user.capabilities();

        let mut past_start = false;
        let mut records = Vec::with_capacity(raw.records.len());
        for record in raw.records {
            let view = record.redact(caps, &self.codec)?;
            match view.created_at() {
                Some(at) if range.is_before_start(at) => past_start = true,
                Some(at) if !range.contains(at) => {}
                _ => records.push(view),
            }
        }

        let next_page_uri = if past_start { None } else { raw.next_page_uri };
        Ok(ViewPage {
            records,
            next_page_uri,
            previous_page_uri: raw.previous_page_uri,
        })
    }
}
