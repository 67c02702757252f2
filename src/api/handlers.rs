//! API Handlers
//!
//! HTTP request handlers for each log viewer endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use tokio::task::JoinHandle;
use tracing::info;

use crate::cache::ExpiringCache;
use crate::config::Config;
use crate::error::{Result, ViewError};
use crate::models::{HealthResponse, MediaResponse, PageParams, StatsResponse};
use crate::pager::{PageResponse, PagerConfig, ResourcePager};
use crate::tasks::{spawn_cleanup_task, PrefetchQueue};
use crate::upstream::UpstreamClient;
use crate::views::{CallView, MessageView, PolicyStore, RecordingView, Resource, User, ViewClient};

/// Header carrying the authenticated user's name.
///
/// Authentication happens in front of this service; requests arriving here
/// name the user they were authenticated as.
pub const USER_HEADER: &str = "x-logview-user";

/// Application state shared across all handlers.
pub struct AppState<C> {
    pub pager: Arc<ResourcePager<C>>,
    pub policies: Arc<PolicyStore>,
    cleanup: Arc<JoinHandle<()>>,
}

impl<C> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            pager: Arc::clone(&self.pager),
            policies: Arc::clone(&self.policies),
            cleanup: Arc::clone(&self.cleanup),
        }
    }
}

impl<C: UpstreamClient> AppState<C> {
    /// Creates a new AppState from configuration.
    ///
    /// Starts the prefetch workers and the cache cleanup task, so it must be
    /// called from within a tokio runtime.
    pub fn from_config(config: &Config, upstream: Arc<C>, policies: PolicyStore) -> Self {
        let cache = ExpiringCache::new(config.max_entries);
        let prefetch = Arc::new(PrefetchQueue::start(
            config.prefetch_workers,
            config.prefetch_queue_depth,
            config.prefetch_timeout,
        ));
        let cleanup = spawn_cleanup_task(cache.clone(), config.cleanup_interval);
        let views = ViewClient::new(upstream, config.token_codec());

        info!(?config, "Log viewer state initialized");

        Self {
            pager: Arc::new(ResourcePager::new(
                views,
                cache,
                prefetch,
                PagerConfig::from(config),
            )),
            policies: Arc::new(policies),
            cleanup: Arc::new(cleanup),
        }
    }

    /// Stops background work: the cleanup task is aborted and queued
    /// prefetches are drained.
    pub async fn shutdown(&self) {
        self.cleanup.abort();
        self.pager.prefetch().shutdown().await;
    }

    /// Resolves the user a request was made on behalf of.
    pub fn user(&self, headers: &HeaderMap) -> Result<User> {
        headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|name| self.policies.user(name))
            .cloned()
            .ok_or(ViewError::Unauthenticated)
    }
}

/// Handler for GET /messages, /calls and /alerts
///
/// Serves one page of `R`, continuing from the `next` token when present.
pub async fn list_handler<C: UpstreamClient, R: Resource>(
    State(state): State<AppState<C>>,
    headers: HeaderMap,
    Query(params): Query<PageParams>,
) -> Result<Json<PageResponse<R::View>>> {
    let user = state.user(&headers)?;
    let request = params.into_request()?;
    let page = state.pager.fetch::<R>(&user, request).await?;
    Ok(Json(page))
}

/// Handler for GET /messages/:sid
pub async fn message_handler<C: UpstreamClient>(
    State(state): State<AppState<C>>,
    headers: HeaderMap,
    Path(sid): Path<String>,
) -> Result<Json<MessageView>> {
    let user = state.user(&headers)?;
    let message = state.pager.views().message(&user, &sid).await?;
    Ok(Json(message))
}

/// Handler for GET /messages/:sid/media
pub async fn media_handler<C: UpstreamClient>(
    State(state): State<AppState<C>>,
    headers: HeaderMap,
    Path(sid): Path<String>,
) -> Result<Json<MediaResponse>> {
    let user = state.user(&headers)?;
    let urls = state.pager.views().media_urls(&user, &sid).await?;
    Ok(Json(MediaResponse {
        message_sid: sid,
        urls,
    }))
}

/// Handler for GET /calls/:sid
pub async fn call_handler<C: UpstreamClient>(
    State(state): State<AppState<C>>,
    headers: HeaderMap,
    Path(sid): Path<String>,
) -> Result<Json<CallView>> {
    let user = state.user(&headers)?;
    let call = state.pager.views().call(&user, &sid).await?;
    Ok(Json(call))
}

/// Handler for GET /calls/:sid/recordings
pub async fn recordings_handler<C: UpstreamClient>(
    State(state): State<AppState<C>>,
    headers: HeaderMap,
    Path(sid): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Json<PageResponse<RecordingView>>> {
    let user = state.user(&headers)?;
    let request = params.into_request()?;
    let page = state.pager.call_recordings(&user, &sid, request).await?;
    Ok(Json(page))
}

/// Handler for GET /stats
///
/// Returns current cache and prefetch statistics.
pub async fn stats_handler<C: UpstreamClient>(
    State(state): State<AppState<C>>,
) -> Json<StatsResponse> {
    let cache = state.pager.cache().stats().await;
    let prefetch = state.pager.prefetch().stats();
    Json(StatsResponse::new(cache, prefetch))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
