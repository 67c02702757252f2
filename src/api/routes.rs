//! API Routes
//!
//! Configures the Axum router with all log viewer endpoints.

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use super::handlers::{
    call_handler, health_handler, list_handler, media_handler, message_handler,
    recordings_handler, stats_handler, AppState,
};
use crate::upstream::UpstreamClient;
use crate::views::{Alert, Call, Message};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /messages`, `GET /messages/:sid`, `GET /messages/:sid/media`
/// - `GET /calls`, `GET /calls/:sid`, `GET /calls/:sid/recordings`
/// - `GET /alerts`
/// - `GET /stats` - Cache and prefetch statistics
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - Tracing: Logs all requests for debugging
pub fn create_router<C: UpstreamClient>(state: AppState<C>) -> Router {
    Router::new()
        .route("/messages", get(list_handler::<C, Message>))
        .route("/messages/:sid", get(message_handler::<C>))
        .route("/messages/:sid/media", get(media_handler::<C>))
        .route("/calls", get(list_handler::<C, Call>))
        .route("/calls/:sid", get(call_handler::<C>))
        .route("/calls/:sid/recordings", get(recordings_handler::<C>))
        .route("/alerts", get(list_handler::<C, Alert>))
        .route("/stats", get(stats_handler::<C>))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::USER_HEADER;
    use crate::config::Config;
    use crate::upstream::MemoryUpstream;
    use crate::views::{PolicyStore, RawPage, UserSpec};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use std::sync::Arc;
    use tower::util::ServiceExt;

    fn app() -> (Arc<MemoryUpstream>, Router) {
        let upstream = Arc::new(MemoryUpstream::new("https://api.example.com/v1"));
        let policies = PolicyStore::new(
            Vec::new(),
            vec![UserSpec {
                name: "admin".to_string(),
                group: None,
            }],
        )
        .unwrap();
        let state = AppState::from_config(&Config::default(), Arc::clone(&upstream), policies);
        (upstream, create_router(state))
    }

    fn request(uri: &str, user: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(user) = user {
            builder = builder.header(USER_HEADER, user);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_every_listing_route_is_mounted() {
        let (upstream, app) = app();
        upstream.insert_first_page::<Message>(&RawPage::new(Vec::new())).unwrap();
        upstream.insert_first_page::<Call>(&RawPage::new(Vec::new())).unwrap();
        upstream.insert_first_page::<Alert>(&RawPage::new(Vec::new())).unwrap();

        for uri in ["/messages", "/calls", "/alerts"] {
            let response = app.clone().oneshot(request(uri, Some("admin"))).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_status_routes_need_no_user() {
        let (_, app) = app();

        for uri in ["/health", "/stats"] {
            let response = app.clone().oneshot(request(uri, None)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_record_routes_need_a_user() {
        let (upstream, app) = app();

        for uri in ["/messages/SM1", "/messages/SM1/media", "/calls/CA1", "/calls/CA1/recordings"] {
            let response = app.clone().oneshot(request(uri, None)).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
        }
        assert_eq!(upstream.request_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_route_not_found() {
        let (_, app) = app();

        let response = app
            .oneshot(request("/recordings", Some("admin")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
