//! Integration Tests for the Resource Pager
//!
//! Drives `ResourcePager` end to end against the in-memory upstream: token
//! handling, caching and prefetch, time ranges, and alert frequency.

mod common;

use std::time::Duration;

use common::{alert, call, eventually, message, recording, state, state_with, test_config};
use logview::error::{UpstreamError, ViewError};
use logview::pager::{cache_key, PageRequest};
use logview::views::{sealed_path, Alert, Call, Message, RawPage, ResourceKind};
use logview::TokenPurpose;

// == First Page ==

#[tokio::test]
async fn test_first_page_is_redacted_and_cursor_sealed() {
    let (upstream, state) = state();
    upstream
        .seed(vec![message("SM1", 1), message("SM2", 2), message("SM3", 3)], 2)
        .unwrap();
    let support = state.policies.user("support").unwrap().clone();

    let page = state
        .pager
        .fetch::<Message>(&support, PageRequest::default())
        .await
        .unwrap();

    assert_eq!(page.records.len(), 2);
    assert!(page.records.iter().all(|m| m.body.is_none() && m.price.is_none()));
    assert!(page.records.iter().all(|m| m.from.is_some()));
    assert!(page.frequency.is_none());
    assert!(page.cached_at.is_none());

    let token = page.next_token.unwrap();
    assert!(!token.contains("api.example.com"));
    let cursor = state
        .pager
        .views()
        .codec()
        .open(TokenPurpose::Cursor, &token)
        .unwrap();
    assert_eq!(cursor, upstream.cursor(ResourceKind::Messages, 1));

    state.shutdown().await;
}

#[tokio::test]
async fn test_page_tokens_do_not_open_as_media_paths() {
    let (upstream, state) = state();
    upstream
        .seed(vec![message("SM1", 1), message("SM2", 2), message("SM3", 3)], 1)
        .unwrap();
    let admin = state.policies.user("admin").unwrap().clone();

    let first = state
        .pager
        .fetch::<Message>(&admin, PageRequest::default())
        .await
        .unwrap();
    let next_token = first.next_token.unwrap();
    let second = state
        .pager
        .fetch::<Message>(&admin, PageRequest::default().with_token(next_token.clone()))
        .await
        .unwrap();
    let previous_token = second.previous_token.unwrap();

    for token in [&next_token, &previous_token] {
        for prefix in ["/images/", "/audio/"] {
            let opened = state
                .pager
                .views()
                .open_media_path(&admin, &format!("{}{}", prefix, token));
            assert!(matches!(opened, Err(ViewError::InvalidToken)));
        }
    }
    state.shutdown().await;
}

#[tokio::test]
async fn test_forbidden_kind_is_denied_without_upstream_contact() {
    let (upstream, state) = state();
    let ops = state.policies.user("ops").unwrap().clone();

    let result = state
        .pager
        .fetch::<Message>(&ops, PageRequest::default())
        .await;

    assert!(matches!(result, Err(ViewError::PermissionDenied)));
    assert_eq!(upstream.request_count(), 0);
    state.shutdown().await;
}

#[tokio::test]
async fn test_filters_and_range_reach_the_upstream() {
    let (upstream, state) = state();
    upstream
        .insert_first_page(&RawPage::new(vec![call("CA1", 5)]))
        .unwrap();
    let admin = state.policies.user("admin").unwrap().clone();

    let mut request = PageRequest::default();
    request
        .filters
        .insert("Status".to_string(), "completed".to_string());
    state.pager.fetch::<Call>(&admin, request).await.unwrap();

    let queries = upstream.queries();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].page_size, test_config().page_size);
    assert_eq!(
        queries[0].filters.get("Status").map(String::as_str),
        Some("completed")
    );
    state.shutdown().await;
}

// == Tokens ==

#[tokio::test]
async fn test_bad_tokens_never_reach_the_upstream() {
    let (upstream, state) = state();
    let admin = state.policies.user("admin").unwrap().clone();
    let codec = state.pager.views().codec();

    let calls_cursor = codec
        .seal(TokenPurpose::Cursor, &upstream.cursor(ResourceKind::Calls, 1))
        .unwrap();
    let foreign_url = codec
        .seal(
            TokenPurpose::Cursor,
            "https://evil.example.com/2010-04-01/Accounts/AC123/messages?Page=1",
        )
        .unwrap();
    let not_a_url = codec.seal(TokenPurpose::Cursor, "messages page 2").unwrap();
    let media = sealed_path(codec, TokenPurpose::Media, &upstream.cursor(ResourceKind::Messages, 1))
        .unwrap();
    let media_token = media["/images/".len()..].to_string();
    let mut tampered = codec
        .seal(TokenPurpose::Cursor, &upstream.cursor(ResourceKind::Messages, 1))
        .unwrap();
    let last = tampered.pop().unwrap();
    tampered.push(if last == 'A' { 'B' } else { 'A' });

    for token in [
        calls_cursor,
        foreign_url,
        not_a_url,
        media_token,
        tampered,
        "garbage".to_string(),
    ] {
        let result = state
            .pager
            .fetch::<Message>(&admin, PageRequest::default().with_token(token))
            .await;
        assert!(matches!(result, Err(ViewError::InvalidToken)));
    }
    assert_eq!(upstream.request_count(), 0);
    state.shutdown().await;
}

#[tokio::test]
async fn test_tokens_can_be_replayed() {
    let (upstream, state) = state();
    let cursor = upstream.cursor(ResourceKind::Alerts, 1);
    upstream
        .insert_page(&cursor, &RawPage::new(vec![alert("NO1", 1)]))
        .unwrap();
    let admin = state.policies.user("admin").unwrap().clone();
    let token = state
        .pager
        .views()
        .codec()
        .seal(TokenPurpose::Cursor, &cursor)
        .unwrap();

    for _ in 0..2 {
        let page = state
            .pager
            .fetch::<Alert>(&admin, PageRequest::default().with_token(token.clone()))
            .await
            .unwrap();
        assert_eq!(page.records.len(), 1);
    }
    state.shutdown().await;
}

// == Prefetch ==

#[tokio::test]
async fn test_next_page_is_prefetched_and_served_from_cache() {
    let (upstream, state) = state();
    upstream
        .seed(
            (0..6).map(|i| message(&format!("SM{}", i), i)).collect(),
            2,
        )
        .unwrap();
    let admin = state.policies.user("admin").unwrap().clone();
    let cursor = upstream.cursor(ResourceKind::Messages, 1);
    let key = cache_key(ResourceKind::Messages, &cursor);

    let first = state
        .pager
        .fetch::<Message>(&admin, PageRequest::default())
        .await
        .unwrap();

    let pager = &state.pager;
    let key_ref = &key;
    assert!(eventually(move || async move { pager.cache().contains(key_ref).await }).await);

    let second = state
        .pager
        .fetch::<Message>(
            &admin,
            PageRequest::default().with_token(first.next_token.unwrap()),
        )
        .await
        .unwrap();

    assert!(second.cached_at.is_some());
    assert_eq!(second.records[0].sid, "SM2");
    assert!(second.previous_token.is_some());
    assert_eq!(
        upstream.requests().iter().filter(|r| **r == cursor).count(),
        1,
        "the prefetched page must not be fetched again"
    );
    state.shutdown().await;
}

#[tokio::test]
async fn test_prefetch_failures_are_not_surfaced() {
    let (upstream, state) = state();
    let cursor = upstream.cursor(ResourceKind::Calls, 1);
    upstream
        .insert_first_page(&RawPage::new(vec![call("CA1", 1)]).with_next(cursor.clone()))
        .unwrap();
    upstream.fail(
        cursor.clone(),
        UpstreamError::Status {
            status: 503,
            code: None,
            message: "Service unavailable".to_string(),
        },
    );
    let admin = state.policies.user("admin").unwrap().clone();

    let first = state
        .pager
        .fetch::<Call>(&admin, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(first.records.len(), 1);

    let pager = &state.pager;
    assert!(eventually(move || async move { pager.prefetch().stats().failed == 1 }).await);
    assert!(!state.pager.cache().contains(&cache_key(ResourceKind::Calls, &cursor)).await);

    // Following the cursor reports the upstream's error to the caller.
    let result = state
        .pager
        .fetch::<Call>(&admin, PageRequest::default().with_token(first.next_token.unwrap()))
        .await;
    assert!(matches!(
        result,
        Err(ViewError::Upstream(UpstreamError::Status { status: 503, .. }))
    ));
    state.shutdown().await;
}

// == Upstream Edge Cases ==

#[tokio::test]
async fn test_no_more_results_is_an_empty_page() {
    let (upstream, state) = state();
    let admin = state.policies.user("admin").unwrap().clone();
    let token = state
        .pager
        .views()
        .codec()
        .seal(TokenPurpose::Cursor, &upstream.cursor(ResourceKind::Messages, 7))
        .unwrap();

    let page = state
        .pager
        .fetch::<Message>(&admin, PageRequest::default().with_token(token))
        .await
        .unwrap();

    assert!(page.records.is_empty());
    assert_eq!(page.next_token, None);
    assert_eq!(upstream.request_count(), 1);
    state.shutdown().await;
}

#[tokio::test]
async fn test_slow_upstream_times_out() {
    let config = logview::Config {
        fetch_timeout: Duration::from_millis(50),
        ..test_config()
    };
    let (upstream, state) = state_with(&config);
    upstream
        .insert_first_page(&RawPage::new(vec![call("CA1", 1)]))
        .unwrap();
    upstream.set_delay(Duration::from_millis(500));
    let admin = state.policies.user("admin").unwrap().clone();

    let result = state.pager.fetch::<Call>(&admin, PageRequest::default()).await;
    assert!(matches!(result, Err(ViewError::Timeout(_))));
    state.shutdown().await;
}

// == Time Ranges ==

#[tokio::test]
async fn test_max_resource_age_limits_paging() {
    let config = logview::Config {
        max_resource_age: Some(Duration::from_secs(60 * 60)),
        ..test_config()
    };
    let (upstream, state) = state_with(&config);
    upstream
        .insert_first_page(
            &RawPage::new(vec![
                message("SM1", 1),
                message("SM2", 30),
                message("SM3", 90),
            ])
            .with_next(upstream.cursor(ResourceKind::Messages, 1)),
        )
        .unwrap();
    let admin = state.policies.user("admin").unwrap().clone();

    let page = state
        .pager
        .fetch::<Message>(&admin, PageRequest::default())
        .await
        .unwrap();

    let sids: Vec<_> = page.records.iter().map(|m| m.sid.as_str()).collect();
    assert_eq!(sids, vec!["SM1", "SM2"]);
    assert_eq!(page.next_token, None);
    assert!(upstream.queries()[0].range.start.is_some());
    state.shutdown().await;
}

#[tokio::test]
async fn test_alert_frequency_counts_only_served_alerts() {
    let config = logview::Config {
        max_resource_age: Some(Duration::from_secs(2 * 60 * 60)),
        ..test_config()
    };
    let (upstream, state) = state_with(&config);
    upstream
        .insert_first_page(&RawPage::new(vec![
            alert("NO1", 1),
            alert("NO2", 30),
            alert("NO3", 180),
        ]))
        .unwrap();
    let admin = state.policies.user("admin").unwrap().clone();

    let page = state
        .pager
        .fetch::<Alert>(&admin, PageRequest::default())
        .await
        .unwrap();

    assert_eq!(page.records.len(), 2);
    let buckets = page.frequency.unwrap();
    let hour = buckets.iter().find(|b| b.window_name == "hour").unwrap();
    let day = buckets.iter().find(|b| b.window_name == "day").unwrap();
    assert_eq!(hour.count, 2);
    assert!(hour.saturated);
    assert_eq!(day.count, 2);
    assert!(day.saturated);
    state.shutdown().await;
}

#[tokio::test]
async fn test_end_before_start_is_invalid() {
    let (upstream, state) = state();
    let admin = state.policies.user("admin").unwrap().clone();
    let now = chrono::Utc::now();

    let request = PageRequest {
        start: Some(now),
        end: Some(now - chrono::Duration::days(1)),
        ..PageRequest::default()
    };
    let result = state.pager.fetch::<Message>(&admin, request).await;

    assert!(matches!(result, Err(ViewError::InvalidRequest(_))));
    assert_eq!(upstream.request_count(), 0);
    state.shutdown().await;
}

// == Alerts ==

#[tokio::test]
async fn test_alert_frequency_on_first_page_only() {
    let (upstream, state) = state();
    let cursor = upstream.cursor(ResourceKind::Alerts, 1);
    upstream
        .insert_first_page(
            &RawPage::new(vec![alert("NO1", 1), alert("NO2", 10), alert("NO3", 120)])
                .with_next(cursor.clone()),
        )
        .unwrap();
    upstream
        .insert_page(&cursor, &RawPage::new(vec![alert("NO4", 300)]))
        .unwrap();
    let admin = state.policies.user("admin").unwrap().clone();

    let first = state
        .pager
        .fetch::<Alert>(&admin, PageRequest::default())
        .await
        .unwrap();
    let buckets = first.frequency.unwrap();
    let counts: Vec<_> = buckets.iter().map(|b| (b.count, b.saturated)).collect();
    assert_eq!(counts, vec![(1, false), (2, false), (3, true), (3, true)]);

    let second = state
        .pager
        .fetch::<Alert>(&admin, PageRequest::default().with_token(first.next_token.unwrap()))
        .await
        .unwrap();
    assert!(second.frequency.is_none());
    state.shutdown().await;
}

#[tokio::test]
async fn test_empty_alert_listing_still_reports_frequency() {
    let (_, state) = state();
    let admin = state.policies.user("admin").unwrap().clone();

    let page = state
        .pager
        .fetch::<Alert>(&admin, PageRequest::default())
        .await
        .unwrap();

    assert!(page.records.is_empty());
    let buckets = page.frequency.unwrap();
    assert!(buckets.iter().all(|b| b.count == 0 && !b.saturated));
    state.shutdown().await;
}

// == Recordings ==

#[tokio::test]
async fn test_call_recordings_are_sealed_and_gated() {
    let (upstream, state) = state();
    upstream
        .insert_recordings("CA1", &RawPage::new(vec![recording("RE1", "CA1")]))
        .unwrap();
    let admin = state.policies.user("admin").unwrap().clone();
    let ops = state.policies.user("ops").unwrap().clone();

    let page = state
        .pager
        .call_recordings(&admin, "CA1", PageRequest::default())
        .await
        .unwrap();
    let path = page.records[0].media_path.clone().unwrap();
    assert!(path.starts_with("/audio/"));
    assert_eq!(
        state.pager.views().open_media_path(&admin, &path).unwrap(),
        "https://media.example.com/Recordings/RE1.mp3"
    );

    let denied = state
        .pager
        .call_recordings(&ops, "CA1", PageRequest::default())
        .await;
    assert!(matches!(denied, Err(ViewError::PermissionDenied)));
    state.shutdown().await;
}
