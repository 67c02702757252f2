//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use logview::upstream::MemoryUpstream;
use logview::views::{
    Alert, Call, Capabilities, Capability, Group, Message, PolicyStore, Recording, UserSpec,
};
use logview::{AppState, Config};

pub const BASE_URL: &str = "https://api.example.com/2010-04-01/Accounts/AC123";

/// Config with short timeouts suitable for tests.
pub fn test_config() -> Config {
    Config {
        max_entries: 100,
        fetch_timeout: Duration::from_millis(500),
        prefetch_workers: 2,
        prefetch_timeout: Duration::from_secs(2),
        ..Config::default()
    }
}

/// Users:
/// - `admin`: no group, sees everything
/// - `support`: no message bodies, prices or media
/// - `ops`: no messages at all, no recordings
pub fn policies() -> PolicyStore {
    PolicyStore::new(
        vec![
            Group {
                name: "support".to_string(),
                capabilities: Capabilities::default()
                    .with(Capability::ViewMessageBody, false)
                    .with(Capability::ViewMessagePrice, false)
                    .with(Capability::ViewMedia, false),
            },
            Group {
                name: "ops".to_string(),
                capabilities: Capabilities::default()
                    .with(Capability::ViewMessages, false)
                    .with(Capability::ViewCallRecordings, false),
            },
        ],
        vec![
            UserSpec {
                name: "admin".to_string(),
                group: None,
            },
            UserSpec {
                name: "support".to_string(),
                group: Some("support".to_string()),
            },
            UserSpec {
                name: "ops".to_string(),
                group: Some("ops".to_string()),
            },
        ],
    )
    .unwrap()
}

pub fn state_with(config: &Config) -> (Arc<MemoryUpstream>, AppState<MemoryUpstream>) {
    let upstream = Arc::new(MemoryUpstream::new(BASE_URL));
    let state = AppState::from_config(config, Arc::clone(&upstream), policies());
    (upstream, state)
}

pub fn state() -> (Arc<MemoryUpstream>, AppState<MemoryUpstream>) {
    state_with(&test_config())
}

pub fn message(sid: &str, minutes_ago: i64) -> Message {
    Message {
        sid: sid.to_string(),
        from: "+14105551234".to_string(),
        to: "+14105556789".to_string(),
        body: format!("body of {}", sid),
        status: "delivered".to_string(),
        direction: "outbound-api".to_string(),
        price: Some("-0.00750".to_string()),
        price_unit: Some("USD".to_string()),
        num_media: 1,
        date_created: Some(Utc::now() - ChronoDuration::minutes(minutes_ago)),
    }
}

pub fn call(sid: &str, minutes_ago: i64) -> Call {
    Call {
        sid: sid.to_string(),
        from: "+14105551234".to_string(),
        to: "+14105556789".to_string(),
        status: "completed".to_string(),
        direction: "inbound".to_string(),
        duration: Some(30),
        price: Some("-0.0085".to_string()),
        price_unit: Some("USD".to_string()),
        date_created: Some(Utc::now() - ChronoDuration::minutes(minutes_ago)),
    }
}

pub fn alert(sid: &str, minutes_ago: i64) -> Alert {
    Alert {
        sid: sid.to_string(),
        error_code: "11200".to_string(),
        log_level: "error".to_string(),
        alert_text: "HTTP retrieval failure".to_string(),
        resource_sid: Some("CA123".to_string()),
        more_info: None,
        date_created: Some(Utc::now() - ChronoDuration::minutes(minutes_ago)),
    }
}

pub fn recording(sid: &str, call_sid: &str) -> Recording {
    Recording {
        sid: sid.to_string(),
        call_sid: call_sid.to_string(),
        duration: Some(12),
        media_url: format!("https://media.example.com/Recordings/{}.mp3", sid),
        date_created: Some(Utc::now()),
    }
}

/// Polls until `check` passes or a second has elapsed.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
