//! Alert frequency summary
//!
//! Counts how many alerts on the first page fall within fixed look-back
//! windows. A page holds at most `page_size` alerts, so when every alert on
//! the page is inside a window the true count may be higher; such buckets
//! are marked saturated.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::views::ViewRecord;

/// Look-back windows, shortest first.
pub const FREQUENCY_WINDOWS: [(&str, Duration); 4] = [
    ("5 minutes", Duration::from_secs(5 * 60)),
    ("hour", Duration::from_secs(60 * 60)),
    ("day", Duration::from_secs(24 * 60 * 60)),
    ("3 days", Duration::from_secs(3 * 24 * 60 * 60)),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertFrequencyBucket {
    pub window_name: &'static str,
    #[serde(with = "duration_secs")]
    pub window: Duration,
    pub count: usize,
    /// Every record on the page fell inside this window
    pub saturated: bool,
}

/// Buckets `records` by creation time relative to `now`.
pub fn alert_frequency<V: ViewRecord>(records: &[V], now: DateTime<Utc>) -> Vec<AlertFrequencyBucket> {
    let total = records.len();
    FREQUENCY_WINDOWS
        .iter()
        .map(|&(window_name, window)| {
            let since = chrono::Duration::from_std(window)
                .ok()
                .and_then(|window| now.checked_sub_signed(window));
            let count = records
                .iter()
                .filter_map(ViewRecord::created_at)
                .filter(|at| since.map_or(true, |since| *at > since))
                .count();
            AlertFrequencyBucket {
                window_name,
                window,
                count,
                saturated: count > 0 && count == total,
            }
        })
        .collect()
}

mod duration_secs {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_secs())
    }
}
