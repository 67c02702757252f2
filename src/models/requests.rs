//! Request DTOs for the log viewer API
//!
//! Defines the query parameters accepted by listing endpoints.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use crate::error::{Result, ViewError};
use crate::pager::PageRequest;

/// Query parameters for listing endpoints
///
/// # Fields
/// - `start`, `end`: RFC 3339 timestamps or `YYYY-MM-DD` dates
/// - `next`: opaque continuation token from a previous response
/// - `status`, `log_level`: passed through to the upstream as filters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub log_level: Option<String>,
}

impl PageParams {
    /// Parses the parameters into a pager request.
    pub fn into_request(self) -> Result<PageRequest> {
        let start = self
            .start
            .as_deref()
            .map(|value| parse_bound(value, Bound::Start))
            .transpose()?;
        let end = self
            .end
            .as_deref()
            .map(|value| parse_bound(value, Bound::End))
            .transpose()?;

        let mut request = PageRequest {
            start,
            end,
            token: self.next.filter(|token| !token.is_empty()),
            ..PageRequest::default()
        };
        if let Some(status) = self.status.filter(|s| !s.is_empty()) {
            request.filters.insert("Status".to_string(), status);
        }
        if let Some(level) = self.log_level.filter(|l| !l.is_empty()) {
            request.filters.insert("LogLevel".to_string(), level);
        }
        Ok(request)
    }
}

#[derive(Clone, Copy)]
enum Bound {
    Start,
    End,
}

/// A bare date as a start bound means the start of that day; as an end
/// bound, the last instant of it.
fn parse_bound(value: &str, bound: Bound) -> Result<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Ok(at.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| ViewError::InvalidRequest(format!("invalid date: {}", value)))?;
    let at = match bound {
        Bound::Start => date.and_hms_opt(0, 0, 0),
        Bound::End => date.and_hms_nano_opt(23, 59, 59, 999_999_999),
    };
    at.map(|naive| naive.and_utc())
        .ok_or_else(|| ViewError::InvalidRequest(format!("invalid date: {}", value)))
}
