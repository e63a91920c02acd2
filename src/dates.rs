//! Time window parsing for `--since` and `--hours`.
//!
//! Accepts "6h ago", "yesterday", "2024-01-15" and RFC 3339 timestamps.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// Matches: "45m ago", "6h ago", "1d ago", "2w ago", "1mo ago"
static AGO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s*(mo|w|d|h|m)\s+ago$").expect("valid ago regex"));

pub const DEFAULT_WINDOW_HOURS: i64 = 6;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TimeExprError {
    #[error("empty time expression")]
    Empty,
    #[error("invalid relative time {0:?}")]
    InvalidRelative(String),
    #[error("invalid time expression {0:?}")]
    Invalid(String),
}

/// Inclusive lower bound plus the moment the window was computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeWindow {
    pub since: i64,
    pub until: i64,
    pub label: String,
}

impl TimeWindow {
    pub fn last_hours(hours: i64, now: DateTime<Utc>) -> Self {
        Self {
            since: (now - Duration::hours(hours)).timestamp(),
            until: now.timestamp(),
            label: format!("Last {hours} hours"),
        }
    }

    pub fn since_expression(input: &str, now: DateTime<Utc>) -> Result<Self, TimeExprError> {
        Ok(Self {
            since: parse_since(input, now)?,
            until: now.timestamp(),
            label: format!("Since {}", input.trim()),
        })
    }
}

/// Parse a past point in time into a Unix timestamp.
pub fn parse_since(input: &str, now: DateTime<Utc>) -> Result<i64, TimeExprError> {
    let raw = input.trim();
    if raw.is_empty() {
        return Err(TimeExprError::Empty);
    }

    let lower = raw.to_lowercase();
    match lower.as_str() {
        "today" => return Ok(start_of_day(now).timestamp()),
        "yesterday" => return Ok(start_of_day(now - Duration::days(1)).timestamp()),
        _ => {}
    }

    if let Some(caps) = AGO_RE.captures(&lower) {
        let value: i64 = caps[1]
            .parse()
            .map_err(|_| TimeExprError::InvalidRelative(raw.to_string()))?;
        if value < 1 {
            return Err(TimeExprError::InvalidRelative(raw.to_string()));
        }
        let span = match &caps[2] {
            // Months are approximated as 30 days.
            "mo" => Duration::days(30 * value),
            "w" => Duration::weeks(value),
            "d" => Duration::days(value),
            "h" => Duration::hours(value),
            _ => Duration::minutes(value),
        };
        return Ok((now - span).timestamp());
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| TimeExprError::Invalid(raw.to_string()))?;
        return Ok(Utc.from_utc_datetime(&midnight).timestamp());
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.timestamp());
    }

    Err(TimeExprError::Invalid(raw.to_string()))
}

/// `YYYY-MM-DD HH:MM:SS` in UTC.
pub fn format_utc(timestamp: i64) -> String {
    match DateTime::from_timestamp(timestamp, 0) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => timestamp.to_string(),
    }
}

fn start_of_day(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .unwrap_or(dt)
}
