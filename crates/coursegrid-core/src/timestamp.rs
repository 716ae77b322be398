//! Completion timestamp decoding
//!
//! Stored completion dates come in several shapes depending on which client
//! wrote them:
//!
//! | Shape | Example |
//! |-------|---------|
//! | RFC 3339 string | `"2025-03-14T10:00:00Z"` |
//! | Plain date | `"2025-03-14"` |
//! | Day-first date | `"14/03/2025"` |
//! | Seconds object | `{"seconds": 1741946400, "nanoseconds": 0}` |
//! | Epoch milliseconds | `1741946400000` |
//!
//! Anything else decodes to `None`, which callers treat as "date unknown".

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

/// Decode a stored timestamp to a UTC instant
pub fn parse_instant(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_text(s.trim()),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        Value::Object(map) => {
            let seconds = map
                .get("seconds")
                .or_else(|| map.get("_seconds"))
                .and_then(Value::as_i64)?;
            let nanos = map
                .get("nanoseconds")
                .or_else(|| map.get("_nanoseconds"))
                .and_then(Value::as_u64)
                .unwrap_or(0);
            DateTime::from_timestamp(seconds, u32::try_from(nanos).ok()?)
        }
        _ => None,
    }
}

/// Decode a stored timestamp to its UTC calendar date
pub fn parse_date(value: &Value) -> Option<NaiveDate> {
    parse_instant(value).map(|instant| instant.date_naive())
}

fn parse_text(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }
    if let Ok(instant) = DateTime::parse_from_rfc3339(s) {
        return Some(instant.with_timezone(&Utc));
    }
    ["%Y-%m-%d", "%d/%m/%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
