//! ABOUTME: Value coercion to the canonical string form used by filters and ordering
//! ABOUTME: Keeps `_data.*`, dimension, and timestamp columns comparable identically

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Formats a `DateTime<Utc>` the same way for every timestamp column
/// (`created_at`, `updated_at`, and any string that happens to parse as
/// one), per `spec.md` §4.6.
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true)
}

/// Recognized timestamp string formats, tried in order. Keeping this list
/// small and explicit (rather than a permissive fuzzy parser) avoids
/// silently reinterpreting ordinary strings as dates.
fn try_parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(DateTime::from_naive_utc_and_offset(
            date.and_hms_opt(0, 0, 0).unwrap(),
            Utc,
        ));
    }
    None
}

/// Coerces one scalar JSON value to the canonical comparable string form.
/// Strings that parse as a recognized timestamp format are normalized to
/// RFC3339-nano; every other scalar gets its default textual rendering.
/// Compound values (objects/arrays) are not expected here — callers
/// unwrap sequence-valued filters before reaching this function.
pub fn coerce_json(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => match try_parse_timestamp(s) {
            Some(dt) => format_timestamp(&dt),
            None => s.clone(),
        },
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}
