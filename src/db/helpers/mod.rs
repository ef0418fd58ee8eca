//! Lenient readers for untrusted document fields.
//!
//! Remote documents may be written by older clients or edited by hand, so
//! every reader fails closed: a missing or mistyped field becomes the
//! type's neutral value instead of an error.

use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::db::Fields;

pub fn field_str(data: &Fields, key: &str) -> Option<String> {
    match data.get(key) {
        Some(Value::String(text)) => Some(text.clone()),
        _ => None,
    }
}

/// `true` only for a JSON `true`; strings such as `"true"` do not count.
pub fn field_bool(data: &Fields, key: &str) -> bool {
    matches!(data.get(key), Some(Value::Bool(true)))
}

/// Non-negative whole number; fractional values are truncated, anything else
/// reads as zero.
pub fn field_u64(data: &Fields, key: &str) -> u64 {
    match data.get(key) {
        Some(Value::Number(number)) => number.as_u64().unwrap_or_else(|| {
            number
                .as_f64()
                .filter(|value| value.is_finite() && *value >= 0.0)
                .map(|value| value.trunc() as u64)
                .unwrap_or(0)
        }),
        _ => 0,
    }
}

pub fn field_u32(data: &Fields, key: &str) -> u32 {
    u32::try_from(field_u64(data, key)).unwrap_or(u32::MAX)
}

/// Millisecond timestamp, if the field holds an integer.
pub fn field_timestamp(data: &Fields, key: &str) -> Option<i64> {
    match data.get(key) {
        Some(Value::Number(number)) => number.as_i64(),
        _ => None,
    }
}

/// Strings of an array field, de-duplicated in first-seen order. Non-string
/// elements are skipped.
pub fn field_string_set(data: &Fields, key: &str) -> Vec<String> {
    let Some(Value::Array(items)) = data.get(key) else {
        return Vec::new();
    };
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        if let Value::String(text) = item {
            if !out.contains(text) {
                out.push(text.clone());
            }
        }
    }
    out
}

/// A string-backed enum, or its default when absent or unrecognized.
pub fn field_enum<T: DeserializeOwned + Default>(data: &Fields, key: &str) -> T {
    data.get(key)
        .and_then(|value| serde_json::from_value(value.clone()).ok())
        .unwrap_or_default()
}

pub fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

/// Calendar day of `ms` in `tz`.
pub fn local_date<Tz: TimeZone>(ms: i64, tz: &Tz) -> NaiveDate {
    millis_to_datetime(ms).with_timezone(tz).date_naive()
}

/// Start of the device-local day containing `now`, in epoch milliseconds.
pub fn start_of_local_day(now: DateTime<Utc>) -> i64 {
    start_of_day_in(now, &Local)
}

pub fn start_of_day_in<Tz: TimeZone>(now: DateTime<Utc>, tz: &Tz) -> i64 {
    let midnight = now.with_timezone(tz).date_naive().and_time(NaiveTime::default());
    tz.from_local_datetime(&midnight)
        .earliest()
        .map(|start| start.timestamp_millis())
        // Midnight skipped by a DST jump: fall back to the UTC reading.
        .unwrap_or_else(|| midnight.and_utc().timestamp_millis())
}
