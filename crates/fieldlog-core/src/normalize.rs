//! Payload normalization: total, pure coercion of caller input
//!
//! Field-collected payloads arrive in whatever shape the capturing page
//! produced. Every function here degrades gracefully instead of failing:
//! timestamps fall back to the current time, non-numeric GPS members are
//! dropped, and absent nested objects become empty maps so downstream
//! code can test for content via emptiness.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde_json::{Map, Value};

use crate::models::{GpsFix, PhotoMeta};

/// Epoch values at or above this are interpreted as milliseconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 1_000_000_000_000;

/// Coerce a date-like value into a valid RFC 3339 string.
///
/// Accepts RFC 3339 strings, a handful of common date/datetime formats,
/// and numeric epochs in seconds or milliseconds. Unparseable or absent
/// input falls back to the current time — callers always get a usable
/// timestamp back.
pub fn normalize_timestamp(value: Option<&Value>) -> String {
    parse_datetime(value).unwrap_or_else(Utc::now).to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Extract the numeric subset of a GPS fix.
///
/// Returns `None` when the input is absent, not an object, or carries no
/// numeric member at all. Non-numeric members (a string-typed latitude,
/// extra device fields) are dropped.
pub fn normalize_gps(value: Option<&Value>) -> Option<GpsFix> {
    let object = value?.as_object()?;
    let fix = GpsFix {
        latitude: object.get("latitude").and_then(Value::as_f64),
        longitude: object.get("longitude").and_then(Value::as_f64),
        accuracy: object.get("accuracy").and_then(Value::as_f64),
    };
    if fix.is_empty() {
        None
    } else {
        Some(fix)
    }
}

/// Shallow-copy an object, canonicalizing date-like fields to RFC 3339.
///
/// Absent or non-object input yields an empty map, never null.
pub fn normalize_nested(value: Option<&Value>) -> Map<String, Value> {
    let Some(object) = value.and_then(Value::as_object) else {
        return Map::new();
    };
    let mut normalized = Map::new();
    for (key, field) in object {
        normalized.insert(key.clone(), normalize_field(key, field));
    }
    normalized
}

/// Map a JSON array of photo metadata to canonical [`PhotoMeta`] copies.
///
/// `captured_at` goes through [`normalize_timestamp`]; non-object entries
/// are skipped; absent or non-array input yields an empty vec.
pub fn normalize_photo_list(value: Option<&Value>) -> Vec<PhotoMeta> {
    let Some(entries) = value.and_then(Value::as_array) else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| {
            let object = entry.as_object()?;
            Some(PhotoMeta {
                photo_id: string_field(object, "photo_id"),
                file_name: string_field(object, "file_name"),
                mime_type: string_field(object, "mime_type"),
                size_bytes: object.get("size_bytes").and_then(Value::as_u64),
                captured_at: normalize_timestamp(object.get("captured_at")),
            })
        })
        .collect()
}

fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Canonicalize one nested field.
///
/// Strings under date-like keys (or that already look like RFC 3339) and
/// numbers under date-like keys are rewritten as RFC 3339; everything
/// else is copied verbatim. Values that fail to parse stay untouched
/// rather than being replaced with the current time.
fn normalize_field(key: &str, value: &Value) -> Value {
    let date_like_key =
        key.ends_with("_at") || key.ends_with("_date") || key == "timestamp" || key == "date";
    match value {
        Value::String(text) => {
            if date_like_key {
                parse_datetime_str(text).map_or_else(|| value.clone(), |parsed| rfc3339(&parsed))
            } else if let Ok(parsed) = DateTime::parse_from_rfc3339(text.trim()) {
                rfc3339(&parsed.with_timezone(&Utc))
            } else {
                value.clone()
            }
        }
        Value::Number(number) if date_like_key => number
            .as_f64()
            .and_then(parse_epoch)
            .map_or_else(|| value.clone(), |parsed| rfc3339(&parsed)),
        _ => value.clone(),
    }
}

fn rfc3339(datetime: &DateTime<Utc>) -> Value {
    Value::String(datetime.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn parse_datetime(value: Option<&Value>) -> Option<DateTime<Utc>> {
    match value? {
        Value::String(text) => parse_datetime_str(text),
        Value::Number(number) => parse_epoch(number.as_f64()?),
        _ => None,
    }
}

fn parse_datetime_str(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
            return Some(parsed.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|datetime| datetime.and_utc())
}

#[allow(clippy::cast_possible_truncation)] // epochs beyond i64 fall back to now
fn parse_epoch(raw: f64) -> Option<DateTime<Utc>> {
    if !raw.is_finite() || raw <= 0.0 || raw >= 9.0e18 {
        return None;
    }
    let raw = raw as i64;
    let millis = if raw >= EPOCH_MILLIS_THRESHOLD {
        raw
    } else {
        raw.checked_mul(1000)?
    };
    Utc.timestamp_millis_opt(millis).single()
}
