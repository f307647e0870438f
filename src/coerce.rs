//! Numeric and temporal extraction from ambiguous source representations.
//!
//! Both coercions are total: anything that carries no usable signal resolves
//! to `None` so callers can move on to the next candidate.

use std::{str::FromStr, sync::LazyLock};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::data::Value;

/// Extended-JSON numeric subtypes, in the order they are tried.
pub const NUMBER_WRAPPER_KEYS: &[&str] =
    &["$numberInt", "$numberDouble", "$numberLong", "$numberDecimal"];

/// Epoch values above this are read as milliseconds.
const EPOCH_MILLIS_THRESHOLD: f64 = 1e12;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%SZ"];
const ISO_OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
];
const ISO_NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

static FIRST_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-+]?\d[\d,]*\.?\d*").expect("first-number pattern compiles"));

/// Placeholder tokens scrapers write in place of a missing value.
pub fn is_sentinel(value: &str) -> bool {
    let lowered = value.trim().to_ascii_lowercase();
    matches!(
        lowered.as_str(),
        "" | "black" | "n/a" | "na" | "null" | "none" | "unknown"
    )
}

/// Arrays are searched depth-first in document order and the first element
/// that yields a number wins.
pub fn extract_numeric(value: &Value) -> Option<f64> {
    let mut stack = vec![value];
    while let Some(current) = stack.pop() {
        match current {
            Value::Array(items) => stack.extend(items.iter().rev()),
            scalar => {
                if let Some(number) = scalar_numeric(scalar) {
                    return Some(number);
                }
            }
        }
    }
    None
}

fn scalar_numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Integer(i) => Some(*i as f64),
        Value::Float(f) => f.is_finite().then_some(*f),
        Value::String(s) => parse_numeric_text(s),
        Value::Document(doc) => NUMBER_WRAPPER_KEYS
            .iter()
            .filter_map(|key| doc.get(*key).map(|payload| (*key, payload)))
            .find_map(|(key, payload)| wrapper_payload(key, payload)),
        _ => None,
    }
}

fn wrapper_payload(key: &str, payload: &Value) -> Option<f64> {
    let parsed = match payload {
        Value::Integer(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        Value::String(raw) if key == "$numberDecimal" => parse_decimal(raw.trim()),
        Value::String(raw) => raw.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|n| n.is_finite())
}

fn parse_decimal(raw: &str) -> Option<f64> {
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
        .and_then(|d| d.to_f64())
        .or_else(|| raw.parse::<f64>().ok())
}

/// Extracts the first signed decimal number embedded in `value`, ignoring
/// thousands separators (`"$1,234.50"` → `1234.5`).
pub fn parse_numeric_text(value: &str) -> Option<f64> {
    let found = FIRST_NUMBER.find(value)?;
    let digits = found.as_str().replace(',', "");
    digits
        .trim_end_matches('.')
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
}

/// Native timestamps pass through (naive ones are taken as UTC), numbers are
/// epoch seconds or milliseconds by magnitude, and strings go through the
/// fixed format list before the ISO fallback.
pub fn extract_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::DateTime(dt) => Some(dt.with_timezone(&Utc)),
        Value::NaiveDateTime(dt) => Some(dt.and_utc()),
        Value::Integer(i) => epoch_from_integer(*i),
        Value::Float(f) => epoch_from_float(*f),
        Value::String(s) => parse_timestamp_text(s),
        _ => None,
    }
}

fn epoch_from_integer(value: i64) -> Option<DateTime<Utc>> {
    if value as f64 > EPOCH_MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(value)
    } else {
        DateTime::from_timestamp(value, 0)
    }
}

fn epoch_from_float(value: f64) -> Option<DateTime<Utc>> {
    if !value.is_finite() {
        return None;
    }
    let seconds = if value > EPOCH_MILLIS_THRESHOLD {
        value / 1000.0
    } else {
        value
    };
    let whole = seconds.floor();
    if whole < i64::MIN as f64 || whole > i64::MAX as f64 {
        return None;
    }
    let nanos = (((seconds - whole) * 1e9).round() as u32).min(999_999_999);
    DateTime::from_timestamp(whole as i64, nanos)
}

pub fn parse_timestamp_text(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if is_sentinel(trimmed) {
        return None;
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(parsed.and_utc());
        }
    }
    parse_iso_fallback(trimmed)
}

fn parse_iso_fallback(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    let offset_form = value.replace('Z', "+00:00");
    for fmt in ISO_OFFSET_FORMATS {
        if let Ok(parsed) = DateTime::parse_from_str(&offset_form, fmt) {
            return Some(parsed.with_timezone(&Utc));
        }
    }
    ISO_NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|parsed| parsed.and_utc())
}
