//! Document model shared by every stage of an audit.
//!
//! Raw samples arrive as JSON (one document per line in the sample exports).
//! [`Value`] is the tagged union the rest of the crate switches on; the
//! extended-JSON wrappers that have no JSON-native counterpart (`$oid`,
//! `$date`, `$uuid`, `$binary`) are decoded into their own variants while
//! numeric wrappers stay literal so the numeric coercer can see them.

use std::{
    collections::BTreeMap,
    fmt,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, NaiveDateTime, SecondsFormat};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};
use uuid::Uuid;

use crate::{coerce::parse_timestamp_text, error::AuditError};

pub type Document = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    DateTime(DateTime<FixedOffset>),
    NaiveDateTime(NaiveDateTime),
    ObjectId(String),
    Guid(Uuid),
    Binary { subtype: String, base64: String },
    Array(Vec<Value>),
    Document(Document),
}

/// Semantic kind of a [`Value`]; the labels are the histogram keys in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Null,
    Bool,
    Int,
    Float,
    Str,
    Datetime,
    Identifier,
    Binary,
    Nested,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Str => "str",
            ValueKind::Datetime => "datetime",
            ValueKind::Identifier => "identifier",
            ValueKind::Binary => "binary",
            ValueKind::Nested => "nested",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Boolean(_) => ValueKind::Bool,
            Value::Integer(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::String(_) => ValueKind::Str,
            Value::DateTime(_) | Value::NaiveDateTime(_) => ValueKind::Datetime,
            Value::ObjectId(_) | Value::Guid(_) => ValueKind::Identifier,
            Value::Binary { .. } => ValueKind::Binary,
            Value::Array(_) | Value::Document(_) => ValueKind::Nested,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Boolean(b) => JsonValue::Bool(*b),
            Value::Integer(i) => json!(i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Value::String(s) => JsonValue::String(s.clone()),
            Value::DateTime(dt) => {
                json!({ "$date": dt.to_rfc3339_opts(SecondsFormat::AutoSi, true) })
            }
            Value::NaiveDateTime(dt) => {
                json!({ "$date": dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string() })
            }
            Value::ObjectId(oid) => json!({ "$oid": oid }),
            Value::Guid(g) => json!({ "$uuid": g.to_string() }),
            Value::Binary { subtype, base64 } => {
                json!({ "$binary": { "base64": base64, "subType": subtype } })
            }
            Value::Array(items) => JsonValue::Array(items.iter().map(Value::to_json).collect()),
            Value::Document(doc) => JsonValue::Object(
                doc.iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }

    pub fn as_display(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.abs() < 1e15 {
                    format!("{f:.1}")
                } else {
                    f.to_string()
                }
            }
            Value::String(s) => s.clone(),
            Value::DateTime(dt) => dt.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            Value::NaiveDateTime(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
            Value::ObjectId(oid) => oid.clone(),
            Value::Guid(g) => g.to_string(),
            Value::Binary { base64, .. } => base64.clone(),
            Value::Array(_) | Value::Document(_) => self.to_json().to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl From<JsonValue> for Value {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Boolean(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            JsonValue::String(s) => Value::String(s),
            JsonValue::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            JsonValue::Object(map) => match decode_type_wrapper(&map) {
                Some(native) => native,
                None => Value::Document(
                    map.into_iter()
                        .map(|(key, value)| (key, Value::from(value)))
                        .collect(),
                ),
            },
        }
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

/// Converts a decoded JSON value into a [`Document`]; anything other than an
/// object at the top level cannot be audited.
pub fn document_from_json(value: JsonValue) -> Result<Document, AuditError> {
    let kind = json_kind(&value);
    match Value::from(value) {
        Value::Document(doc) => Ok(doc),
        _ => Err(AuditError::NotADocument { kind }),
    }
}

pub fn parse_document(line: &str) -> Result<Document, AuditError> {
    let value: JsonValue = serde_json::from_str(line)?;
    document_from_json(value)
}

/// Reads a JSONL sample export. Blank lines are ignored; lines that do not
/// decode to a document are logged and skipped so one bad record never
/// aborts a run.
pub fn read_samples(path: &Path) -> Result<Vec<Document>> {
    let file = File::open(path).with_context(|| format!("Opening sample file {path:?}"))?;
    let reader = BufReader::new(file);
    let mut docs = Vec::new();
    let mut skipped = 0usize;
    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Reading line {} of {path:?}", idx + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        match parse_document(&line) {
            Ok(doc) => docs.push(doc),
            Err(err) => {
                skipped += 1;
                warn!("Skipping line {} of {path:?}: {err}", idx + 1);
            }
        }
    }
    debug!(
        "Loaded {} document(s) from {path:?} ({skipped} skipped)",
        docs.len()
    );
    Ok(docs)
}

fn decode_type_wrapper(map: &Map<String, JsonValue>) -> Option<Value> {
    if let Some(binary) = map.get("$binary") {
        return decode_binary(binary, map.get("$type"));
    }
    if map.len() != 1 {
        return None;
    }
    let (key, payload) = map.iter().next()?;
    match key.as_str() {
        "$oid" => payload.as_str().map(|oid| Value::ObjectId(oid.to_string())),
        "$uuid" => payload
            .as_str()
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .map(Value::Guid),
        "$date" => decode_date(payload).map(Value::DateTime),
        _ => None,
    }
}

fn decode_date(payload: &JsonValue) -> Option<DateTime<FixedOffset>> {
    match payload {
        JsonValue::String(raw) => DateTime::parse_from_rfc3339(raw)
            .ok()
            .or_else(|| parse_timestamp_text(raw).map(|dt| dt.fixed_offset())),
        JsonValue::Number(n) => n
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .map(|dt| dt.fixed_offset()),
        JsonValue::Object(inner) if inner.len() == 1 => inner
            .get("$numberLong")
            .and_then(JsonValue::as_str)
            .and_then(|raw| raw.parse::<i64>().ok())
            .and_then(DateTime::from_timestamp_millis)
            .map(|dt| dt.fixed_offset()),
        _ => None,
    }
}

fn decode_binary(binary: &JsonValue, legacy_type: Option<&JsonValue>) -> Option<Value> {
    match (binary, legacy_type) {
        (JsonValue::Object(inner), None) => {
            let base64 = inner.get("base64")?.as_str()?;
            let subtype = inner.get("subType")?.as_str()?;
            Some(Value::Binary {
                subtype: subtype.to_string(),
                base64: base64.to_string(),
            })
        }
        (JsonValue::String(base64), Some(JsonValue::String(subtype))) => Some(Value::Binary {
            subtype: subtype.clone(),
            base64: base64.clone(),
        }),
        _ => None,
    }
}
