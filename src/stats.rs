//! Per-field running statistics over a document sample.

use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashMap, HashSet},
    fmt,
    hash::{Hash, Hasher},
};

use chrono::{DateTime, SecondsFormat, Utc};
use itertools::Itertools;
use log::warn;
use serde::Serialize;

use crate::{
    data::{Value, ValueKind},
    flatten::FlatDocument,
};

/// Distinct values tracked per field before counting is abandoned for the run.
pub const DISTINCT_VALUE_CAP: usize = 5000;

const PREVIEW_MAX_CHARS: usize = 60;

pub const EXAMPLE_LIMIT: usize = 5;

const EXAMPLE_MAX_CHARS: usize = 120;

/// Float wrapper with bitwise equality so it can key a value counter.
#[derive(Debug, Clone, Copy)]
pub struct FloatKey(f64);

impl FloatKey {
    fn new(value: f64) -> Self {
        // -0.0 and 0.0 are the same observed value.
        FloatKey(if value == 0.0 { 0.0 } else { value })
    }
}

impl PartialEq for FloatKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for FloatKey {}

impl Hash for FloatKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl Ord for FloatKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl PartialOrd for FloatKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DistinctValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(FloatKey),
    Text(String),
    Timestamp(String),
    Identifier(String),
}

impl DistinctValue {
    /// `None` for kinds that are not worth counting (nested, binary).
    pub fn from_value(value: &Value) -> Option<Self> {
        Some(match value {
            Value::Null => DistinctValue::Null,
            Value::Boolean(b) => DistinctValue::Boolean(*b),
            Value::Integer(i) => DistinctValue::Integer(*i),
            // 1.0 and 1 are one observed value.
            Value::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                DistinctValue::Integer(*f as i64)
            }
            Value::Float(f) => DistinctValue::Float(FloatKey::new(*f)),
            Value::String(s) => DistinctValue::Text(s.clone()),
            Value::DateTime(dt) => {
                DistinctValue::Timestamp(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Value::NaiveDateTime(dt) => {
                DistinctValue::Timestamp(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
            }
            Value::ObjectId(oid) => DistinctValue::Identifier(oid.clone()),
            Value::Guid(g) => DistinctValue::Identifier(g.to_string()),
            Value::Binary { .. } | Value::Array(_) | Value::Document(_) => return None,
        })
    }
}

impl fmt::Display for DistinctValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistinctValue::Null => f.write_str("null"),
            DistinctValue::Boolean(b) => write!(f, "{b}"),
            DistinctValue::Integer(i) => write!(f, "{i}"),
            DistinctValue::Float(FloatKey(v)) => write!(f, "{}", Value::Float(*v)),
            DistinctValue::Text(s) => write!(f, "{s:?}"),
            DistinctValue::Timestamp(ts) => write!(f, "{ts}"),
            DistinctValue::Identifier(id) => write!(f, "{id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub min: DateTime<Utc>,
    pub max: DateTime<Utc>,
}

impl DateRange {
    fn widen(range: Option<DateRange>, at: DateTime<Utc>) -> DateRange {
        match range {
            Some(r) => DateRange {
                min: r.min.min(at),
                max: r.max.max(at),
            },
            None => DateRange { min: at, max: at },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FieldStatistics {
    pub non_null_count: usize,
    pub docs_with_field: usize,
    pub docs_with_value: usize,
    pub kinds: BTreeMap<ValueKind, usize>,
    values: HashMap<DistinctValue, usize>,
    too_many_uniques: bool,
    examples: Vec<String>,
    numbers: Vec<f64>,
    saw_non_numeric: bool,
    dates: Option<DateRange>,
}

impl FieldStatistics {
    fn record(&mut self, path: &str, value: &Value) {
        *self.kinds.entry(value.kind()).or_insert(0) += 1;
        if !value.is_null() {
            self.non_null_count += 1;
            if self.examples.len() < EXAMPLE_LIMIT {
                self.examples
                    .push(truncate_to(&value.to_json().to_string(), EXAMPLE_MAX_CHARS));
            }
        }
        match value {
            Value::Array(items) => items.iter().for_each(|item| self.observe_scalar(item)),
            other => self.observe_scalar(other),
        }
        if self.too_many_uniques {
            return;
        }
        let Some(key) = DistinctValue::from_value(value) else {
            return;
        };
        *self.values.entry(key).or_insert(0) += 1;
        self.enforce_cap(path);
    }

    // Arrays count as numeric containers; their direct items feed the
    // number and date accumulators.
    fn observe_scalar(&mut self, value: &Value) {
        match value {
            Value::Null | Value::Array(_) | Value::Document(_) => {}
            Value::Integer(i) => self.numbers.push(*i as f64),
            Value::Float(f) if f.is_nan() => self.saw_non_numeric = true,
            Value::Float(f) => self.numbers.push(*f),
            Value::DateTime(dt) => {
                self.saw_non_numeric = true;
                self.dates = Some(DateRange::widen(self.dates, dt.with_timezone(&Utc)));
            }
            Value::NaiveDateTime(dt) => {
                self.saw_non_numeric = true;
                self.dates = Some(DateRange::widen(self.dates, dt.and_utc()));
            }
            _ => self.saw_non_numeric = true,
        }
    }

    fn enforce_cap(&mut self, path: &str) {
        if self.values.len() > DISTINCT_VALUE_CAP {
            warn!(
                "Field '{path}' exceeded {DISTINCT_VALUE_CAP} distinct values; \
                 distinct counting disabled"
            );
            self.too_many_uniques = true;
            self.values.clear();
            self.values.shrink_to_fit();
        }
    }

    pub fn kind_count(&self, kind: ValueKind) -> usize {
        self.kinds.get(&kind).copied().unwrap_or(0)
    }

    pub fn too_many_uniques(&self) -> bool {
        self.too_many_uniques
    }

    pub fn unique_count(&self) -> Option<usize> {
        (!self.too_many_uniques).then_some(self.values.len())
    }

    /// Unique values over non-null occurrences; unknown when uncounted or when
    /// the field never held a non-null value.
    pub fn unique_ratio(&self) -> Option<f64> {
        let unique = self.unique_count()?;
        (self.non_null_count > 0).then(|| unique as f64 / self.non_null_count as f64)
    }

    pub fn examples(&self) -> &[String] {
        &self.examples
    }

    pub fn numbers(&self) -> &[f64] {
        &self.numbers
    }

    /// True when every non-null occurrence was a number or an array.
    pub fn only_numbers(&self) -> bool {
        !self.saw_non_numeric
    }

    pub fn date_range(&self) -> Option<DateRange> {
        self.dates
    }

    pub fn top_values(&self, top: usize) -> Vec<(DistinctValue, usize)> {
        let mut items = self
            .values
            .iter()
            .map(|(value, count)| (value.clone(), *count))
            .collect::<Vec<_>>();
        items.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        items.truncate(top);
        items
    }

    /// `value:count` pairs joined by `"; "`, with long previews truncated.
    pub fn render_top_values(&self, top: usize) -> String {
        self.top_values(top)
            .into_iter()
            .map(|(value, count)| format!("{}:{count}", truncate_preview(&value.to_string())))
            .join("; ")
    }

    fn merge(&mut self, path: &str, other: FieldStatistics) {
        self.non_null_count += other.non_null_count;
        self.docs_with_field += other.docs_with_field;
        self.docs_with_value += other.docs_with_value;
        for (kind, count) in other.kinds {
            *self.kinds.entry(kind).or_insert(0) += count;
        }
        let room = EXAMPLE_LIMIT.saturating_sub(self.examples.len());
        self.examples.extend(other.examples.into_iter().take(room));
        self.numbers.extend(other.numbers);
        self.saw_non_numeric |= other.saw_non_numeric;
        self.dates = match (self.dates, other.dates) {
            (Some(mine), Some(theirs)) => Some(DateRange {
                min: mine.min.min(theirs.min),
                max: mine.max.max(theirs.max),
            }),
            (mine, theirs) => mine.or(theirs),
        };
        if other.too_many_uniques {
            self.too_many_uniques = true;
            self.values.clear();
            return;
        }
        if self.too_many_uniques {
            return;
        }
        for (value, count) in other.values {
            *self.values.entry(value).or_insert(0) += count;
        }
        self.enforce_cap(path);
    }
}

fn truncate_preview(value: &str) -> String {
    truncate_to(value, PREVIEW_MAX_CHARS)
}

fn truncate_to(value: &str, max_chars: usize) -> String {
    if value.chars().count() > max_chars {
        let kept: String = value.chars().take(max_chars - 3).collect();
        format!("{kept}...")
    } else {
        value.to_string()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FieldStatsAggregator {
    docs_seen: usize,
    fields: BTreeMap<String, FieldStatistics>,
}

impl FieldStatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one document given as `(path, value)` occurrences. A path that
    /// repeats within the document is counted present once, but every
    /// occurrence lands in the kind histogram.
    pub fn ingest<'a, I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (&'a str, &'a Value)>,
    {
        self.docs_seen += 1;
        let mut seen_this_doc: HashSet<&str> = HashSet::new();
        let mut valued_this_doc: HashSet<&str> = HashSet::new();
        for (path, value) in entries {
            if path.is_empty() {
                continue;
            }
            let stats = self.fields.entry(path.to_string()).or_default();
            if seen_this_doc.insert(path) {
                stats.docs_with_field += 1;
            }
            if !value.is_null() && valued_this_doc.insert(path) {
                stats.docs_with_value += 1;
            }
            stats.record(path, value);
        }
    }

    pub fn ingest_flat(&mut self, flat: &FlatDocument) {
        self.ingest(flat.iter().map(|(path, value)| (path.as_str(), value)));
    }

    pub fn merge(&mut self, other: FieldStatsAggregator) {
        self.docs_seen += other.docs_seen;
        for (path, stats) in other.fields {
            match self.fields.get_mut(&path) {
                Some(existing) => existing.merge(&path, stats),
                None => {
                    self.fields.insert(path, stats);
                }
            }
        }
    }

    pub fn docs_seen(&self) -> usize {
        self.docs_seen
    }

    pub fn field(&self, path: &str) -> Option<&FieldStatistics> {
        self.fields.get(path)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldStatistics)> {
        self.fields.iter().map(|(path, stats)| (path.as_str(), stats))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSummary {
    pub count: usize,
    pub min: f64,
    pub p25: f64,
    pub median: f64,
    pub p75: f64,
    pub max: f64,
    pub mean: f64,
}

impl NumericSummary {
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let mut sorted = values
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .collect::<Vec<_>>();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(f64::total_cmp);
        let count = sorted.len();
        let min = sorted[0];
        let max = sorted[count - 1];
        let (p25, p75) = if count >= 4 {
            (inclusive_quantile(&sorted, 0.25), inclusive_quantile(&sorted, 0.75))
        } else {
            (min, max)
        };
        Some(NumericSummary {
            count,
            min,
            p25,
            median: inclusive_quantile(&sorted, 0.5),
            p75,
            max,
            mean: sorted.iter().sum::<f64>() / count as f64,
        })
    }
}

fn inclusive_quantile(sorted: &[f64], q: f64) -> f64 {
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}
