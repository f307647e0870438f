//! Per-field source profiles: presence, examples, numeric and date spreads,
//! and top counts for low-cardinality fields.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::LazyLock,
};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    data::ValueKind,
    stats::{DateRange, DistinctValue, FieldStatistics, FieldStatsAggregator, NumericSummary},
};

static INDEX_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\d*\]").expect("valid index pattern"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldProfileConfig {
    pub top_counts: usize,
    /// Unhinted fields get top counts only at or below this many distinct values.
    pub max_distinct_for_counts: usize,
    pub categorical_hints: BTreeSet<String>,
    pub numeric_hints: BTreeSet<String>,
}

fn hint_set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|name| name.to_string()).collect()
}

impl Default for FieldProfileConfig {
    fn default() -> Self {
        FieldProfileConfig {
            top_counts: 10,
            max_distinct_for_counts: 50,
            categorical_hints: hint_set(&[
                "county",
                "category",
                "facility",
                "agency",
                "status",
                "race",
                "race_code",
                "sex",
                "sex_code",
                "group",
                "source",
                "time_bucket",
                "city",
                "state",
            ]),
            numeric_hints: hint_set(&["bond_amount", "total_bond", "amount", "fine", "age"]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldProfile {
    pub field: String,
    pub present_pct: f64,
    pub types: BTreeMap<ValueKind, usize>,
    pub examples: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric: Option<NumericSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dates: Option<DateRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_counts: Option<Vec<(String, usize)>>,
}

#[derive(Debug, Clone, Default)]
pub struct FieldProfiler {
    config: FieldProfileConfig,
}

impl FieldProfiler {
    pub fn new(config: FieldProfileConfig) -> Self {
        FieldProfiler { config }
    }

    pub fn profile_all(&self, aggregator: &FieldStatsAggregator) -> Vec<FieldProfile> {
        aggregator
            .fields()
            .map(|(path, stats)| self.profile(path, stats, aggregator.docs_seen()))
            .collect()
    }

    pub fn profile(&self, path: &str, stats: &FieldStatistics, docs_seen: usize) -> FieldProfile {
        let hint = hint_key(path);
        let present_pct = if docs_seen == 0 {
            0.0
        } else {
            (1000.0 * stats.docs_with_value as f64 / docs_seen as f64).round() / 10.0
        };
        let numeric = if self.config.numeric_hints.contains(hint.as_str()) || stats.only_numbers() {
            NumericSummary::from_values(stats.numbers())
        } else {
            None
        };
        FieldProfile {
            field: path.to_string(),
            present_pct,
            types: stats.kinds.clone(),
            examples: stats.examples().to_vec(),
            numeric,
            dates: stats.date_range(),
            top_counts: self.top_counts(&hint, stats),
        }
    }

    fn top_counts(&self, hint: &str, stats: &FieldStatistics) -> Option<Vec<(String, usize)>> {
        stats.unique_count()?;
        let ranked = stats
            .top_values(usize::MAX)
            .into_iter()
            .filter(|(value, _)| *value != DistinctValue::Null)
            .collect::<Vec<_>>();
        let hinted = self.config.categorical_hints.contains(hint);
        if !hinted && !(1..=self.config.max_distinct_for_counts).contains(&ranked.len()) {
            return None;
        }
        let counts = ranked
            .into_iter()
            .take(self.config.top_counts)
            .map(|(value, count)| (value.to_string(), count))
            .collect();
        Some(counts)
    }
}

/// Field path with array indices removed, so `charges[0].amount` and
/// `charges[1].amount` share the hint key `charges.amount`.
fn hint_key(path: &str) -> String {
    INDEX_SEGMENT.replace_all(path, "").into_owned()
}
