//! Canonical booking facts resolved from source-specific fields.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use itertools::Itertools;
use log::debug;
use serde::Serialize;

use crate::{
    coerce::{extract_numeric, extract_timestamp},
    data::{Document, Value},
    profile::ProfileTable,
};

pub const NO_CANDIDATE_FIELD: &str = "no_candidate_field";

/// Walks a dotted path, fanning out over every element of any array met on
/// the way. Null terminals are dropped; values come back in document order.
pub fn resolve_path<'a>(doc: &'a Document, path: &str) -> Vec<&'a Value> {
    let parts = path.split('.').collect::<Vec<_>>();
    let mut resolved = Vec::new();
    let Some(first) = doc.get(parts[0]) else {
        return resolved;
    };
    let mut stack = vec![(first, 1usize)];
    while let Some((node, depth)) = stack.pop() {
        if node.is_null() {
            continue;
        }
        if depth == parts.len() {
            resolved.push(node);
            continue;
        }
        match node {
            Value::Array(items) => stack.extend(items.iter().rev().map(|item| (item, depth))),
            Value::Document(inner) => {
                if let Some(child) = inner.get(parts[depth]) {
                    stack.push((child, depth + 1));
                }
            }
            _ => {}
        }
    }
    resolved
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolved<T> {
    pub field: String,
    pub value: T,
}

/// Evaluates candidate fields in order and stops at the first one whose
/// resolved values `resolve` accepts.
pub fn first_resolved<T, F>(
    doc: &Document,
    candidates: &[String],
    mut resolve: F,
) -> Option<Resolved<T>>
where
    F: FnMut(Vec<&Value>) -> Option<T>,
{
    candidates.iter().find_map(|field| {
        resolve(resolve_path(doc, field)).map(|value| Resolved {
            field: field.clone(),
            value,
        })
    })
}

pub fn first_timestamp(doc: &Document, candidates: &[String]) -> Option<Resolved<DateTime<Utc>>> {
    first_resolved(doc, candidates, |values| {
        values.into_iter().find_map(extract_timestamp)
    })
}

/// Sum of every numeric element under the first field that yields one.
/// Negative numbers carry no amount signal.
pub fn first_amount(doc: &Document, candidates: &[String]) -> Option<Resolved<f64>> {
    first_resolved(doc, candidates, |values| {
        let amounts = values
            .into_iter()
            .filter_map(extract_numeric)
            .filter(|amount| *amount >= 0.0)
            .collect::<Vec<_>>();
        (!amounts.is_empty()).then(|| amounts.iter().sum::<f64>())
    })
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DerivedFact {
    pub timestamp: Option<DateTime<Utc>>,
    pub amount: Option<f64>,
    pub timestamp_field: Option<String>,
    pub amount_field: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct FactDeriver {
    profiles: ProfileTable,
}

impl FactDeriver {
    pub fn new(profiles: ProfileTable) -> Self {
        FactDeriver { profiles }
    }

    pub fn profiles(&self) -> &ProfileTable {
        &self.profiles
    }

    pub fn timestamp_candidates(&self, source: &str) -> &[String] {
        self.profiles
            .get(source)
            .map(|profile| profile.timestamp_fields.as_slice())
            .unwrap_or(&[])
    }

    pub fn money_candidates(&self, source: &str) -> &[String] {
        self.profiles
            .get(source)
            .map(|profile| profile.money_fields.as_slice())
            .unwrap_or(&[])
    }

    pub fn derive_timestamp(&self, source: &str, doc: &Document) -> Option<DateTime<Utc>> {
        first_timestamp(doc, self.timestamp_candidates(source)).map(|r| r.value)
    }

    pub fn derive_amount(&self, source: &str, doc: &Document) -> Option<f64> {
        first_amount(doc, self.money_candidates(source)).map(|r| r.value)
    }

    pub fn derive(&self, source: &str, doc: &Document) -> DerivedFact {
        if self.profiles.get(source).is_none() {
            debug!("No source profile for '{source}'; derived facts are empty");
            return DerivedFact::default();
        }
        let timestamp = first_timestamp(doc, self.timestamp_candidates(source));
        let amount = first_amount(doc, self.money_candidates(source));
        DerivedFact {
            timestamp_field: timestamp.as_ref().map(|r| r.field.clone()),
            timestamp: timestamp.map(|r| r.value),
            amount_field: amount.as_ref().map(|r| r.field.clone()),
            amount: amount.map(|r| r.value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DerivationCoverage {
    pub total: usize,
    pub with_timestamp: usize,
    pub with_amount: usize,
    /// For undated documents: the kinds found under the timestamp candidates.
    pub missing_date_hints: BTreeMap<String, usize>,
}

impl DerivationCoverage {
    pub fn record(&mut self, doc: &Document, fact: &DerivedFact, timestamp_candidates: &[String]) {
        self.total += 1;
        if fact.amount.is_some() {
            self.with_amount += 1;
        }
        if fact.timestamp.is_some() {
            self.with_timestamp += 1;
            return;
        }
        let kinds = timestamp_candidates
            .iter()
            .filter_map(|field| resolve_path(doc, field).first().map(|v| v.kind().as_str()))
            .collect::<BTreeSet<_>>();
        let hint = if kinds.is_empty() {
            NO_CANDIDATE_FIELD.to_string()
        } else {
            kinds.into_iter().join(",")
        };
        *self.missing_date_hints.entry(hint).or_insert(0) += 1;
    }

    pub fn timestamp_percent(&self) -> f64 {
        percent(self.with_timestamp, self.total)
    }

    pub fn amount_percent(&self) -> f64 {
        percent(self.with_amount, self.total)
    }

    pub fn top_missing_hints(&self, top: usize) -> Vec<(&str, usize)> {
        let mut hints = self
            .missing_date_hints
            .iter()
            .map(|(hint, count)| (hint.as_str(), *count))
            .collect::<Vec<_>>();
        hints.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        hints.truncate(top);
        hints
    }
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (1000.0 * part as f64 / total as f64).round() / 10.0
}
