//! One-collection audit pass: field verdicts plus derived booking facts.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::Serialize;

use crate::{
    classify::{CategoricalClassifier, CategoricalVerdict},
    config::AuditConfig,
    data::Document,
    derive::{DerivationCoverage, DerivedFact, FactDeriver},
    flatten::flatten,
    stats::{FieldStatsAggregator, NumericSummary},
    summary::{FieldProfile, FieldProfiler},
    window::{GroupedWindows, WindowBucketizer, WindowTable},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionReport {
    pub source: String,
    pub group: Option<String>,
    pub docs_seen: usize,
    pub verdicts: Vec<CategoricalVerdict>,
    pub fields: Vec<FieldProfile>,
    pub coverage: DerivationCoverage,
    pub windows: WindowTable,
    pub amount_summary: Option<NumericSummary>,
}

impl CollectionReport {
    pub fn categorical_fields(&self) -> impl Iterator<Item = &str> {
        self.verdicts
            .iter()
            .filter(|verdict| verdict.categorical)
            .map(|verdict| verdict.field.as_str())
    }

    pub fn verdict(&self, field: &str) -> Option<&CategoricalVerdict> {
        self.verdicts.iter().find(|verdict| verdict.field == field)
    }

    pub fn field_profile(&self, field: &str) -> Option<&FieldProfile> {
        self.fields.iter().find(|profile| profile.field == field)
    }
}

pub struct CollectionAudit<'c> {
    config: &'c AuditConfig,
    classifier: CategoricalClassifier,
    profiler: FieldProfiler,
    deriver: FactDeriver,
}

impl<'c> CollectionAudit<'c> {
    pub fn new(config: &'c AuditConfig) -> Self {
        CollectionAudit {
            config,
            classifier: CategoricalClassifier::new(config.classifier.clone()),
            profiler: FieldProfiler::new(config.field_profile.clone()),
            deriver: FactDeriver::new(config.profiles.clone()),
        }
    }

    pub fn deriver(&self) -> &FactDeriver {
        &self.deriver
    }

    /// Runs every stage over `docs`. `now` is the fixed reference instant for
    /// the window pass; `index_keys` marks fields the collection indexes.
    pub fn run(
        &self,
        source: &str,
        docs: &[Document],
        now: DateTime<Utc>,
        index_keys: &HashSet<String>,
    ) -> CollectionReport {
        let mut aggregator = FieldStatsAggregator::new();
        let mut coverage = DerivationCoverage::default();
        let mut bucketizer = WindowBucketizer::new(now);
        let mut amounts = Vec::new();
        let timestamp_candidates = self.deriver.timestamp_candidates(source);

        for doc in docs {
            aggregator.ingest_flat(&flatten(doc, &self.config.flatten));
            let fact = self.deriver.derive(source, doc);
            coverage.record(doc, &fact, timestamp_candidates);
            fold_fact(&mut bucketizer, &mut amounts, &fact);
        }

        let verdicts = self
            .classifier
            .classify_all(&aggregator, self.config.top_values, index_keys);
        let windows = bucketizer.into_table();
        info!(
            "Audited {source}: {} doc(s), {} field(s), {} categorical, {:.1}% dated, \
             {} in last 72h",
            aggregator.docs_seen(),
            verdicts.len(),
            verdicts.iter().filter(|v| v.categorical).count(),
            coverage.timestamp_percent(),
            windows.total_count()
        );

        CollectionReport {
            source: source.to_string(),
            group: self.config.profiles.group_of(source).map(str::to_string),
            docs_seen: aggregator.docs_seen(),
            verdicts,
            fields: self.profiler.profile_all(&aggregator),
            coverage,
            windows,
            amount_summary: NumericSummary::from_values(&amounts),
        }
    }
}

fn fold_fact(bucketizer: &mut WindowBucketizer, amounts: &mut Vec<f64>, fact: &DerivedFact) {
    if let Some(amount) = fact.amount {
        amounts.push(amount);
    }
    let Some(timestamp) = fact.timestamp else {
        return;
    };
    if bucketizer.record(timestamp, fact.amount).is_none() {
        debug!("Timestamp {timestamp} falls outside every window");
    }
}

/// Rolls per-collection window tables up into their reporting groups.
/// Collections without a group report under their own name.
pub fn group_windows(reports: &[CollectionReport], now: DateTime<Utc>) -> GroupedWindows {
    let mut grouped = GroupedWindows::new(now);
    for report in reports {
        let group = report.group.as_deref().unwrap_or(&report.source);
        grouped.absorb(group, &report.windows);
    }
    grouped
}
