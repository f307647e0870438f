//! Field-map diff between source collections and their normalized
//! ("simple") counterparts.

use std::collections::BTreeSet;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{
    data::Document,
    error::AuditError,
    flatten::{FlattenConfig, flatten},
};

const DEFAULT_PAIRS: &[(&str, &str)] = &[
    ("brazoria_inmates", "simple_brazoria"),
    ("fortbend_inmates", "simple_fortbend"),
    ("galveston_events", "simple_galveston"),
    ("jefferson_events", "simple_jefferson"),
    ("harris_bond", "simple_harris"),
    ("harris_misfel", "simple_harris"),
    ("harris_nafiling", "simple_harris"),
];

const EXPECTED_CANONICAL_KEYS: &[&str] = &[
    "name",
    "first_name",
    "last_name",
    "full_name",
    "offense",
    "charges",
    "bond_amount",
    "bond_total",
    "total_bond",
    "booking_date",
    "booking_date_iso",
    "booked_at",
    "arrest_date",
    "agency",
    "facility",
    "county",
    "status",
    "race",
    "sex",
    "time_bucket",
    "booking_priority",
    "booking_age_category",
    "source",
    "source_url",
    "scraped_at",
    "first_seen_at",
    "updated_at",
];

const RENAME_HINTS: &[(&[&str], &str)] = &[
    (
        &["total_bond", "bond_total"],
        "map to simple.bond_amount (or simple.total_bond)",
    ),
    (
        &["booked_at", "booking_date", "booking_date_iso", "arrest_date"],
        "map to simple.booking_date (ISO)",
    ),
    (
        &["charges", "offense", "charges_summary"],
        "map to simple.offense (primary) and simple.charges (list)",
    ),
    (&["agency", "arresting_agency"], "map to simple.agency"),
    (
        &["sex", "sex_code", "race", "race_code"],
        "map to simple.sex / simple.race",
    ),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionPair {
    pub source: String,
    pub canonical: String,
}

impl CollectionPair {
    pub fn new(source: impl Into<String>, canonical: impl Into<String>) -> Self {
        CollectionPair {
            source: source.into(),
            canonical: canonical.into(),
        }
    }
}

/// Parses `source:canonical` items separated by commas. Blank items are skipped.
pub fn parse_pairs(list: &str) -> Result<Vec<CollectionPair>, AuditError> {
    list.split(',')
        .filter(|item| !item.trim().is_empty())
        .map(|item| {
            let (source, canonical) = item
                .split_once(':')
                .ok_or_else(|| AuditError::InvalidPair(item.trim().to_string()))?;
            Ok(CollectionPair::new(source.trim(), canonical.trim()))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameHint {
    pub synonyms: Vec<String>,
    pub hint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldMapConfig {
    pub pairs: Vec<CollectionPair>,
    pub rename_hints: Vec<RenameHint>,
    pub expected_canonical_keys: BTreeSet<String>,
}

impl Default for FieldMapConfig {
    fn default() -> Self {
        FieldMapConfig {
            pairs: DEFAULT_PAIRS
                .iter()
                .map(|(source, canonical)| CollectionPair::new(*source, *canonical))
                .collect(),
            rename_hints: RENAME_HINTS
                .iter()
                .map(|(synonyms, hint)| RenameHint {
                    synonyms: synonyms.iter().map(|s| s.to_string()).collect(),
                    hint: hint.to_string(),
                })
                .collect(),
            expected_canonical_keys: EXPECTED_CANONICAL_KEYS
                .iter()
                .map(|key| key.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingCandidate {
    pub field: String,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizerCheck {
    pub field: String,
    pub expected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldMapDiff {
    pub source_fields: Vec<String>,
    pub canonical_fields: Vec<String>,
    /// Present in source, absent from canonical: candidate mappings needed.
    pub missing_in_canonical: Vec<MappingCandidate>,
    /// Present in canonical, absent from source: verify the normalizer.
    pub unused_in_canonical: Vec<NormalizerCheck>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionRole {
    Source,
    Canonical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PairOutcome {
    Compared(FieldMapDiff),
    MissingCollection { role: CollectionRole, name: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairReport {
    pub pair: CollectionPair,
    pub outcome: PairOutcome,
}

pub fn collect_field_set<'a, I>(docs: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a Document>,
{
    let config = FlattenConfig::keys_only();
    docs.into_iter()
        .flat_map(|doc| flatten(doc, &config).into_keys())
        .collect()
}

fn normalize(field: &str) -> String {
    field.trim().to_lowercase()
}

#[derive(Debug, Clone, Default)]
pub struct SchemaMapper {
    config: FieldMapConfig,
}

impl SchemaMapper {
    pub fn new(config: FieldMapConfig) -> Self {
        SchemaMapper { config }
    }

    pub fn config(&self) -> &FieldMapConfig {
        &self.config
    }

    pub fn rename_hint(&self, field: &str) -> Option<&str> {
        let lowered = field.to_lowercase();
        self.config
            .rename_hints
            .iter()
            .find(|hint| hint.synonyms.iter().any(|s| *s == lowered))
            .map(|hint| hint.hint.as_str())
    }

    pub fn is_expected_canonical(&self, field: &str) -> bool {
        self.config.expected_canonical_keys.contains(field)
    }

    pub fn diff(&self, source: &BTreeSet<String>, canonical: &BTreeSet<String>) -> FieldMapDiff {
        let source_norm: BTreeSet<String> = source.iter().map(|f| normalize(f)).collect();
        let canonical_norm: BTreeSet<String> = canonical.iter().map(|f| normalize(f)).collect();

        let missing_in_canonical = source
            .iter()
            .filter(|field| !canonical_norm.contains(&normalize(field)))
            .map(|field| MappingCandidate {
                field: field.clone(),
                hint: self.rename_hint(field).map(str::to_string),
            })
            .collect();
        let unused_in_canonical = canonical
            .iter()
            .filter(|field| !source_norm.contains(&normalize(field)))
            .map(|field| NormalizerCheck {
                field: field.clone(),
                expected: self.is_expected_canonical(field),
            })
            .collect();

        FieldMapDiff {
            source_fields: source.iter().cloned().collect(),
            canonical_fields: canonical.iter().cloned().collect(),
            missing_in_canonical,
            unused_in_canonical,
        }
    }

    /// Compares every pair, using `lookup` to fetch a collection's sample.
    /// A missing collection produces a warning entry and the run continues.
    pub fn compare_pairs<'d, F>(&self, pairs: &[CollectionPair], mut lookup: F) -> Vec<PairReport>
    where
        F: FnMut(&str) -> Option<&'d [Document]>,
    {
        pairs
            .iter()
            .map(|pair| {
                let outcome = match (lookup(&pair.source), lookup(&pair.canonical)) {
                    (None, _) => missing(pair, CollectionRole::Source, &pair.source),
                    (_, None) => missing(pair, CollectionRole::Canonical, &pair.canonical),
                    (Some(source_docs), Some(canonical_docs)) => {
                        let source = collect_field_set(source_docs);
                        let canonical = collect_field_set(canonical_docs);
                        debug!(
                            "Comparing {} ({} fields) with {} ({} fields)",
                            pair.source,
                            source.len(),
                            pair.canonical,
                            canonical.len()
                        );
                        PairOutcome::Compared(self.diff(&source, &canonical))
                    }
                };
                PairReport {
                    pair: pair.clone(),
                    outcome,
                }
            })
            .collect()
    }
}

fn missing(pair: &CollectionPair, role: CollectionRole, name: &str) -> PairOutcome {
    warn!(
        "Skipping pair {} -> {}: {} collection not found: {name}",
        pair.source,
        pair.canonical,
        match role {
            CollectionRole::Source => "source",
            CollectionRole::Canonical => "canonical",
        }
    );
    PairOutcome::MissingCollection {
        role,
        name: name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_pairs_skips_blanks_and_trims() {
        let pairs =
            parse_pairs(" harris_bond:simple_harris, ,galveston_events : simple_galveston")
                .unwrap();
        assert_eq!(
            pairs,
            vec![
                CollectionPair::new("harris_bond", "simple_harris"),
                CollectionPair::new("galveston_events", "simple_galveston"),
            ]
        );
    }

    #[test]
    fn parse_pairs_rejects_items_without_separator() {
        let err = parse_pairs("harris_bond").unwrap_err();
        assert!(matches!(err, AuditError::InvalidPair(item) if item == "harris_bond"));
    }

    #[test]
    fn rename_hints_match_lowercased_path() {
        let mapper = SchemaMapper::default();
        assert_eq!(
            mapper.rename_hint("Booked_At"),
            Some("map to simple.booking_date (ISO)")
        );
        assert_eq!(mapper.rename_hint("inmate.name"), None);
    }
}
