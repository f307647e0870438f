//! Cardinality heuristics deciding which fields behave as categorical labels.

use std::{
    collections::{BTreeMap, HashSet},
    fmt,
};

use itertools::Itertools;
use serde::{Deserialize, Serialize, Serializer};

use crate::{
    data::ValueKind,
    stats::{FieldStatistics, FieldStatsAggregator},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Absolute distinct-value ceiling for a categorical field.
    pub max_unique: usize,
    /// Distinct values over non-null occurrences.
    pub max_unique_ratio: f64,
    /// Occurrences a boolean or small-int field needs before it qualifies.
    pub min_count: usize,
    pub small_int_as_categorical: bool,
    pub small_int_max_unique: usize,
    /// Case-insensitive path substrings that mark identifier fields.
    pub identifier_markers: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        ClassifierConfig {
            max_unique: 25,
            max_unique_ratio: 0.1,
            min_count: 25,
            small_int_as_categorical: false,
            small_int_max_unique: 12,
            identifier_markers: vec!["_id".to_string(), "uuid".to_string(), "guid".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reason {
    TooManyUniquesToCount,
    BoolField,
    UniqueValues { unique: usize, max_unique: usize },
    UniqueRatio { ratio: f64, max_ratio: f64 },
    SmallIntCode { max_unique: usize },
    OverriddenByIdentifierName,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::TooManyUniquesToCount => f.write_str("too_many_uniques_to_count"),
            Reason::BoolField => f.write_str("bool_field"),
            Reason::UniqueValues { unique, max_unique } => {
                write!(f, "unique_values<=max_unique({unique}<={max_unique})")
            }
            Reason::UniqueRatio { ratio, max_ratio } => {
                write!(f, "unique_ratio<=max_unique_ratio({ratio:.4}<={max_ratio})")
            }
            Reason::SmallIntCode { max_unique } => {
                write!(f, "small_int_code(unique_values<={max_unique})")
            }
            Reason::OverriddenByIdentifierName => f.write_str("overridden_by_identifier_name"),
        }
    }
}

impl Serialize for Reason {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub categorical: bool,
    pub reasons: Vec<Reason>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoricalVerdict {
    pub field: String,
    pub docs_seen: usize,
    pub docs_with_field: usize,
    pub non_null_count: usize,
    pub types: BTreeMap<ValueKind, usize>,
    pub unique_values: Option<usize>,
    pub unique_ratio: Option<f64>,
    pub top_values: String,
    pub indexed: bool,
    pub categorical: bool,
    pub reasons: Vec<Reason>,
}

impl CategoricalVerdict {
    pub fn reasons_joined(&self) -> String {
        self.reasons.iter().join("|")
    }
}

#[derive(Debug, Clone)]
pub struct CategoricalClassifier {
    config: ClassifierConfig,
    markers: Vec<String>,
}

impl CategoricalClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        let markers = config
            .identifier_markers
            .iter()
            .map(|m| m.to_lowercase())
            .collect();
        CategoricalClassifier { config, markers }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn looks_like_identifier(&self, path: &str) -> bool {
        let lowered = path.to_lowercase();
        self.markers.iter().any(|marker| lowered.contains(marker.as_str()))
    }

    /// Applies the rules in order. The first rule that fires sets the flag;
    /// the identifier override runs last and always wins.
    pub fn classify(&self, path: &str, stats: &FieldStatistics) -> Decision {
        let config = &self.config;
        let mut reasons = Vec::new();
        let unique = stats.unique_count();
        let ratio = stats.unique_ratio();
        if unique.is_none() {
            reasons.push(Reason::TooManyUniquesToCount);
        }

        let mut categorical = false;
        if stats.kind_count(ValueKind::Bool) >= config.min_count {
            categorical = true;
            reasons.push(Reason::BoolField);
        }

        if !categorical && let Some(unique) = unique {
            if unique <= config.max_unique {
                categorical = true;
                reasons.push(Reason::UniqueValues {
                    unique,
                    max_unique: config.max_unique,
                });
            } else if let Some(ratio) = ratio
                && ratio <= config.max_unique_ratio
            {
                categorical = true;
                reasons.push(Reason::UniqueRatio {
                    ratio,
                    max_ratio: config.max_unique_ratio,
                });
            }
        }

        if !categorical
            && config.small_int_as_categorical
            && stats.kind_count(ValueKind::Int) >= config.min_count
            && unique.is_some_and(|u| u <= config.small_int_max_unique)
        {
            categorical = true;
            reasons.push(Reason::SmallIntCode {
                max_unique: config.small_int_max_unique,
            });
        }

        if self.looks_like_identifier(path) {
            if categorical {
                reasons.push(Reason::OverriddenByIdentifierName);
            }
            categorical = false;
        }

        Decision {
            categorical,
            reasons,
        }
    }

    pub fn verdict(
        &self,
        path: &str,
        stats: &FieldStatistics,
        docs_seen: usize,
        top_values: usize,
        indexed: bool,
    ) -> CategoricalVerdict {
        let Decision {
            categorical,
            reasons,
        } = self.classify(path, stats);
        CategoricalVerdict {
            field: path.to_string(),
            docs_seen,
            docs_with_field: stats.docs_with_field,
            non_null_count: stats.non_null_count,
            types: stats.kinds.clone(),
            unique_values: stats.unique_count(),
            unique_ratio: stats.unique_ratio().map(round6),
            top_values: stats.render_top_values(top_values),
            indexed,
            categorical,
            reasons,
        }
    }

    pub fn classify_all(
        &self,
        aggregator: &FieldStatsAggregator,
        top_values: usize,
        index_keys: &HashSet<String>,
    ) -> Vec<CategoricalVerdict> {
        aggregator
            .fields()
            .map(|(path, stats)| {
                self.verdict(
                    path,
                    stats,
                    aggregator.docs_seen(),
                    top_values,
                    index_keys.contains(path),
                )
            })
            .collect()
    }
}

impl Default for CategoricalClassifier {
    fn default() -> Self {
        CategoricalClassifier::new(ClassifierConfig::default())
    }
}

fn round6(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_strings_match_report_format() {
        assert_eq!(
            Reason::UniqueValues {
                unique: 20,
                max_unique: 25
            }
            .to_string(),
            "unique_values<=max_unique(20<=25)"
        );
        assert_eq!(
            Reason::UniqueRatio {
                ratio: 0.0125,
                max_ratio: 0.1
            }
            .to_string(),
            "unique_ratio<=max_unique_ratio(0.0125<=0.1)"
        );
        assert_eq!(
            Reason::SmallIntCode { max_unique: 12 }.to_string(),
            "small_int_code(unique_values<=12)"
        );
    }

    #[test]
    fn identifier_markers_match_case_insensitively() {
        let classifier = CategoricalClassifier::new(ClassifierConfig::default());
        assert!(classifier.looks_like_identifier("Inmate_ID"));
        assert!(classifier.looks_like_identifier("person.GUID"));
        assert!(!classifier.looks_like_identifier("race"));
    }

    #[test]
    fn round6_keeps_six_places() {
        assert_eq!(round6(0.123456789), 0.123457);
    }
}
