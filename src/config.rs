//! Immutable audit configuration, built once and passed to each stage.
//!
//! Every section has defaults matching the stock source tables, so an empty
//! YAML document is a valid configuration:
//!
//! ```yaml
//! top_values: 5
//! classifier:
//!   max_unique: 40
//!   small_int_as_categorical: true
//! profiles:
//!   custody_events:
//!     timestamp_fields: [booked_at]
//!     money_fields: [charges.bond]
//!     group: galveston
//! field_profile:
//!   numeric_hints: [bond_amount, total_bond]
//! ```

use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    classify::ClassifierConfig, error::AuditError, fieldmap::FieldMapConfig,
    flatten::FlattenConfig, profile::ProfileTable, summary::FieldProfileConfig,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub flatten: FlattenConfig,
    pub classifier: ClassifierConfig,
    pub top_values: usize,
    pub profiles: ProfileTable,
    pub field_map: FieldMapConfig,
    pub field_profile: FieldProfileConfig,
}

impl Default for AuditConfig {
    fn default() -> Self {
        AuditConfig {
            flatten: FlattenConfig::default(),
            classifier: ClassifierConfig::default(),
            top_values: 10,
            profiles: ProfileTable::default(),
            field_map: FieldMapConfig::default(),
            field_profile: FieldProfileConfig::default(),
        }
    }
}

impl AuditConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, AuditError> {
        let config: AuditConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening audit config {path:?}"))?;
        let reader = BufReader::new(file);
        let config: AuditConfig =
            serde_yaml::from_reader(reader).context("Parsing audit config YAML")?;
        config
            .validate()
            .with_context(|| format!("Validating audit config {path:?}"))?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Serializing audit config to YAML")
    }

    pub fn validate(&self) -> Result<(), AuditError> {
        if self.flatten.separator.is_empty() {
            return Err(AuditError::InvalidSetting {
                setting: "flatten.separator",
                message: "must not be empty".to_string(),
            });
        }
        let ratio = self.classifier.max_unique_ratio;
        if !(0.0..=1.0).contains(&ratio) {
            return Err(AuditError::InvalidSetting {
                setting: "classifier.max_unique_ratio",
                message: format!("{ratio} is outside 0..=1"),
            });
        }
        if self.field_profile.top_counts == 0 {
            return Err(AuditError::InvalidSetting {
                setting: "field_profile.top_counts",
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_yields_defaults() {
        let config = AuditConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, AuditConfig::default());
    }

    #[test]
    fn field_profile_hints_replace_defaults() {
        let config =
            AuditConfig::from_yaml_str("field_profile:\n  numeric_hints: [bail]\n").unwrap();
        assert!(config.field_profile.numeric_hints.contains("bail"));
        assert!(!config.field_profile.numeric_hints.contains("age"));
        assert!(config.field_profile.categorical_hints.contains("sex"));
        assert!(AuditConfig::from_yaml_str("field_profile:\n  top_counts: 0\n").is_err());
    }

    #[test]
    fn out_of_range_ratio_is_rejected() {
        let err = AuditConfig::from_yaml_str("classifier:\n  max_unique_ratio: 1.5\n").unwrap_err();
        assert!(matches!(
            err,
            AuditError::InvalidSetting {
                setting: "classifier.max_unique_ratio",
                ..
            }
        ));
    }
}
