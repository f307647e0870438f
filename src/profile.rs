//! Static per-source candidate field lists for the derived booking facts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Ordered candidate fields for one source collection. Paths are dotted and
/// fan out through arrays when resolved.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSchemaProfile {
    pub timestamp_fields: Vec<String>,
    pub money_fields: Vec<String>,
    pub group: Option<String>,
}

impl SourceSchemaProfile {
    pub fn new(timestamp_fields: &[&str], money_fields: &[&str], group: &str) -> Self {
        SourceSchemaProfile {
            timestamp_fields: timestamp_fields.iter().map(|f| f.to_string()).collect(),
            money_fields: money_fields.iter().map(|f| f.to_string()).collect(),
            group: Some(group.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileTable {
    profiles: BTreeMap<String, SourceSchemaProfile>,
}

impl ProfileTable {
    pub fn empty() -> Self {
        ProfileTable {
            profiles: BTreeMap::new(),
        }
    }

    pub fn get(&self, source: &str) -> Option<&SourceSchemaProfile> {
        self.profiles.get(source)
    }

    pub fn insert(&mut self, source: impl Into<String>, profile: SourceSchemaProfile) {
        self.profiles.insert(source.into(), profile);
    }

    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    pub fn group_of(&self, source: &str) -> Option<&str> {
        self.get(source)?.group.as_deref()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl Default for ProfileTable {
    fn default() -> Self {
        let events = |group| {
            SourceSchemaProfile::new(
                &["booked_at", "arrest_date", "booking_date"],
                &["total_bond", "bonds.amount"],
                group,
            )
        };
        let harris = || SourceSchemaProfile::new(&["file_date"], &["bond_amount"], "harris");
        let persons =
            || SourceSchemaProfile::new(&["booked_at", "booking_date"], &[], "galveston");
        let simple =
            |group| SourceSchemaProfile::new(&["booking_date"], &["bond_amount", "bond"], group);

        let mut table = ProfileTable::empty();
        table.insert("galveston_events", events("galveston"));
        table.insert("jefferson_events", events("jefferson"));
        table.insert(
            "brazoria_inmates",
            SourceSchemaProfile::new(
                &["booking_date_iso", "booking_date", "first_seen_at", "detail_fetched_at"],
                &["bond_total", "charges.bond/type"],
                "brazoria",
            ),
        );
        table.insert(
            "fortbend_inmates",
            SourceSchemaProfile::new(
                &["booking_date_iso", "booking_date", "detail_fetched_at", "first_seen_at"],
                &["charges.bail_amount_int", "charges.bail_amount"],
                "fortbend",
            ),
        );
        table.insert("harris_bond", harris());
        table.insert("harris_nafiling", harris());
        table.insert("harris_misfel", harris());
        table.insert("galveston_persons", persons());
        table.insert("persons", persons());
        for county in ["brazoria", "fortbend", "galveston", "harris", "jefferson"] {
            table.insert(format!("simple_{county}"), simple(county));
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_orders_candidates_by_priority() {
        let table = ProfileTable::default();
        let fortbend = table.get("fortbend_inmates").unwrap();
        assert_eq!(fortbend.timestamp_fields[0], "booking_date_iso");
        assert_eq!(fortbend.money_fields, vec!["charges.bail_amount_int", "charges.bail_amount"]);
        assert_eq!(table.group_of("harris_misfel"), Some("harris"));
        assert!(table.get("persons").unwrap().money_fields.is_empty());
        assert!(table.get("custody_events").is_none());
    }
}
