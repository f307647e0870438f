mod common;

use std::collections::BTreeMap;

use booking_audit::{FlattenConfig, Value, data::document_from_json, flatten};
use proptest::prelude::*;
use serde_json::{Value as JsonValue, json};

use common::doc;

fn lookup<'a>(root: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    let mut node = root;
    for part in path.split('.') {
        let (key, indices) = match part.find('[') {
            Some(idx) => (&part[..idx], &part[idx..]),
            None => (part, ""),
        };
        node = node.get(key)?;
        for idx in indices.split(['[', ']']).filter(|s| !s.is_empty()) {
            node = node.get(idx.parse::<usize>().ok()?)?;
        }
    }
    Some(node)
}

fn count_leaves(value: &JsonValue) -> (usize, usize) {
    match value {
        JsonValue::Object(map) => map.values().map(count_leaves).fold((0, 0), |a, b| {
            (a.0 + b.0, a.1 + b.1)
        }),
        JsonValue::Array(items) => items.iter().map(count_leaves).fold((0, 1), |a, b| {
            (a.0 + b.0, a.1 + b.1)
        }),
        _ => (1, 0),
    }
}

fn json_tree() -> impl Strategy<Value = JsonValue> {
    let leaf = prop_oneof![
        Just(JsonValue::Null),
        any::<bool>().prop_map(JsonValue::from),
        any::<i64>().prop_map(JsonValue::from),
        "[a-zA-Z0-9 ]{0,6}".prop_map(JsonValue::from),
    ];
    leaf.prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..4).prop_map(JsonValue::Array),
            proptest::collection::btree_map("[a-z]{1,4}", inner, 0..4)
                .prop_map(|map| JsonValue::Object(map.into_iter().collect())),
        ]
    })
}

fn json_document() -> impl Strategy<Value = JsonValue> {
    proptest::collection::btree_map("[a-z]{1,4}", json_tree(), 0..5)
        .prop_map(|map: BTreeMap<String, JsonValue>| JsonValue::Object(map.into_iter().collect()))
}

proptest! {
    #[test]
    fn flatten_is_lossless_for_scalar_leaves(raw in json_document()) {
        let document = document_from_json(raw.clone()).expect("generated object");
        let flat = flatten(&document, &FlattenConfig::default());
        let (leaves, arrays) = count_leaves(&raw);

        let (markers, values): (Vec<_>, Vec<_>) =
            flat.iter().partition(|(path, _)| path.ends_with("[]"));
        prop_assert_eq!(markers.len(), arrays);
        prop_assert_eq!(values.len(), leaves);
        for (path, value) in values {
            let original = lookup(&raw, path).expect("flattened path resolves");
            prop_assert_eq!(&Value::from(original.clone()), value);
        }
    }
}

#[test]
fn booking_document_flattens_to_indexed_paths() {
    let flat = flatten(
        &doc(json!({
            "inmate": {"name": "DOE, JOHN", "race": "W"},
            "charges": [
                {"offense": "THEFT", "bail_amount": "$500"},
                {"offense": "DWI", "bail_amount": null}
            ],
            "booked_at": {"$date": "2024-01-05T10:00:00Z"}
        })),
        &FlattenConfig::default(),
    );
    let paths = flat.keys().map(String::as_str).collect::<Vec<_>>();
    assert_eq!(
        paths,
        vec![
            "booked_at",
            "charges[0].bail_amount",
            "charges[0].offense",
            "charges[1].bail_amount",
            "charges[1].offense",
            "charges[]",
            "inmate.name",
            "inmate.race",
        ]
    );
    assert!(matches!(flat["booked_at"], Value::DateTime(_)));
    assert_eq!(flat["charges[1].bail_amount"], Value::Null);
}

#[test]
fn custom_separator_applies_to_object_keys_only() {
    let config = FlattenConfig {
        separator: "/".to_string(),
        ..FlattenConfig::default()
    };
    let flat = flatten(&doc(json!({"a": {"b": [{"c": 1}]}})), &config);
    assert_eq!(flat.get("a/b[0]/c"), Some(&Value::Integer(1)));
    assert_eq!(flat.get("a/b[]"), Some(&Value::Boolean(true)));
}

#[test]
fn numeric_wrappers_flatten_as_nested_keys() {
    let flat = flatten(
        &doc(json!({"total_bond": {"$numberDouble": "2500.0"}})),
        &FlattenConfig::default(),
    );
    assert_eq!(
        flat.get("total_bond.$numberDouble"),
        Some(&Value::String("2500.0".into()))
    );
}
