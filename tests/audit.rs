mod common;

use std::collections::HashSet;

use booking_audit::{AuditConfig, CollectionAudit, Window, group_windows, read_samples};
use chrono::{Duration, SecondsFormat};
use serde_json::json;

use common::{TestWorkspace, docs, reference_now};

fn iso(hours_ago: i64) -> String {
    (reference_now() - Duration::hours(hours_ago)).to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[test]
fn audit_combines_verdicts_coverage_and_windows() {
    let sample = docs(
        (0..40)
            .map(|i| {
                json!({
                    "_id": {"$oid": format!("65a0f1c2e4b0a1b2c3d4{:04}", i)},
                    "sex": if i % 2 == 0 { "M" } else { "F" },
                    "booked_at": if i < 30 { json!(iso(i)) } else { json!("BLACK") },
                    "bonds": [{"amount": "$100"}, {"amount": 50}],
                })
            })
            .collect(),
    );
    let config = AuditConfig::default();
    let audit = CollectionAudit::new(&config);
    let index_keys = HashSet::from(["_id".to_string()]);
    let report = audit.run("galveston_events", &sample, reference_now(), &index_keys);

    assert_eq!(report.docs_seen, 40);
    assert_eq!(report.group.as_deref(), Some("galveston"));
    let categorical = report.categorical_fields().collect::<Vec<_>>();
    assert!(categorical.contains(&"sex"));
    assert!(!categorical.contains(&"_id"));
    assert!(report.verdict("_id").unwrap().indexed);

    assert_eq!(report.coverage.total, 40);
    assert_eq!(report.coverage.with_timestamp, 30);
    assert_eq!(report.coverage.with_amount, 40);
    assert_eq!(report.coverage.top_missing_hints(1), vec![("str", 10)]);

    // Hours 0..=24 land in 24h; 25..=29 in 48h.
    assert_eq!(report.windows.bucket(Window::Last24h).count, 25);
    assert_eq!(report.windows.bucket(Window::Last24h).sum, 25.0 * 150.0);
    assert_eq!(report.windows.bucket(Window::Last48h).count, 5);
    assert_eq!(report.windows.bucket(Window::Last72h).count, 0);

    let summary = report.amount_summary.as_ref().unwrap();
    assert_eq!(summary.count, 40);
    assert_eq!(summary.median, 150.0);
}

#[test]
fn unknown_sources_still_get_field_verdicts() {
    let sample = docs(vec![json!({"status": "IN"}), json!({"status": "OUT"})]);
    let config = AuditConfig::default();
    let report = CollectionAudit::new(&config).run(
        "custody_events",
        &sample,
        reference_now(),
        &HashSet::new(),
    );
    assert_eq!(report.verdicts.len(), 1);
    assert_eq!(report.coverage.with_timestamp, 0);
    assert_eq!(
        report.coverage.missing_date_hints.get("no_candidate_field"),
        Some(&2)
    );
    assert_eq!(report.windows.total_count(), 0);
    assert!(report.amount_summary.is_none());
    assert!(report.group.is_none());
}

#[test]
fn reports_roll_up_by_county() {
    let now = reference_now();
    let config = AuditConfig::default();
    let audit = CollectionAudit::new(&config);
    let bond = docs(vec![json!({"file_date": iso(1), "bond_amount": "$1,000"})]);
    let misfel = docs(vec![json!({"file_date": iso(30), "bond_amount": 500})]);
    let reports = vec![
        audit.run("harris_bond", &bond, now, &HashSet::new()),
        audit.run("harris_misfel", &misfel, now, &HashSet::new()),
    ];
    let grouped = group_windows(&reports, now);
    let harris = grouped.group("harris").unwrap();
    assert_eq!(harris.bucket(Window::Last24h).sum, 1000.0);
    assert_eq!(harris.bucket(Window::Last48h).sum, 500.0);
    assert_eq!(grouped.groups().count(), 1);
}

#[test]
fn jsonl_samples_skip_undecodable_lines() {
    let workspace = TestWorkspace::new();
    let path = workspace.write(
        "galveston_events.jsonl",
        concat!(
            "{\"booked_at\": \"2024-01-05\"}\n",
            "\n",
            "[1, 2]\n",
            "not json\n",
            "{\"total_bond\": {\"$numberInt\": \"5\"}}\n",
        ),
    );
    let sample = read_samples(&path).expect("read samples");
    assert_eq!(sample.len(), 2);
    assert!(sample[1].contains_key("total_bond"));
}

#[test]
fn report_serializes_window_table_by_label() {
    let sample = docs(vec![json!({"booking_date": iso(5), "bond": 10})]);
    let config = AuditConfig::default();
    let report = CollectionAudit::new(&config).run(
        "simple_jefferson",
        &sample,
        reference_now(),
        &HashSet::new(),
    );
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["windows"]["24h"], json!({"count": 1, "sum": 10.0}));
    assert_eq!(json["group"], "jefferson");
}

#[test]
fn field_profiles_summarize_presence_examples_and_spreads() {
    let sample = docs(
        (0..60)
            .map(|i| {
                let sex = match i % 4 {
                    0 => json!(null),
                    2 => json!("F"),
                    _ => json!("M"),
                };
                json!({
                    "sex": sex,
                    "age": 20 + i,
                    "booked_at": {"$date": iso(i)},
                    "name": format!("DOE {i}"),
                    "total_bond": "$1,000",
                })
            })
            .collect(),
    );
    let config = AuditConfig::default();
    let report = CollectionAudit::new(&config).run(
        "galveston_events",
        &sample,
        reference_now(),
        &HashSet::new(),
    );
    assert_eq!(report.fields.len(), 5);

    let sex = report.field_profile("sex").unwrap();
    assert_eq!(sex.present_pct, 75.0);
    assert_eq!(sex.examples.len(), 5);
    assert_eq!(sex.examples[0], "\"M\"");
    assert_eq!(
        sex.top_counts.as_deref(),
        Some(&[("\"M\"".to_string(), 30), ("\"F\"".to_string(), 15)][..])
    );
    assert!(sex.numeric.is_none());

    let age = report.field_profile("age").unwrap();
    assert_eq!(age.present_pct, 100.0);
    assert_eq!(age.examples, ["20", "21", "22", "23", "24"]);
    let spread = age.numeric.as_ref().unwrap();
    assert_eq!((spread.count, spread.min, spread.max), (60, 20.0, 79.0));
    assert!(age.top_counts.is_none());

    let booked = report.field_profile("booked_at").unwrap();
    let range = booked.dates.unwrap();
    assert_eq!(range.max, reference_now());
    assert_eq!(range.min, reference_now() - Duration::hours(59));

    // Sixty distinct names is too many for top counts.
    assert!(report.field_profile("name").unwrap().top_counts.is_none());
    // Hinted numeric, but only strings were seen.
    let bond = report.field_profile("total_bond").unwrap();
    assert!(bond.numeric.is_none());
    assert_eq!(bond.top_counts.as_deref().map(<[_]>::len), Some(1));

    let json = serde_json::to_value(report.field_profile("name").unwrap()).unwrap();
    assert_eq!(json["types"], json!({"str": 60}));
    assert!(json.get("top_counts").is_none());
}
