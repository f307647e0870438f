mod common;

use booking_audit::{AuditConfig, AuditError};

use common::TestWorkspace;

#[test]
fn yaml_overrides_merge_with_defaults() {
    let workspace = TestWorkspace::new();
    let path = workspace.write(
        "audit.yml",
        r#"
top_values: 3
classifier:
  max_unique: 40
  small_int_as_categorical: true
flatten:
  max_depth: 8
profiles:
  custody_events:
    timestamp_fields: [booked_at]
    money_fields: [charges.bond]
    group: galveston
"#,
    );
    let config = AuditConfig::load(&path).expect("load config");
    assert_eq!(config.top_values, 3);
    assert_eq!(config.classifier.max_unique, 40);
    assert!(config.classifier.small_int_as_categorical);
    assert_eq!(config.classifier.min_count, 25);
    assert_eq!(config.flatten.max_depth, 8);
    assert_eq!(config.flatten.separator, ".");
    assert_eq!(config.profiles.len(), 1);
    assert_eq!(config.profiles.group_of("custody_events"), Some("galveston"));
    assert_eq!(config.field_map.pairs.len(), 7);
}

#[test]
fn config_round_trips_through_yaml() {
    let config = AuditConfig::default();
    let yaml = config.to_yaml_string().expect("serialize");
    let parsed = AuditConfig::from_yaml_str(&yaml).expect("parse");
    assert_eq!(parsed, config);
}

#[test]
fn load_reports_the_offending_path() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("bad.yml", "flatten:\n  separator: \"\"\n");
    let err = AuditConfig::load(&path).expect_err("empty separator should fail");
    assert!(err.to_string().contains("bad.yml"));
    assert!(err.chain().any(|source| {
        matches!(
            source.downcast_ref::<AuditError>(),
            Some(AuditError::InvalidSetting {
                setting: "flatten.separator",
                ..
            })
        )
    }));
}

#[test]
fn missing_file_is_an_error_with_context() {
    let workspace = TestWorkspace::new();
    let err = AuditConfig::load(&workspace.path().join("absent.yml")).expect_err("missing file");
    assert!(err.to_string().contains("Opening audit config"));
}

#[test]
fn malformed_yaml_is_rejected() {
    let err = AuditConfig::from_yaml_str("top_values: [1, 2").unwrap_err();
    assert!(matches!(err, AuditError::InvalidConfig(_)));
}
