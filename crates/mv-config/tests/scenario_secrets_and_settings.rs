//! Scenario: typed settings and guards on top of the merged config.
//!
//! GREEN when:
//! - literal secrets abort the load and the message never carries the value;
//! - unknown comparison or missing-metric names are rejected with the key named;
//! - unknown keys are reported (warn) or rejected (fail);
//! - an all-default config yields the documented defaults.

use std::path::PathBuf;

use mv_config::{
    load_layered_yaml_from_strings, report_unused_keys, UnusedKeyPolicy, VersionerConfig,
};
use mv_promotion::{ComparisonMode, MissingMetricPolicy};

#[test]
fn secret_literal_is_rejected_and_redacted() {
    let yaml = r#"
store:
  project: "vision"
  api_key: "sk-0123456789abcdef"
"#;
    let err = load_layered_yaml_from_strings(&[yaml]).unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("CONFIG_SECRET_DETECTED"), "{msg}");
    assert!(msg.contains("/store/api_key"), "{msg}");
    assert!(!msg.contains("0123456789abcdef"), "{msg}");
}

#[test]
fn env_var_names_are_not_secrets() {
    let yaml = "store:\n  root_env: \"MV_STORE_ROOT_CI\"\n";
    assert!(load_layered_yaml_from_strings(&[yaml]).is_ok());
}

#[test]
fn defaults_when_empty() {
    let loaded = load_layered_yaml_from_strings(&["{}"]).unwrap();
    let cfg = VersionerConfig::from_loaded(&loaded).unwrap();
    assert_eq!(cfg.store.root, PathBuf::from("./mv-store"));
    assert_eq!(cfg.store.project, "default");
    assert_eq!(cfg.store.root_env, "MV_STORE_ROOT");
    assert_eq!(cfg.promotion.artifact_type, "model");
    assert_eq!(cfg.promotion.comparison_metric, "val_metric");
    assert_eq!(cfg.promotion.promotion_alias, "production");
    assert_eq!(cfg.promotion.comparison_mode().unwrap(), ComparisonMode::Smaller);
    assert_eq!(
        cfg.promotion.missing_metric_policy().unwrap(),
        MissingMetricPolicy::Abort
    );
}

#[test]
fn unknown_comparison_is_rejected() {
    let loaded =
        load_layered_yaml_from_strings(&["promotion:\n  comparison: bigger\n"]).unwrap();
    let err = VersionerConfig::from_loaded(&loaded).unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("promotion.comparison"), "{msg}");
    assert!(msg.contains("invalid argument"), "{msg}");
}

#[test]
fn unknown_missing_metric_policy_is_rejected() {
    let loaded =
        load_layered_yaml_from_strings(&["promotion:\n  on_missing_metric: skip\n"]).unwrap();
    assert!(VersionerConfig::from_loaded(&loaded).is_err());
}

#[test]
fn unused_keys_warn_or_fail() {
    let yaml = r#"
promotion:
  comparision: "greater"
  comparison_metric: "acc"
report:
  out_dir: "./reports"
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();

    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn).unwrap();
    assert_eq!(report.unused_leaf_pointers, ["/promotion/comparision"]);

    let err = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail).unwrap_err();
    assert!(err.to_string().contains("CONFIG_UNUSED_KEYS"));

    let clean = load_layered_yaml_from_strings(&["store:\n  project: p\n"]).unwrap();
    assert!(report_unused_keys(&clean.config_json, UnusedKeyPolicy::Fail)
        .unwrap()
        .is_clean());
}
