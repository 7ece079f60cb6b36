//! Scenario: `mv` end to end against a temp store.
//!
//! GREEN when:
//! - `create --publish` stores v0 and `latest-version` reports it;
//! - successive `promote` runs print the expected decisions;
//! - `--deployed-version` promotes without submitting;
//! - a promotion report lands in `--report-dir`;
//! - bad comparison names and missing candidates fail with a clear message.

use predicates::prelude::*;
use std::path::Path;

fn mv(root: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::cargo_bin("mv").unwrap();
    cmd.current_dir(root)
        .env("MV_STORE_ROOT", root.join("store"))
        .env("RUST_LOG", "warn");
    cmd
}

fn checkpoint(root: &Path, name: &str) -> String {
    let p = root.join(name);
    std::fs::write(&p, b"weights").unwrap();
    p.display().to_string()
}

#[test]
fn create_then_promote_rounds() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    mv(root)
        .args(["create", "--name", "resnet", "--publish", "--alias", "baseline"])
        .args(["--checkpoint", &checkpoint(root, "base.ckpt")])
        .args(["--metadata", r#"{"val_metric": 0.9}"#])
        .assert()
        .success()
        .stdout(predicate::str::contains("published=true"))
        .stdout(predicate::str::contains("version=v0"))
        .stdout(predicate::str::contains("aliases=baseline,latest"));

    mv(root)
        .args(["latest-version", "--name", "resnet"])
        .assert()
        .success()
        .stdout(predicate::str::contains("latest_version=0"))
        .stdout(predicate::str::contains("next_version=1"));

    let rounds = [
        ("0.5", "decision=promoted_new_no_prior", "candidate_version=v1"),
        ("0.3", "decision=promoted_new\n", "candidate_version=v2"),
        ("0.4", "decision=kept_existing", "candidate_version=v3"),
    ];
    for (i, (metric, decision, version)) in rounds.into_iter().enumerate() {
        mv(root)
            .args(["promote", "--name", "resnet"])
            .args(["--checkpoint", &checkpoint(root, &format!("epoch{i}.ckpt"))])
            .args(["--metadata", &format!(r#"{{"val_metric": {metric}}}"#)])
            .assert()
            .success()
            .stdout(predicate::str::contains(decision))
            .stdout(predicate::str::contains(version))
            .stdout(predicate::str::contains("submitted=true"));
    }

    mv(root)
        .args(["latest-version", "--name", "resnet"])
        .assert()
        .success()
        .stdout(predicate::str::contains("latest_version=3"));
}

#[test]
fn deployed_version_is_not_resubmitted() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    mv(root)
        .args(["create", "--name", "clf", "--publish"])
        .args(["--checkpoint", &checkpoint(root, "clf.ckpt")])
        .args(["--metadata", r#"{"accuracy": 0.91}"#])
        .assert()
        .success();

    let reports = root.join("reports");
    mv(root)
        .args(["promote", "--name", "clf", "--deployed-version", "v0"])
        .args(["--metric", "accuracy", "--comparison", "greater", "--alias", "staging"])
        .arg("--report-dir")
        .arg(&reports)
        .assert()
        .success()
        .stdout(predicate::str::contains("decision=promoted_new_no_prior"))
        .stdout(predicate::str::contains("submitted=false"))
        .stdout(predicate::str::contains("aliases=latest,staging"));

    let raw = std::fs::read_to_string(reports.join("promotion_report.json")).unwrap();
    let report: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(report["decision"], "promoted_new_no_prior");
    assert_eq!(report["promotion_alias"], "staging");
    assert_eq!(report["candidate_version"], "v0");

    mv(root)
        .args(["latest-version", "--name", "clf"])
        .assert()
        .success()
        .stdout(predicate::str::contains("latest_version=0"));
}

#[test]
fn unknown_name_reports_sentinel() {
    let dir = tempfile::tempdir().unwrap();
    mv(dir.path())
        .args(["latest-version", "--name", "never-logged"])
        .assert()
        .success()
        .stdout(predicate::str::contains("latest_version=-1"))
        .stdout(predicate::str::contains("next_version=0"));
}

#[test]
fn unknown_comparison_fails() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    mv(root)
        .args(["promote", "--name", "resnet", "--comparison", "bigger"])
        .args(["--checkpoint", &checkpoint(root, "m.ckpt")])
        .assert()
        .failure()
        .stderr(predicate::str::contains("there is no comparison named 'bigger'"));
}

#[test]
fn promote_requires_a_candidate() {
    let dir = tempfile::tempdir().unwrap();
    mv(dir.path())
        .args(["promote", "--name", "resnet"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--checkpoint"));
}

#[test]
fn missing_metric_aborts_promotion() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    mv(root)
        .args(["promote", "--name", "resnet"])
        .args(["--checkpoint", &checkpoint(root, "a.ckpt")])
        .args(["--metadata", r#"{"val_metric": 0.5}"#])
        .assert()
        .success();

    mv(root)
        .args(["promote", "--name", "resnet"])
        .args(["--checkpoint", &checkpoint(root, "b.ckpt")])
        .args(["--metadata", r#"{"val_loss": 0.1}"#])
        .assert()
        .failure()
        .stderr(predicate::str::contains("has no metric 'val_metric'"));

    mv(root)
        .args(["latest-version", "--name", "resnet"])
        .assert()
        .success()
        .stdout(predicate::str::contains("latest_version=0"));
}
