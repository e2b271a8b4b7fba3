//! CLI smoke tests for the ruledrift binary

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

fn write_rule(root: &Path, org: &str, env: &str, name: &str) {
    let env_dir = root.join(org).join(env);
    fs::create_dir_all(env_dir.join("queries")).unwrap();
    fs::write(
        env_dir.join("queries").join(format!("{name}.kql")),
        "Heartbeat | take 1",
    )
    .unwrap();

    let record = format!(
        r#"  - name: {name}
    display_name: {name}
    query_file: queries/{name}.kql
    severity: Low
    enabled: true
    frequency: PT1H
    period: PT1H
"#
    );

    let rules_file = env_dir.join("rules.yaml");
    let mut content = if rules_file.exists() {
        fs::read_to_string(&rules_file).unwrap()
    } else {
        "version: \"1.0\"\nrules:\n".to_string()
    };
    content.push_str(&record);
    fs::write(rules_file, content).unwrap();
}

fn ruledrift() -> Command {
    Command::cargo_bin("ruledrift").unwrap()
}

#[test]
fn help_lists_commands() {
    ruledrift()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("reconcile"))
        .stdout(predicate::str::contains("environments"));
}

#[test]
fn promotion_check_requires_target_env() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("contoso/dev")).unwrap();

    ruledrift()
        .args([
            "reconcile",
            "--org",
            "contoso",
            "--env",
            "dev",
            "--mode",
            "promotion-check",
            "--store",
        ])
        .arg(dir.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--target-env"));
}

#[test]
fn promotion_check_reports_gap_with_exit_one() {
    let dir = tempfile::tempdir().unwrap();
    write_rule(dir.path(), "contoso", "dev", "rule-one");
    write_rule(dir.path(), "contoso", "dev", "rule-two");
    write_rule(dir.path(), "contoso", "prod", "rule-one");

    ruledrift()
        .args([
            "reconcile",
            "--org",
            "contoso",
            "--env",
            "dev",
            "--mode",
            "promotion-check",
            "--target-env",
            "prod",
            "--store",
        ])
        .arg(dir.path())
        .assert()
        .code(1)
        .stdout(predicate::str::contains("'rule-two': missing in target"))
        .stdout(predicate::str::contains("1 promotion gaps"));
}

#[test]
fn promotion_check_clean_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    write_rule(dir.path(), "contoso", "dev", "rule-one");
    write_rule(dir.path(), "contoso", "prod", "rule-one");
    write_rule(dir.path(), "contoso", "prod", "prod-only");

    ruledrift()
        .args([
            "reconcile",
            "--org",
            "contoso",
            "--env",
            "dev",
            "--mode",
            "promotion-check",
            "--target-env",
            "prod",
            "--store",
        ])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No drift detected"));
}

#[test]
fn promotion_check_json_emits_record_lines() {
    let dir = tempfile::tempdir().unwrap();
    write_rule(dir.path(), "contoso", "dev", "rule-one");
    fs::create_dir_all(dir.path().join("contoso/prod")).unwrap();

    let output = ruledrift()
        .args([
            "reconcile",
            "--org",
            "contoso",
            "--env",
            "dev",
            "--mode",
            "promotion-check",
            "--target-env",
            "prod",
            "--json",
            "--store",
        ])
        .arg(dir.path())
        .assert()
        .code(1)
        .get_output()
        .stdout
        .clone();

    let stdout = String::from_utf8(output).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);

    let summary: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(summary["record"], "summary");
    assert_eq!(summary["mode"], "promotion-check");
    assert_eq!(summary["counts"]["promotion_gaps"], 1);

    let gap: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
    assert_eq!(gap["rule_id"], "rule-one");
    assert_eq!(gap["kind"], "MissingInTarget");
}

#[test]
fn missing_environment_fails_with_error() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("contoso/dev")).unwrap();

    ruledrift()
        .args([
            "reconcile",
            "--org",
            "contoso",
            "--env",
            "dev",
            "--mode",
            "promotion-check",
            "--target-env",
            "staging",
            "--store",
        ])
        .arg(dir.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("staging"));
}

#[test]
fn import_without_settings_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("contoso/dev")).unwrap();

    ruledrift()
        .args([
            "reconcile",
            "--org",
            "contoso",
            "--env",
            "dev",
            "--mode",
            "import",
            "--store",
        ])
        .arg(dir.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("ruledrift.toml"));
}

#[test]
fn environments_lists_store_contents() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("contoso/dev")).unwrap();
    fs::create_dir_all(dir.path().join("contoso/prod")).unwrap();

    ruledrift()
        .args(["environments", "--org", "contoso", "--store"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("dev"))
        .stdout(predicate::str::contains("prod"));
}
