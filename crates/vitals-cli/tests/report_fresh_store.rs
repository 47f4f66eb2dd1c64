use assert_cmd::Command;
use predicates::str::contains;
use std::fs;
use tempfile::TempDir;

#[test]
fn report_on_a_fresh_store_shows_every_metric_as_unknown() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("vitals.yaml");
    let db_path = dir.path().join("vitals.db");

    fs::write(
        &config_path,
        format!(
            "github:\n  repo: acme/widgets\ndatabase: {}\n",
            db_path.display()
        ),
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("vitals").unwrap();
    cmd.arg("--config")
        .arg(&config_path)
        .arg("report")
        .assert()
        .success()
        .stdout(contains("BuildGreennessMetric"))
        .stdout(contains("AbsoluteCoverageMetric"))
        .stdout(contains("\"score\": \"UNKNOWN\""))
        .stdout(contains("\"formatted_result\": \"?\""));
}

#[test]
fn recompute_of_an_unknown_metric_fails_cleanly() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("vitals.yaml");
    fs::write(
        &config_path,
        format!(
            "github:\n  repo: acme/widgets\ndatabase: {}\n",
            dir.path().join("vitals.db").display()
        ),
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("vitals").unwrap();
    cmd.arg("--config")
        .arg(&config_path)
        .arg("recompute")
        .arg("NoSuchMetric")
        .assert()
        .code(1)
        .stderr(contains("no active metric named NoSuchMetric"));
}
