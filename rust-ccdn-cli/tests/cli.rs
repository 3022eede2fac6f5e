use assert_cmd::Command;
use predicates::prelude::*;

fn ccdn() -> Command {
    Command::cargo_bin("ccdn").unwrap()
}

#[test]
fn test_topology_counts() {
    ccdn()
        .args(["topology", "--port", "4", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"hosts\": 16"))
        .stdout(predicate::str::contains("\"core\": 4"));
}

#[test]
fn test_topology_host_address() {
    ccdn()
        .args(["topology", "--host", "7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("10.2.4.1"));
}

#[test]
fn test_topology_rejects_odd_port() {
    ccdn().args(["topology", "--port", "3"]).assert().failure();
}

#[test]
fn test_run_writes_task_log() {
    let dir = tempfile::tempdir().unwrap();
    let scenario = dir.path().join("scenario.txt");
    let output = dir.path().join("tasks.log");
    std::fs::write(
        &scenario,
        "c 0 0000000000000001 1 3\na 1 0000000000000001 7\n",
    )
    .unwrap();

    ccdn()
        .arg("run")
        .arg(&scenario)
        .arg("--output")
        .arg(&output)
        .arg("--json")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"finished_tasks\": 1"))
        .stdout(predicate::str::contains("\"outstanding_tasks\": 0"));

    let log = std::fs::read_to_string(&output).unwrap();
    assert!(log.starts_with("1 from 3 to 7 start 1 end "), "{}", log);
}

#[test]
fn test_run_reports_bad_scenario_line() {
    let dir = tempfile::tempdir().unwrap();
    let scenario = dir.path().join("scenario.txt");
    std::fs::write(&scenario, "a 1 0000000000000001 7\nz 2\n").unwrap();

    ccdn()
        .arg("run")
        .arg(&scenario)
        .arg("--output")
        .arg(dir.path().join("tasks.log"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("line 2"));
}

#[test]
fn test_run_missing_scenario_fails() {
    let dir = tempfile::tempdir().unwrap();
    ccdn()
        .arg("run")
        .arg(dir.path().join("missing.txt"))
        .assert()
        .failure();
}
