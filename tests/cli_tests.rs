use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

fn geowatch(data_dir: &TempDir) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("geowatch");
    cmd.env_remove("GEOWATCH_CONFIG")
        .arg("--data-dir")
        .arg(data_dir.path());
    cmd
}

#[test]
fn test_cli_help() {
    let mut cmd = cargo_bin_cmd!("geowatch");
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Environmental monitoring mission orchestrator",
        ))
        .stdout(predicate::str::contains("submit"))
        .stdout(predicate::str::contains("schedule"))
        .stdout(predicate::str::contains("supervise"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("list"));
}

#[test]
fn test_cli_version() {
    let mut cmd = cargo_bin_cmd!("geowatch");
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("geowatch"));
}

#[test]
fn test_cli_submit_help() {
    let mut cmd = cargo_bin_cmd!("geowatch");
    cmd.args(["submit", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--bbox"))
        .stdout(predicate::str::contains("--daily"))
        .stdout(predicate::str::contains("--sensor"));
}

#[test]
fn test_config_init_then_validate() {
    let temp = TempDir::new().unwrap();

    geowatch(&temp)
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
    assert!(temp.path().join("config.toml").exists());

    geowatch(&temp)
        .args(["config", "validate"])
        .assert()
        .success();

    geowatch(&temp)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[supervisor]"));
}

#[test]
fn test_invalid_config_is_reported() {
    let temp = TempDir::new().unwrap();
    std::fs::write(
        temp.path().join("config.toml"),
        "[supervisor]\nmax_concurrent_missions = 0\n",
    )
    .unwrap();

    geowatch(&temp)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("max_concurrent_missions"));
}

#[test]
fn test_list_empty() {
    let temp = TempDir::new().unwrap();
    geowatch(&temp)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No jobs found."));
}

#[test]
fn test_status_unknown_job() {
    let temp = TempDir::new().unwrap();
    geowatch(&temp)
        .args(["status", "JOB-000000000000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("JOB-000000000000"));
}

#[test]
fn test_submit_and_list_json() {
    let temp = TempDir::new().unwrap();

    geowatch(&temp)
        .args(["--output", "json", "submit", "--bbox", "16.2,48.1,16.5,48.3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\":\"PENDING\""))
        .stdout(predicate::str::contains("\"id\":\"JOB-"));

    geowatch(&temp)
        .args(["--output", "json", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"recurrence\":\"NONE\""));
}

#[test]
fn test_submit_rejects_bad_bbox() {
    let temp = TempDir::new().unwrap();
    geowatch(&temp)
        .args(["submit", "--bbox", "16.5,48.1,16.2,48.3"])
        .assert()
        .failure();
    geowatch(&temp)
        .args(["submit", "--bbox", "not-a-box"])
        .assert()
        .failure();
}

#[test]
fn test_submit_rejects_out_of_range_days() {
    let temp = TempDir::new().unwrap();
    for days in ["0", "4294967295"] {
        geowatch(&temp)
            .args(["submit", "--bbox", "16.2,48.1,16.5,48.3", "--days", days])
            .assert()
            .failure()
            .stderr(predicate::str::contains("panicked").not());
    }
    geowatch(&temp)
        .args(["--output", "json", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("JOB-").not());
}

#[test]
fn test_run_without_acquirer_fails_job() {
    let temp = TempDir::new().unwrap();

    geowatch(&temp)
        .args(["submit", "--bbox", "16.2,48.1,16.5,48.3", "--run"])
        .assert()
        .failure();

    geowatch(&temp)
        .args(["list", "--status", "failed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("FAILED"));
}

#[test]
fn test_run_with_shell_collaborators() {
    let temp = TempDir::new().unwrap();
    std::fs::write(
        temp.path().join("config.toml"),
        r#"
[collaborators]
acquire = "echo raw/S2_scene.tif"
analyze = "echo processed/scene_NDVI.tif"
report = "echo reports/Evidence_Pack_$GEOWATCH_JOB_ID.pdf"
"#,
    )
    .unwrap();

    geowatch(&temp)
        .args(["submit", "--bbox", "16.2,48.1,16.5,48.3", "--run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("processed/scene_NDVI.tif"));
}

#[test]
fn test_schedule_once_with_no_definitions() {
    let temp = TempDir::new().unwrap();
    geowatch(&temp)
        .args(["schedule", "--once"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No recurring jobs due"));
}

#[test]
fn test_supervise_rejects_bad_center() {
    let temp = TempDir::new().unwrap();
    geowatch(&temp)
        .args(["supervise", "--lat", "95", "--lon", "16.37"])
        .assert()
        .failure();
}
