use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// Minimal valid config for the simulated backend. 100 000 counts/s and
// 20 000 000 counts/s^2 at 2 kHz give 50 counts/tick and 5 counts/tick^2.
fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[timing]
tick_hz = 2000

[[axis]]
name = "x"
port_bit = 0
[axis.pins]
# pins are unused by the simulated backend but must be present
step = 13
direction = 19
enable = 26
feedback = 21
[axis.motion]
max_velocity = 100000
max_acceleration = 20000000
direction_settle_us = 0

[runner]
mode = "direct"
move_timeout_ms = 5000
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn stepgen(cfg: &PathBuf) -> Command {
    let mut cmd = Command::cargo_bin("stepgen").unwrap();
    cmd.arg("--config").arg(cfg);
    cmd
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["move", "--distance", "2000"], 0, "position=2000", "stdout")]
#[case(&["move", "--distance", "-300", "--fast"], 0, "position=-300", "stdout")]
#[case(&["move"], 2, "required", "stderr")]
#[case(&["move", "--distance", "2000", "--timeout-ms", "1"], 3, "timed out", "stderr")]
#[case(&["move", "--distance", "3000000"], 4, "longer than the engine accepts", "stderr")]
#[case(&["move", "--distance", "10", "--axis", "3"], 1, "out of range", "stderr")]
#[case(&["self-check"], 0, "self-check ok: x", "stdout")]
#[case(&["health"], 0, "healthy", "stdout")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let mut cmd = stepgen(&cfg);
    for a in args {
        cmd.arg(a);
    }

    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[rstest]
fn json_move_reports_outcome() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let out = stepgen(&cfg)
        .args(["--json", "--log-level", "warn", "move", "--distance", "2000"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let line = String::from_utf8(out.stdout).unwrap();
    let v: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
    assert_eq!(v["status"], "complete");
    assert_eq!(v["final_position"], 2000);
    assert_eq!(v["ticks"], 46);
    assert_eq!(v["peak_burst"], 50);
}

#[rstest]
fn move_runs_on_the_configured_port_bit() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let text = fs::read_to_string(&cfg).unwrap().replace("port_bit = 0", "port_bit = 3");
    fs::write(&cfg, text).unwrap();

    let out = stepgen(&cfg)
        .args(["--json", "move", "--distance", "2000"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let v: serde_json::Value =
        serde_json::from_str(String::from_utf8(out.stdout).unwrap().trim()).unwrap();
    assert_eq!(v["port_bit"], 3);
    assert_eq!(v["final_position"], 2000);
    // the peak burst is read back from bit 3 of the tick report
    assert_eq!(v["peak_burst"], 50);
}

#[rstest]
fn bounded_stop_ends_short_of_target() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let out = stepgen(&cfg)
        .args([
            "--json",
            "move",
            "--distance",
            "20000",
            "--stop-after-ticks",
            "30",
            "--stop-distance",
            "300",
        ])
        .output()
        .unwrap();
    assert!(out.status.success());
    let v: serde_json::Value =
        serde_json::from_str(String::from_utf8(out.stdout).unwrap().trim()).unwrap();
    let pos = v["final_position"].as_i64().unwrap();
    assert!(pos > 0 && pos < 20_000, "stopped at {pos}");
}

#[rstest]
fn json_errors_are_structured() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let out = stepgen(&cfg)
        .args(["--json", "move", "--distance", "2000", "--timeout-ms", "1"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(3));
    let v: serde_json::Value =
        serde_json::from_str(String::from_utf8(out.stdout).unwrap().trim()).unwrap();
    assert_eq!(v["reason"], "Timeout");
    assert_eq!(v["details"]["move_timeout_ms"], 1);
}

#[rstest]
fn feedback_fault_fails_self_check() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    stepgen(&cfg)
        .env("STEPGEN_TEST_SIM_FAULT", "1")
        .arg("self-check")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("feedback did not assert in time"));
}

#[rstest]
fn invalid_config_is_explained() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[timing]\ntick_hz = 2000\n").unwrap();

    Command::cargo_bin("stepgen")
        .unwrap()
        .arg("--config")
        .arg(&path)
        .arg("health")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration is invalid"));
}

#[rstest]
fn missing_config_is_explained() {
    let dir = tempdir().unwrap();
    Command::cargo_bin("stepgen")
        .unwrap()
        .arg("--config")
        .arg(dir.path().join("nope.toml"))
        .arg("health")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Could not read the config file"));
}
