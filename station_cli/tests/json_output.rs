use assert_cmd::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let root = dir.path().display();
    let toml = format!(
        r#"
[station]
id = "S1"
interval_s = 60

[influxdb]
url = "http://127.0.0.1:9"
timeout_ms = 500
ping_timeout_ms = 200

[paths]
image_folder = '{root}/images'
pending_folder = '{root}/pending'
archive_folder = '{root}/archive'
data_folder = '{root}/data'
"#
    );
    let path = dir.path().join("station.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn json_stdout(dir: &tempfile::TempDir, args: &[&str]) -> serde_json::Value {
    let cfg = write_valid_config(dir);
    let out = Command::cargo_bin("station")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("--json")
        .args(args)
        .output()
        .unwrap();
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let stdout = String::from_utf8(out.stdout).unwrap();
    let line = stdout.lines().last().unwrap_or_default();
    serde_json::from_str(line).unwrap_or_else(|e| panic!("not JSON ({e}): {line}"))
}

#[test]
fn measure_summary_schema() {
    let dir = tempdir().unwrap();
    let v = json_stdout(&dir, &["measure"]);
    assert_eq!(v["station"], "S1");
    assert_eq!(v["growth"], 128.0);
    assert!(v["weight_g"].is_f64());
    assert!(v["standard_deviation"].is_f64());
    assert_eq!(v["sent"], 0);
    assert_eq!(v["buffered"], 5);
    assert_eq!(v["connected"], false);
    assert_eq!(v["errors"].as_array().map(Vec::len), Some(0));
    assert!(v["timestamp"].as_str().unwrap().ends_with("+00:00"));
}

#[rstest]
#[case(&["tare", "--samples", "3"], "tare")]
#[case(&["self-check"], "influxdb_reachable")]
fn commands_emit_one_json_object(#[case] args: &[&str], #[case] key: &str) {
    let dir = tempdir().unwrap();
    let v = json_stdout(&dir, args);
    assert!(v.get(key).is_some(), "missing {key} in {v}");
}

#[test]
fn errors_are_json_on_stderr() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let out = Command::cargo_bin("station")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("--json")
        .arg("resync")
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8(out.stderr).unwrap();
    let line = stderr
        .lines()
        .rev()
        .find(|l| l.starts_with("{\"") && l.contains("\"reason\""))
        .unwrap();
    let v: serde_json::Value = serde_json::from_str(line).unwrap();
    assert_eq!(v["reason"], "Error");
    assert!(v["message"].as_str().unwrap().contains("unreachable"));
}
