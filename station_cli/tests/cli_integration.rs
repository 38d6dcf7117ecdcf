use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// Sim config whose InfluxDB is never reachable, so values end up buffered
fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let root = dir.path().display();
    let toml = format!(
        r#"
[station]
id = "S1"
interval_s = 60

[influxdb]
# nothing listens here
url = "http://127.0.0.1:9"
token = "t"
org = "o"
bucket = "b"
timeout_ms = 500
ping_timeout_ms = 200

[paths]
image_folder = '{root}/images'
pending_folder = '{root}/pending'
archive_folder = '{root}/archive'
data_folder = '{root}/data'

[weight]
samples = 5
max_attempts = 100
"#
    );
    let path = dir.path().join("station.toml");
    fs::write(&path, toml).unwrap();
    path
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["measure"], 0, "Measurement complete.", "stdout")]
#[case(&["tare", "--samples", "5"], 0, "Tare:", "stdout")]
#[case(&["self-check"], 0, "InfluxDB: unreachable", "stdout")]
#[case(&["resync"], 1, "unreachable", "stderr")]
#[case(&["calibrate"], 2, "unrecognized subcommand", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let mut cmd = Command::cargo_bin("station").unwrap();
    cmd.arg("--config").arg(&cfg);
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

#[test]
fn measure_buffers_every_value_when_offline() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    Command::cargo_bin("station")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("measure")
        .assert()
        .success()
        .stdout(predicate::str::contains("buffered 5"));

    for category in ["Growth", "Weight", "Picture"] {
        let path = dir.path().join("pending").join(format!("{category}.csv"));
        assert!(path.exists(), "missing {}", path.display());
    }
    let weight = fs::read_to_string(dir.path().join("pending/Weight.csv")).unwrap();
    assert_eq!(weight.lines().count(), 3);
    assert!(weight.lines().all(|l| l.contains(",Weight,")));
    let history = fs::read_to_string(dir.path().join("data/measurements.csv")).unwrap();
    assert_eq!(history.lines().count(), 2);
    assert!(history.lines().nth(1).unwrap().contains(",S1,"));
}

#[test]
fn missing_config_exits_with_two() {
    let dir = tempdir().unwrap();
    Command::cargo_bin("station")
        .unwrap()
        .arg("--config")
        .arg(dir.path().join("nope.toml"))
        .arg("self-check")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid configuration"));
}

#[test]
fn invalid_config_names_the_field() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let text = fs::read_to_string(&cfg)
        .unwrap()
        .replace("interval_s = 60", "interval_s = 0");
    fs::write(&cfg, text).unwrap();

    Command::cargo_bin("station")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("measure")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("interval_s"));
}

#[test]
fn tare_leaves_the_config_untouched() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let before = fs::read_to_string(&cfg).unwrap();
    Command::cargo_bin("station")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("tare")
        .assert()
        .success();
    assert_eq!(fs::read_to_string(&cfg).unwrap(), before);
}
