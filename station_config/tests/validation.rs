use rstest::rstest;
use station_config::{Strategy, load_toml};

const MINIMAL: &str = r#"
[station]
id = "S1"
interval_s = 3600
"#;

#[test]
fn minimal_config_fills_defaults() {
    let cfg = load_toml(MINIMAL).expect("parse TOML");
    cfg.validate().expect("minimal config should pass");
    assert!(!cfg.station.running);
    assert_eq!(cfg.weight.strategy, Strategy::Median);
    assert_eq!(cfg.weight.max_attempts, 1000);
    assert_eq!(cfg.controller.error_threshold, 10);
    assert_eq!(cfg.calibration.scale, 1.0);
    assert_eq!(cfg.image.channel, "k");
}

#[test]
fn parses_iqr_strategy() {
    let toml = format!("{MINIMAL}\n[weight]\nstrategy = \"iqr\"\nsamples = 30\n");
    let cfg = load_toml(&toml).expect("parse TOML");
    assert_eq!(cfg.weight.strategy, Strategy::Iqr);
    assert_eq!(cfg.weight.samples, 30);
}

#[test]
fn missing_station_section_is_a_parse_error() {
    assert!(load_toml("[weight]\nsamples = 3\n").is_err());
}

#[rstest]
#[case("[station]\nid = \"\"\ninterval_s = 60\n", "station.id must not be empty")]
#[case("[station]\nid = \"a,b\"\ninterval_s = 60\n", "commas or whitespace")]
#[case("[station]\nid = \"S1\"\ninterval_s = 0\n", "interval_s must be >= 1")]
#[case(
    "[station]\nid = \"S1\"\ninterval_s = 60\n[influxdb]\nurl = \"localhost:8086\"\n",
    "influxdb.url must start with"
)]
#[case(
    "[station]\nid = \"S1\"\ninterval_s = 60\n[image]\nchannel = \"x\"\n",
    "image.channel must be one of"
)]
#[case(
    "[station]\nid = \"S1\"\ninterval_s = 60\n[weight]\nsamples = 0\n",
    "weight.samples must be >= 1"
)]
#[case(
    "[station]\nid = \"S1\"\ninterval_s = 60\n[weight]\nsamples = 20\nmax_attempts = 10\n",
    "max_attempts must be >= weight.samples"
)]
#[case(
    "[station]\nid = \"S1\"\ninterval_s = 60\n[calibration]\nscale = 0.0\n",
    "calibration.scale must be finite and non-zero"
)]
#[case(
    "[station]\nid = \"S1\"\ninterval_s = 60\n[calibration]\nreference_weight_g = -5.0\n",
    "reference_weight_g must be > 0"
)]
#[case(
    "[station]\nid = \"S1\"\ninterval_s = 60\n[controller]\ntick_ms = 5000\n",
    "tick_ms must be in [1, 1000]"
)]
#[case(
    "[station]\nid = \"S1\"\ninterval_s = 60\n[controller]\nerror_threshold = 0\n",
    "error_threshold must be >= 1"
)]
#[case(
    "[station]\nid = \"S1\"\ninterval_s = 60\n[publisher]\nreplay_chunk = 0\n",
    "replay_chunk must be >= 1"
)]
fn rejects_invalid_values(#[case] toml: &str, #[case] expected: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should be rejected");
    assert!(
        format!("{err}").contains(expected),
        "expected '{expected}' in '{err}'"
    );
}
