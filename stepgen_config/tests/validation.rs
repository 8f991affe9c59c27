use std::io::Write;

use rstest::rstest;
use stepgen_config::{RunMode, load_file, load_toml};

const BASE: &str = r#"
[timing]
tick_hz = 2000

[[axis]]
name = "x"
port_bit = 0
[axis.pins]
step = 13
direction = 19
enable = 26
feedback = 21
[axis.motion]
max_velocity = 20000
max_acceleration = 200000
[axis.limits]
min_position = 0
max_position = 54400
"#;

#[test]
fn minimal_config_uses_defaults() {
    let cfg = load_toml(BASE).expect("parse TOML");
    cfg.validate().expect("valid");
    let x = cfg.axis_by_name("x").expect("axis x");
    assert_eq!(x.motion.fractional_bits, 10);
    assert_eq!(x.motion.direction_settle_us, 1_000);
    assert!(x.pins.feedback_active_low);
    assert_eq!(cfg.runner.mode, RunMode::Paced);
    assert_eq!(cfg.runner.move_timeout_ms, 30_000);
}

#[test]
fn missing_axes_are_rejected() {
    let cfg = load_toml("[timing]\ntick_hz = 2000\n").expect("parse TOML");
    let err = cfg.validate().expect_err("no axes");
    assert!(format!("{err}").contains("at least one [[axis]]"));
}

#[rstest]
#[case("tick_hz = 2000", "tick_hz = 0", "timing.tick_hz must be > 0")]
#[case("port_bit = 0", "port_bit = 8", "port_bit must be in 0..8")]
#[case(
    "max_acceleration = 200000",
    "max_acceleration = 3000",
    "max_acceleration is below one scaled unit"
)]
#[case("max_velocity = 20000", "max_velocity = 1", "max_velocity is below one scaled unit")]
#[case(
    "max_position = 54400",
    "max_position = -1",
    "min_position must be <= limits.max_position"
)]
fn invalid_values_are_named(#[case] from: &str, #[case] to: &str, #[case] msg: &str) {
    let cfg = load_toml(&BASE.replace(from, to)).expect("parse TOML");
    let err = cfg.validate().expect_err("should be rejected");
    assert!(format!("{err}").contains(msg), "got: {err}");
}

#[test]
fn duplicate_port_bits_are_rejected() {
    let two = format!("{BASE}{}", BASE.replace("[timing]\ntick_hz = 2000\n", "").replace("\"x\"", "\"y\""));
    let cfg = load_toml(&two).expect("parse TOML");
    let err = cfg.validate().expect_err("shared bit");
    assert!(format!("{err}").contains("port_bit 0 is used by more than one axis"));
}

#[test]
fn unknown_runner_mode_fails_to_parse() {
    let toml = format!("{BASE}\n[runner]\nmode = \"turbo\"\n");
    assert!(load_toml(&toml).is_err());
}

#[test]
fn load_file_parses_and_validates() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stepgen.toml");
    let mut f = std::fs::File::create(&path).unwrap();
    writeln!(f, "{BASE}\n[runner]\nmode = \"direct\"\n").unwrap();
    let cfg = load_file(&path).unwrap();
    assert_eq!(cfg.runner.mode, RunMode::Direct);

    let err = load_file(&dir.path().join("missing.toml")).unwrap_err();
    assert!(format!("{err}").contains("reading config"));
}
