use rstest::rstest;
use shade_config::{load_file, load_toml};
use std::fs;
use tempfile::tempdir;

#[test]
fn empty_document_uses_defaults() {
    let cfg = load_toml("").expect("parse empty TOML");
    cfg.validate().expect("defaults must validate");
    assert_eq!(cfg.stall.window_ms, 3_000);
    assert_eq!(cfg.stall.poll_ms, 500);
    assert_eq!(cfg.calibration.move_timeout_ms, 120_000);
    assert_eq!(cfg.calibration.total_timeout_ms, 300_000);
    assert_eq!(cfg.calibration.tilt_transition_steps, 100);
    assert_eq!(cfg.correlator.resolved_first_endpoint().unwrap(), 2);
}

#[test]
fn partial_sections_keep_remaining_defaults() {
    let toml = r#"
[stall]
window_ms = 2000

[calibration]
settle_ms = 250
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.stall.window_ms, 2_000);
    assert_eq!(cfg.stall.poll_ms, 500);
    assert_eq!(cfg.calibration.settle_ms, 250);
    assert_eq!(cfg.calibration.move_timeout_ms, 120_000);
}

#[rstest]
#[case("[stall]\npoll_ms = 0", "stall.poll_ms must be > 0")]
#[case("[stall]\nwindow_ms = 100\npoll_ms = 500", "stall.window_ms must be >= stall.poll_ms")]
#[case(
    "[calibration]\nmove_timeout_ms = 3000",
    "calibration.move_timeout_ms must be > stall.window_ms"
)]
#[case(
    "[calibration]\ntotal_timeout_ms = 60000",
    "calibration.total_timeout_ms must be >= calibration.move_timeout_ms"
)]
#[case("[correlator]\nchannel_capacity = 0", "correlator.channel_capacity must be >= 1")]
#[case("[logging]\nrotation = \"weekly\"", "logging.rotation must be one of")]
#[case("[simulator]\nstart_position = 101", "simulator.start_position must be in [0, 100]")]
#[case("[simulator]\ntotal_steps = 65535", "unset sentinel")]
fn rejects_invalid_values(#[case] toml: &str, #[case] expected: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject");
    assert!(
        format!("{err}").contains(expected),
        "unexpected message: {err}"
    );
}

#[test]
fn unknown_model_is_rejected() {
    let cfg = load_toml("[correlator]\nmodel = \"x9\"").expect("parse TOML");
    let err = cfg.validate().expect_err("unknown model must fail");
    assert!(format!("{err:#}").contains("unknown device model 'x9'"));
}

#[rstest]
#[case("model = \"s2\"", 3)]
#[case("model = \"c4\"", 1)]
#[case("model = \"s2\"\nfirst_endpoint = 7", 7)]
fn first_endpoint_resolution(#[case] section: &str, #[case] expected: u8) {
    let cfg = load_toml(&format!("[correlator]\n{section}")).expect("parse TOML");
    assert_eq!(cfg.correlator.resolved_first_endpoint().unwrap(), expected);
}

#[test]
fn load_file_reports_path_on_invalid_config() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[stall]\npoll_ms = 0\n").unwrap();
    let err = load_file(&path).expect_err("invalid config should fail");
    let msg = format!("{err:#}");
    assert!(msg.contains("invalid configuration"), "{msg}");
    assert!(msg.contains("stall.poll_ms must be > 0"), "{msg}");
}

#[test]
fn load_file_missing_path_fails() {
    let dir = tempdir().unwrap();
    let err = load_file(&dir.path().join("nope.toml")).expect_err("missing file");
    assert!(format!("{err}").contains("read config"));
}

#[test]
fn shipped_sample_config_is_valid() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../etc/shade_config.toml");
    let cfg = load_file(&path).expect("sample config loads");
    assert_eq!(cfg.correlator.model.as_deref(), Some("j1"));
    assert_eq!(cfg.logging.rotation.as_deref(), Some("never"));
}
