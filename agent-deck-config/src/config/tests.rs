use super::*;
use tempfile::tempdir;

#[test]
fn test_default_timings_match_lifecycle_constants() {
    let timings = SessionTimings::default();
    assert_eq!(timings.stale_input_threshold_ms, 8_000);
    assert_eq!(timings.recovery_cooldown_ms, 2_500);
    assert_eq!(timings.recovery_grace_ms, 1_200);
    assert_eq!(timings.stale_poll_interval_ms, 1_000);
    assert_eq!(timings.max_auto_recover_attempts, 1);
    assert_eq!(timings.focus_retry_delays_ms, vec![0, 50, 120, 250, 500]);
}

#[test]
fn test_default_diagnostics() {
    let config = Config::default();
    assert_eq!(config.diagnostics.capacity, 400);
    assert_eq!(config.diagnostics.capture_debounce_ms, 60_000);
    assert!(!config.diagnostics_enabled());
}

#[test]
fn test_debug_log_level_enables_diagnostics() {
    let config = Config {
        log_level: LogLevel::Debug,
        ..Config::default()
    };
    assert!(config.diagnostics_enabled());
}

#[test]
fn test_partial_yaml_fills_defaults() {
    let yaml = "session:\n  stale_input_threshold_ms: 5000\nlog_level: info\n";
    let config: Config = serde_yaml_ng::from_str(yaml).unwrap();
    assert_eq!(config.session.stale_input_threshold_ms, 5000);
    assert_eq!(config.session.recovery_cooldown_ms, 2_500);
    assert_eq!(config.log_level, LogLevel::Info);
    assert_eq!(config.cols, 80);
}

#[test]
fn test_validate_rejects_zero_threshold() {
    let mut config = Config::default();
    config.session.stale_input_threshold_ms = 0;
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("stale_input_threshold_ms"));
}

#[test]
fn test_validate_rejects_unsorted_focus_delays() {
    let mut config = Config::default();
    config.session.focus_retry_delays_ms = vec![0, 200, 100];
    assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
}

#[test]
fn test_save_and_load_roundtrip() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("nested").join("config.yaml");

    let mut config = Config::default();
    config.default_provider_id = Some("claude".to_string());
    config.diagnostics.enabled = true;
    config.save_to(&path).unwrap();

    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_load_empty_file_uses_defaults() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("config.yaml");
    std::fs::write(&path, "  \n").unwrap();
    assert_eq!(Config::load_from(&path).unwrap(), Config::default());
}

#[test]
fn test_load_corrupt_file_is_parse_error() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("config.yaml");
    std::fs::write(&path, "session: [[[").unwrap();
    let err = Config::load_from(&path).unwrap_err();
    assert!(err.downcast_ref::<ConfigError>().is_some());
}

#[test]
fn test_snapshot_path_override() {
    let config = Config {
        snapshot_path: Some(PathBuf::from("/tmp/deck.json")),
        ..Config::default()
    };
    assert_eq!(config.snapshot_file_path(), PathBuf::from("/tmp/deck.json"));
}
