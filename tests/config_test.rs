//! Integration tests for configuration loading

use occupancy_counter::infra::Config;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_load_config_from_file() {
    let mut temp_file = NamedTempFile::new().unwrap();

    let config_content = r#"
[venue]
name = "NİLBEL 29 Ekim Kafe"
store_path = "/var/lib/occupancy/data.json"
default_max_capacity = 120
initial_occupancy = 12

[calibration]
frame_threshold = 90
frame_width = 1920
frame_height = 1080

[occupancy_log]
interval_secs = 300

[tracks]
stale_after_frames = 150

[metrics]
interval_secs = 15

[egress]
crossings_file = "logs/crossings.jsonl"
"#;

    temp_file.write_all(config_content.as_bytes()).unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();

    assert_eq!(config.venue_name(), "NİLBEL 29 Ekim Kafe");
    assert_eq!(config.store_path(), "/var/lib/occupancy/data.json");
    assert_eq!(config.default_max_capacity(), 120);
    assert_eq!(config.initial_occupancy(), 12);
    assert_eq!(config.calibration_frame_threshold(), 90);
    assert_eq!(config.frame_width(), 1920);
    assert_eq!(config.frame_height(), 1080);
    assert_eq!(config.log_interval_secs(), 300);
    assert_eq!(config.stale_after_frames(), 150);
    assert_eq!(config.metrics_interval_secs(), 15);
    assert_eq!(config.crossings_file(), Some("logs/crossings.jsonl"));
    assert_eq!(config.config_file(), temp_file.path().display().to_string());
}

#[test]
fn test_load_from_path_fallback() {
    let config = Config::load_from_path("/nonexistent/config.toml");
    assert_eq!(config.calibration_frame_threshold(), 60);
    assert_eq!(config.log_interval_secs(), 120);
    assert_eq!(config.default_max_capacity(), 80);
    assert_eq!(config.config_file(), "default");
}

#[test]
fn test_load_from_path_invalid_falls_back() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(b"[calibration]\nframe_threshold = \"sixty\"\n").unwrap();
    temp_file.flush().unwrap();

    assert!(Config::from_file(temp_file.path()).is_err());

    let config = Config::load_from_path(temp_file.path());
    assert_eq!(config.calibration_frame_threshold(), 60);
}

#[test]
fn test_load_uses_explicit_config_flag() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(b"[venue]\nname = \"Flag Kafe\"\n").unwrap();
    temp_file.flush().unwrap();

    let path = temp_file.path().to_str().unwrap();
    let config = Config::load(Some(path));
    assert_eq!(config.venue_name(), "Flag Kafe");
    assert_eq!(config.config_file(), path);
}
