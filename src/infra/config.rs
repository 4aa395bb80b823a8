//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml
//!
//! Every key has a default, so a partial file (or no file at all) is valid.

use crate::domain::venue::DEFAULT_MAX_CAPACITY;
use crate::services::calibrator::DEFAULT_FRAME_THRESHOLD;
use crate::services::crossing_engine::DEFAULT_STALE_AFTER_FRAMES;
use crate::services::occupancy_logger::DEFAULT_LOG_INTERVAL;
use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use tracing::warn;

/// Environment variable naming the config file when `--config` is absent
pub const CONFIG_FILE_ENV: &str = "CONFIG_FILE";

pub const DEFAULT_CONFIG_PATH: &str = "config/dev.toml";

fn pick_config_path(cli: Option<&str>, env_path: Option<String>) -> String {
    if let Some(path) = cli {
        return path.to_string();
    }
    match env_path {
        Some(path) if !path.is_empty() => path,
        _ => DEFAULT_CONFIG_PATH.to_string(),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VenueConfig {
    /// Exact `venue_name` of the record to log into
    #[serde(default = "default_venue_name")]
    pub name: String,
    /// Path to the venue record store (JSON)
    #[serde(default = "default_store_path")]
    pub store_path: String,
    /// Capacity used when the venue is missing from the store
    #[serde(default = "default_max_capacity")]
    pub default_max_capacity: i64,
    /// Occupancy at startup; counting starts from this baseline
    #[serde(default)]
    pub initial_occupancy: i64,
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            name: default_venue_name(),
            store_path: default_store_path(),
            default_max_capacity: default_max_capacity(),
            initial_occupancy: 0,
        }
    }
}

fn default_venue_name() -> String {
    "venue".to_string()
}

fn default_store_path() -> String {
    "data.json".to_string()
}

fn default_max_capacity() -> i64 {
    DEFAULT_MAX_CAPACITY
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalibrationConfig {
    /// Frames observed before the door line is inferred
    #[serde(default = "default_frame_threshold")]
    pub frame_threshold: u64,
    /// Frame size, used for the midpoint fallback
    #[serde(default = "default_frame_width")]
    pub frame_width: u32,
    #[serde(default = "default_frame_height")]
    pub frame_height: u32,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            frame_threshold: default_frame_threshold(),
            frame_width: default_frame_width(),
            frame_height: default_frame_height(),
        }
    }
}

fn default_frame_threshold() -> u64 {
    DEFAULT_FRAME_THRESHOLD
}

fn default_frame_width() -> u32 {
    1280
}

fn default_frame_height() -> u32 {
    720
}

#[derive(Debug, Clone, Deserialize)]
pub struct OccupancyLogConfig {
    #[serde(default = "default_log_interval_secs")]
    pub interval_secs: u64,
}

impl Default for OccupancyLogConfig {
    fn default() -> Self {
        Self { interval_secs: default_log_interval_secs() }
    }
}

fn default_log_interval_secs() -> u64 {
    DEFAULT_LOG_INTERVAL.as_secs()
}

#[derive(Debug, Clone, Deserialize)]
pub struct TracksConfig {
    /// Frames without a sighting before a track is forgotten (0 = never)
    #[serde(default = "default_stale_after_frames")]
    pub stale_after_frames: u64,
}

impl Default for TracksConfig {
    fn default() -> Self {
        Self { stale_after_frames: default_stale_after_frames() }
    }
}

fn default_stale_after_frames() -> u64 {
    DEFAULT_STALE_AFTER_FRAMES
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_interval_secs")]
    pub interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval_secs() }
    }
}

fn default_metrics_interval_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct EgressConfig {
    /// JSONL journal of crossing events (empty to disable)
    #[serde(default)]
    pub crossings_file: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub venue: VenueConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub occupancy_log: OccupancyLogConfig,
    #[serde(default)]
    pub tracks: TracksConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub egress: EgressConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    venue_name: String,
    store_path: String,
    default_max_capacity: i64,
    initial_occupancy: i64,
    calibration_frame_threshold: u64,
    frame_width: u32,
    frame_height: u32,
    log_interval_secs: u64,
    stale_after_frames: u64,
    metrics_interval_secs: u64,
    crossings_file: Option<String>,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default".to_string())
    }
}

impl Config {
    fn from_toml(toml_config: TomlConfig, config_file: String) -> Self {
        let crossings_file = Some(toml_config.egress.crossings_file).filter(|f| !f.is_empty());

        Self {
            venue_name: toml_config.venue.name,
            store_path: toml_config.venue.store_path,
            default_max_capacity: toml_config.venue.default_max_capacity,
            initial_occupancy: toml_config.venue.initial_occupancy,
            calibration_frame_threshold: toml_config.calibration.frame_threshold,
            frame_width: toml_config.calibration.frame_width,
            frame_height: toml_config.calibration.frame_height,
            log_interval_secs: toml_config.occupancy_log.interval_secs,
            stale_after_frames: toml_config.tracks.stale_after_frames,
            metrics_interval_secs: toml_config.metrics.interval_secs,
            crossings_file,
            config_file,
        }
    }

    /// Determine config file path from the `--config` value or environment
    pub fn resolve_config_path(cli: Option<&str>) -> String {
        pick_config_path(cli, env::var(CONFIG_FILE_ENV).ok())
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str, config_file: &str) -> anyhow::Result<Self> {
        let toml_config: TomlConfig = toml::from_str(content)
            .with_context(|| format!("Failed to parse config file {}", config_file))?;
        Ok(Self::from_toml(toml_config, config_file.to_string()))
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        Self::from_toml_str(&content, &path.display().to_string())
    }

    /// Load configuration from a path, falling back to defaults on any error
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %format!("{:#}", e), "config_load_failed_using_defaults");
                Self::default()
            }
        }
    }

    /// Load configuration - tries TOML file first, falls back to defaults
    pub fn load(cli: Option<&str>) -> Self {
        Self::load_from_path(Self::resolve_config_path(cli))
    }

    // Getters for all config fields
    pub fn venue_name(&self) -> &str {
        &self.venue_name
    }

    pub fn store_path(&self) -> &str {
        &self.store_path
    }

    pub fn default_max_capacity(&self) -> i64 {
        self.default_max_capacity
    }

    pub fn initial_occupancy(&self) -> i64 {
        self.initial_occupancy
    }

    pub fn calibration_frame_threshold(&self) -> u64 {
        self.calibration_frame_threshold
    }

    pub fn frame_width(&self) -> u32 {
        self.frame_width
    }

    pub fn frame_height(&self) -> u32 {
        self.frame_height
    }

    pub fn log_interval_secs(&self) -> u64 {
        self.log_interval_secs
    }

    pub fn stale_after_frames(&self) -> u64 {
        self.stale_after_frames
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn crossings_file(&self) -> Option<&str> {
        self.crossings_file.as_deref()
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to point at a venue store
    pub fn with_store(mut self, store_path: &str, venue_name: &str) -> Self {
        self.store_path = store_path.to_string();
        self.venue_name = venue_name.to_string();
        self
    }

    /// Builder method for tests to set the calibration window
    pub fn with_calibration_frames(mut self, frames: u64) -> Self {
        self.calibration_frame_threshold = frames;
        self
    }

    /// Builder method for tests to set the starting occupancy
    pub fn with_initial_occupancy(mut self, occupancy: i64) -> Self {
        self.initial_occupancy = occupancy;
        self
    }

    /// Builder method for tests to set the staleness window
    pub fn with_stale_after_frames(mut self, frames: u64) -> Self {
        self.stale_after_frames = frames;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.calibration_frame_threshold(), 60);
        assert_eq!(config.log_interval_secs(), 120);
        assert_eq!(config.default_max_capacity(), 80);
        assert_eq!(config.initial_occupancy(), 0);
        assert_eq!(config.stale_after_frames(), 300);
        assert_eq!(config.frame_width(), 1280);
        assert_eq!(config.frame_height(), 720);
        assert!(config.crossings_file().is_none());
        assert_eq!(config.config_file(), "default");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
[venue]
name = "NİLBEL 29 Ekim Kafe"
initial_occupancy = 47

[calibration]
frame_threshold = 90
"#,
            "inline.toml",
        )
        .unwrap();

        assert_eq!(config.venue_name(), "NİLBEL 29 Ekim Kafe");
        assert_eq!(config.initial_occupancy(), 47);
        assert_eq!(config.calibration_frame_threshold(), 90);
        assert_eq!(config.frame_height(), 720);
        assert_eq!(config.log_interval_secs(), 120);
        assert_eq!(config.store_path(), "data.json");
    }

    #[test]
    fn test_empty_crossings_file_disables_journal() {
        let config = Config::from_toml_str("[egress]\ncrossings_file = \"\"\n", "x").unwrap();
        assert!(config.crossings_file().is_none());

        let config =
            Config::from_toml_str("[egress]\ncrossings_file = \"out/c.jsonl\"\n", "x").unwrap();
        assert_eq!(config.crossings_file(), Some("out/c.jsonl"));
    }

    #[test]
    fn test_invalid_toml_is_error() {
        assert!(Config::from_toml_str("[venue\nname=", "bad.toml").is_err());
    }

    #[test]
    fn test_config_path_flag_wins_over_env() {
        let path = pick_config_path(Some("config/kafe.toml"), Some("config/env.toml".to_string()));
        assert_eq!(path, "config/kafe.toml");
    }

    #[test]
    fn test_config_path_from_env_without_flag() {
        let path = pick_config_path(None, Some("/etc/occupancy/site.toml".to_string()));
        assert_eq!(path, "/etc/occupancy/site.toml");
    }

    #[test]
    fn test_config_path_default() {
        assert_eq!(pick_config_path(None, None), DEFAULT_CONFIG_PATH);
        // An empty variable counts as unset
        assert_eq!(pick_config_path(None, Some(String::new())), DEFAULT_CONFIG_PATH);
    }
}
