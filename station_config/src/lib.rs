#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and persistence for the field station.
//!
//! - `Config` and its sections are deserialized from TOML and validated.
//! - `ConfigStore` is the narrow write path: only calibration (tare, scale)
//!   and the running flag are ever written back.
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod atomic;
pub mod store;

pub use store::{ConfigStore, MemoryConfigStore, TomlConfigStore};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StationCfg {
    /// Station identifier, sent as the `station` tag on every point.
    pub id: String,
    /// Persisted "was measuring" flag; resumes measuring after a restart.
    #[serde(default)]
    pub running: bool,
    /// Seconds between the end of one measurement and the start of the next.
    pub interval_s: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InfluxCfg {
    pub url: String,
    pub token: String,
    pub org: String,
    pub bucket: String,
    /// Timeout for write requests (ms).
    pub timeout_ms: u64,
    /// Timeout for the reachability probe (ms). Keep short; it runs every publish.
    pub ping_timeout_ms: u64,
}

impl Default for InfluxCfg {
    fn default() -> Self {
        Self {
            url: "http://localhost:8086".to_string(),
            token: String::new(),
            org: String::new(),
            bucket: String::new(),
            timeout_ms: 5000,
            ping_timeout_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Paths {
    pub image_folder: PathBuf,
    /// Append-only logs of values not yet delivered, one file per category.
    pub pending_folder: PathBuf,
    /// Replayed logs, renamed with a completion timestamp.
    pub archive_folder: PathBuf,
    /// Holds `measurements.csv`, one row per cycle.
    pub data_folder: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            image_folder: PathBuf::from("data/images"),
            pending_folder: PathBuf::from("data/pending"),
            archive_folder: PathBuf::from("data/archive"),
            data_folder: PathBuf::from("data"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ImageCfg {
    /// CMYK channel used by the vision pipeline (c, m, y, k).
    pub channel: String,
    /// Closing kernel size passed to the vision pipeline.
    pub kernel_size: u32,
    pub photo_wait_s: u64,
    pub preview_wait_s: u64,
}

impl Default for ImageCfg {
    fn default() -> Self {
        Self {
            channel: "k".to_string(),
            kernel_size: 20,
            photo_wait_s: 6,
            preview_wait_s: 1,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    #[default]
    Median,
    Iqr,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WeightCfg {
    pub strategy: Strategy,
    /// Valid samples per measurement.
    pub samples: usize,
    /// Hard cap on read attempts per acquisition, valid or not.
    pub max_attempts: usize,
}

impl Default for WeightCfg {
    fn default() -> Self {
        Self {
            strategy: Strategy::Median,
            samples: 10,
            max_attempts: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct CalibrationCfg {
    /// Zero-load reading in raw counts.
    pub tare: f64,
    /// Grams per tared raw count.
    pub scale: f64,
    /// Mass placed on the platform when confirming calibration.
    pub reference_weight_g: f64,
    /// Samples used for the tare estimate.
    pub samples: usize,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            tare: 0.0,
            scale: 1.0,
            reference_weight_g: 100.0,
            samples: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Pins {
    pub hx711_dt: u8,
    pub hx711_sck: u8,
    pub button_left: u8,
    pub button_right: u8,
}

impl Default for Pins {
    fn default() -> Self {
        Self {
            hx711_dt: 5,
            hx711_sck: 6,
            button_left: 21,
            button_right: 16,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ControllerCfg {
    /// Control loop period (ms). Bounds input latency.
    pub tick_ms: u64,
    /// Consecutive handler errors tolerated before giving up.
    pub error_threshold: u32,
    /// Pause after a handler error before the next tick (ms).
    pub error_backoff_ms: u64,
    /// Minimum gap between accepted button presses (ms).
    pub debounce_ms: u64,
}

impl Default for ControllerCfg {
    fn default() -> Self {
        Self {
            tick_ms: 200,
            error_threshold: 10,
            error_backoff_ms: 5000,
            debounce_ms: 50,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Hardware {
    /// Max time to wait for HX711 data-ready (DT low) per read.
    pub sensor_read_timeout_ms: u64,
    pub camera_program: String,
    pub vision_program: String,
}

impl Default for Hardware {
    fn default() -> Self {
        Self {
            sensor_read_timeout_ms: 150,
            camera_program: "libcamera-still".to_string(),
            vision_program: "growth-length".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PublisherCfg {
    /// Lines sent per remote write while replaying a pending log.
    pub replay_chunk: usize,
}

impl Default for PublisherCfg {
    fn default() -> Self {
        Self { replay_chunk: 50 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub station: StationCfg,
    #[serde(default)]
    pub influxdb: InfluxCfg,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub image: ImageCfg,
    #[serde(default)]
    pub weight: WeightCfg,
    #[serde(default)]
    pub calibration: CalibrationCfg,
    #[serde(default)]
    pub pins: Pins,
    #[serde(default)]
    pub controller: ControllerCfg,
    #[serde(default)]
    pub hardware: Hardware,
    #[serde(default)]
    pub publisher: PublisherCfg,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse and validate a config file.
pub fn load_file(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {}: {e}", path.display()))?;
    let cfg = load_toml(&text).map_err(|e| eyre::eyre!("invalid configuration: {e}"))?;
    cfg.validate()?;
    Ok(cfg)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Station
        if self.station.id.trim().is_empty() {
            eyre::bail!("station.id must not be empty");
        }
        if self.station.id.chars().any(|c| c == ',' || c.is_whitespace()) {
            eyre::bail!("station.id must not contain commas or whitespace");
        }
        if self.station.interval_s == 0 {
            eyre::bail!("station.interval_s must be >= 1");
        }

        // InfluxDB
        if !(self.influxdb.url.starts_with("http://") || self.influxdb.url.starts_with("https://"))
        {
            eyre::bail!("influxdb.url must start with http:// or https://");
        }
        if self.influxdb.timeout_ms == 0 || self.influxdb.ping_timeout_ms == 0 {
            eyre::bail!("influxdb timeouts must be >= 1 ms");
        }

        // Image
        if !["c", "m", "y", "k"].contains(&self.image.channel.as_str()) {
            eyre::bail!("image.channel must be one of c, m, y, k");
        }
        if self.image.kernel_size == 0 {
            eyre::bail!("image.kernel_size must be >= 1");
        }

        // Weight
        if self.weight.samples == 0 {
            eyre::bail!("weight.samples must be >= 1");
        }
        if self.weight.max_attempts < self.weight.samples {
            eyre::bail!("weight.max_attempts must be >= weight.samples");
        }

        // Calibration
        if !self.calibration.tare.is_finite() {
            eyre::bail!("calibration.tare must be finite");
        }
        if !self.calibration.scale.is_finite() || self.calibration.scale == 0.0 {
            eyre::bail!("calibration.scale must be finite and non-zero");
        }
        if !(self.calibration.reference_weight_g > 0.0) {
            eyre::bail!("calibration.reference_weight_g must be > 0");
        }
        if self.calibration.samples == 0 {
            eyre::bail!("calibration.samples must be >= 1");
        }

        // Controller
        if self.controller.tick_ms == 0 || self.controller.tick_ms > 1000 {
            eyre::bail!("controller.tick_ms must be in [1, 1000]");
        }
        if self.controller.error_threshold == 0 {
            eyre::bail!("controller.error_threshold must be >= 1");
        }

        // Hardware
        if self.hardware.sensor_read_timeout_ms == 0 {
            eyre::bail!("hardware.sensor_read_timeout_ms must be >= 1");
        }

        // Publisher
        if self.publisher.replay_chunk == 0 {
            eyre::bail!("publisher.replay_chunk must be >= 1");
        }

        Ok(())
    }
}
