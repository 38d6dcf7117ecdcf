//! Runtime configuration for the station core.
//!
//! These are separate from the TOML schema in `station_config`; see
//! `conversions.rs` for the mapping.

use std::path::PathBuf;
use std::time::Duration;

/// Where and how to reach InfluxDB.
#[derive(Debug, Clone)]
pub struct InfluxTarget {
    pub url: String,
    pub token: String,
    pub org: String,
    pub bucket: String,
    /// Sent as the `station` tag on every point.
    pub station_id: String,
    pub timeout: Duration,
    pub ping_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct LogPaths {
    pub pending: PathBuf,
    pub archive: PathBuf,
    /// Per-cycle measurement history.
    pub history: PathBuf,
}

/// Per-cycle settings for the measurement pipeline.
#[derive(Debug, Clone)]
pub struct PipelineCfg {
    pub channel: String,
    pub kernel_size: u32,
    pub photo_wait: Duration,
    pub preview_wait: Duration,
    /// Samples used for the zero-load estimate.
    pub tare_samples: usize,
}

impl Default for PipelineCfg {
    fn default() -> Self {
        Self {
            channel: "k".to_string(),
            kernel_size: 20,
            photo_wait: Duration::from_secs(6),
            preview_wait: Duration::from_secs(1),
            tare_samples: 20,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ControllerCfg {
    /// Gap between the end of one cycle and the start of the next.
    pub interval: Duration,
    /// Consecutive handler errors that make the controller give up.
    pub error_threshold: u32,
    pub reference_weight_g: f64,
}

impl Default for ControllerCfg {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3600),
            error_threshold: 10,
            reference_weight_g: 100.0,
        }
    }
}

/// Pacing of the control loop.
#[derive(Debug, Clone, Copy)]
pub struct RunnerCfg {
    pub tick: Duration,
    /// Pause after a tick that reported an error.
    pub error_backoff: Duration,
}

impl Default for RunnerCfg {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(200),
            error_backoff: Duration::from_secs(5),
        }
    }
}
