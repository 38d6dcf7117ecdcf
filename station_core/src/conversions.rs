//! `From` implementations bridging `station_config` types to `station_core` types.

use crate::calibration::CalibrationState;
use crate::config::{ControllerCfg, InfluxTarget, LogPaths, PipelineCfg, RunnerCfg};
use crate::filter::{FilterStrategy, WeightFilter};
use std::time::Duration;

// ── WeightFilter ─────────────────────────────────────────────────────────────

impl From<station_config::Strategy> for FilterStrategy {
    fn from(s: station_config::Strategy) -> Self {
        match s {
            station_config::Strategy::Median => Self::Median,
            station_config::Strategy::Iqr => Self::Iqr,
        }
    }
}

impl From<&station_config::WeightCfg> for WeightFilter {
    fn from(c: &station_config::WeightCfg) -> Self {
        Self {
            strategy: c.strategy.into(),
            samples: c.samples,
            max_attempts: c.max_attempts,
        }
    }
}

// ── Calibration ──────────────────────────────────────────────────────────────

impl From<&station_config::CalibrationCfg> for CalibrationState {
    fn from(c: &station_config::CalibrationCfg) -> Self {
        Self::new(c.tare, c.scale)
    }
}

// ── InfluxTarget ─────────────────────────────────────────────────────────────

impl From<&station_config::Config> for InfluxTarget {
    fn from(c: &station_config::Config) -> Self {
        Self {
            url: c.influxdb.url.clone(),
            token: c.influxdb.token.clone(),
            org: c.influxdb.org.clone(),
            bucket: c.influxdb.bucket.clone(),
            station_id: c.station.id.clone(),
            timeout: Duration::from_millis(c.influxdb.timeout_ms),
            ping_timeout: Duration::from_millis(c.influxdb.ping_timeout_ms),
        }
    }
}

// ── Paths ────────────────────────────────────────────────────────────────────

impl From<&station_config::Paths> for LogPaths {
    fn from(c: &station_config::Paths) -> Self {
        Self {
            pending: c.pending_folder.clone(),
            archive: c.archive_folder.clone(),
            history: c.data_folder.join("measurements.csv"),
        }
    }
}

// ── PipelineCfg ──────────────────────────────────────────────────────────────

impl From<&station_config::Config> for PipelineCfg {
    fn from(c: &station_config::Config) -> Self {
        Self {
            channel: c.image.channel.clone(),
            kernel_size: c.image.kernel_size,
            photo_wait: Duration::from_secs(c.image.photo_wait_s),
            preview_wait: Duration::from_secs(c.image.preview_wait_s),
            tare_samples: c.calibration.samples,
        }
    }
}

// ── ControllerCfg / RunnerCfg ────────────────────────────────────────────────

impl From<&station_config::Config> for ControllerCfg {
    fn from(c: &station_config::Config) -> Self {
        Self {
            interval: Duration::from_secs(c.station.interval_s),
            error_threshold: c.controller.error_threshold,
            reference_weight_g: c.calibration.reference_weight_g,
        }
    }
}

impl From<&station_config::ControllerCfg> for RunnerCfg {
    fn from(c: &station_config::ControllerCfg) -> Self {
        Self {
            tick: Duration::from_millis(c.tick_ms),
            error_backoff: Duration::from_millis(c.error_backoff_ms),
        }
    }
}
