//! Wiring of a station from its TOML config and a set of peripherals.
//!
//! Peripherals are boxed so the binary can choose simulated or real ones at
//! runtime; tests use the generic constructors directly.

use crate::config::{InfluxTarget, LogPaths, PipelineCfg};
use crate::error::SinkError;
use crate::filter::WeightFilter;
use crate::pipeline::MeasurementPipeline;
use crate::telemetry::publisher::SharedClock;
use crate::telemetry::{InfluxSink, LocalLog, MeasurementHistory, ResilientPublisher};
use station_traits::{Camera, LoadCell, Vision};

pub type DynLoadCell = Box<dyn LoadCell + Send>;
pub type DynCamera = Box<dyn Camera + Send>;
pub type DynVision = Box<dyn Vision + Send>;
pub type DynPipeline = MeasurementPipeline<DynLoadCell, DynCamera, DynVision, InfluxSink>;

pub struct Peripherals {
    pub load_cell: DynLoadCell,
    pub camera: DynCamera,
    pub vision: DynVision,
}

impl std::fmt::Debug for Peripherals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peripherals").finish_non_exhaustive()
    }
}

/// Remote InfluxDB sink with the local log as fallback.
pub fn open_publisher(
    cfg: &station_config::Config,
    clock: SharedClock,
) -> Result<ResilientPublisher<InfluxSink>, SinkError> {
    let remote = InfluxSink::new(&InfluxTarget::from(cfg))?;
    let paths = LogPaths::from(&cfg.paths);
    let log = LocalLog::open(&paths.pending, &paths.archive)?;
    Ok(ResilientPublisher::new(
        remote,
        log,
        clock,
        cfg.publisher.replay_chunk,
    ))
}

pub fn build_pipeline(
    cfg: &station_config::Config,
    peripherals: Peripherals,
    clock: SharedClock,
) -> Result<DynPipeline, SinkError> {
    let publisher = open_publisher(cfg, clock.clone())?;
    let history = MeasurementHistory::open(&LogPaths::from(&cfg.paths).history)?;
    Ok(MeasurementPipeline::new(
        peripherals.load_cell,
        peripherals.camera,
        peripherals.vision,
        publisher,
        WeightFilter::from(&cfg.weight),
        PipelineCfg::from(cfg),
        cfg.station.id.clone(),
        clock,
    )
    .with_history(history))
}
