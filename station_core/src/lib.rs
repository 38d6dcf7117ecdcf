#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Measurement and delivery core of the field station (hardware-agnostic).
//!
//! All peripheral access goes through the `station_traits` collaborators.
//!
//! ## Architecture
//!
//! - **Filtering**: batch acquisition with median or IQR outlier rejection (`filter`)
//! - **Telemetry**: points, InfluxDB sink, local durable log, resilient publisher (`telemetry`)
//! - **Pipeline**: photo → growth → weight → publish, degrading per stage (`pipeline`)
//! - **Execution**: inline or dedicated-thread executor for pipeline jobs (`worker`)
//! - **Control**: button-driven state machine with fail-stop error counting (`controller`)

pub mod builder;
pub mod calibration;
pub mod config;
pub mod controller;
pub mod conversions;
pub mod error;
pub mod filter;
pub mod hw_error;
pub mod mocks;
pub mod pipeline;
pub mod runner;
pub mod screens;
pub mod status;
pub mod telemetry;
pub mod util;
pub mod worker;

pub use calibration::CalibrationState;
pub use config::{ControllerCfg, InfluxTarget, LogPaths, PipelineCfg, RunnerCfg};
pub use controller::{Mode, StationController, TickReport};
pub use error::{
    AcquisitionError, FatalError, PublishError, SensorError, SinkError, StageError, StationError,
};
pub use filter::{
    FilterStrategy, Summary, WeightEstimate, WeightFilter, acquire_iqr_filtered, acquire_median,
};
pub use pipeline::{
    CycleOutcome, GROWTH_NO_PHOTO, GROWTH_NO_SEGMENTS, MeasurementPipeline, MeasurementRecord,
    Stage, StageEvent, WEIGHT_FAILED,
};
pub use status::StationStatus;
pub use telemetry::publisher::SharedClock;
pub use telemetry::{
    Category, Delivery, FieldValue, InfluxSink, LocalLog, MeasurementHistory, Point, RemoteSink,
    ResilientPublisher, TelemetrySink,
};
pub use worker::{Executor, Inline, Job, JobHandler, JobKind, JobResult, Worker, WorkerEvent};
