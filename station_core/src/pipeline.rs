//! One measurement cycle: photo → growth → weight → publish.
//!
//! Each stage degrades instead of aborting the cycle. The sentinel values
//! below are what the remote sink sees for a degraded stage.

use crate::calibration::CalibrationState;
use crate::config::PipelineCfg;
use crate::error::{AcquisitionError, SinkError, StageError};
use crate::filter::{WeightEstimate, WeightFilter};
use crate::telemetry::publisher::SharedClock;
use crate::telemetry::{
    fields, Category, Delivery, FieldValue, MeasurementHistory, RemoteSink, ResilientPublisher,
};
use base64::Engine as _;
use chrono::{DateTime, Utc};
use station_traits::{Camera, CaptureError, LoadCell, Vision, VisionError};
use std::path::PathBuf;

/// Growth published when no photo (or no usable vision result) is available.
pub const GROWTH_NO_PHOTO: f64 = -1.0;
/// Growth published when the vision pipeline found no segment.
pub const GROWTH_NO_SEGMENTS: f64 = 0.0;
/// Weight fields of a cycle whose weight stage failed.
pub const WEIGHT_FAILED: f64 = -1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    Photo,
    Growth,
    Weight,
    Publish,
    Done,
}

/// Progress notice for the display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageEvent {
    pub stage: Stage,
    pub message: String,
}

impl StageEvent {
    fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

/// Values produced by one cycle. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRecord {
    pub timestamp: DateTime<Utc>,
    /// `None` when no photo could be analysed; `Some(0.0)` when no segment was found.
    pub growth: Option<f64>,
    /// Filtered reading minus tare, in counts.
    pub weight_raw: f64,
    pub weight_grams: f64,
    pub weight_stddev: f64,
    pub picture: Option<Vec<u8>>,
    pub station_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutcome {
    pub record: MeasurementRecord,
    pub stage_errors: Vec<StageError>,
    pub sent: usize,
    pub buffered: usize,
    /// Remote reachability as last probed by the publisher.
    pub connected: bool,
    pub image: Option<PathBuf>,
    pub finished_at: DateTime<Utc>,
}

impl CycleOutcome {
    pub fn is_clean(&self) -> bool {
        self.stage_errors.is_empty()
    }

    /// The cycle finished as failed: no weight was published.
    pub fn weight_failed(&self) -> bool {
        self.stage_errors
            .iter()
            .any(|e| matches!(e, StageError::Weight(_)))
    }
}

pub struct MeasurementPipeline<L, C, V, R> {
    load_cell: L,
    camera: C,
    vision: V,
    publisher: ResilientPublisher<R>,
    filter: WeightFilter,
    cfg: PipelineCfg,
    station_id: String,
    clock: SharedClock,
    history: Option<MeasurementHistory>,
}

#[derive(Default)]
struct Tally {
    sent: usize,
    buffered: usize,
}

impl<L, C, V, R> MeasurementPipeline<L, C, V, R>
where
    L: LoadCell,
    C: Camera,
    V: Vision,
    R: RemoteSink,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        load_cell: L,
        camera: C,
        vision: V,
        publisher: ResilientPublisher<R>,
        filter: WeightFilter,
        cfg: PipelineCfg,
        station_id: impl Into<String>,
        clock: SharedClock,
    ) -> Self {
        Self {
            load_cell,
            camera,
            vision,
            publisher,
            filter,
            cfg,
            station_id: station_id.into(),
            clock,
            history: None,
        }
    }

    /// Also append every cycle to a local measurement history.
    pub fn with_history(mut self, history: MeasurementHistory) -> Self {
        self.history = Some(history);
        self
    }

    pub fn publisher(&mut self) -> &mut ResilientPublisher<R> {
        &mut self.publisher
    }

    /// Run one full cycle with the given calibration.
    pub fn run_cycle(
        &mut self,
        calibration: &CalibrationState,
        emit: &mut dyn FnMut(StageEvent),
    ) -> CycleOutcome {
        let timestamp = self.clock.now();
        let mut errors: Vec<StageError> = Vec::new();
        tracing::info!(station = %self.station_id, "starting measurement cycle");
        emit(StageEvent::new(Stage::Start, "Starting measurement pipeline"));

        // Photo
        emit(StageEvent::new(Stage::Photo, "Taking photo"));
        let (image, picture) = match self.camera.capture(self.cfg.photo_wait, false) {
            Ok(path) => {
                tracing::debug!(path = %path.display(), "photo captured");
                match std::fs::read(&path) {
                    Ok(bytes) => (Some(path), Some(bytes)),
                    Err(e) => {
                        let err = StageError::Picture(format!("{}: {e}", path.display()));
                        tracing::warn!(error = %err, "picture unreadable");
                        errors.push(err);
                        (Some(path), None)
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "photo capture failed");
                emit(StageEvent::new(Stage::Photo, "Error while taking the photo"));
                errors.push(StageError::Capture(e));
                (None, None)
            }
        };

        // Growth
        let growth = match &image {
            None => None,
            Some(path) => {
                emit(StageEvent::new(Stage::Growth, "Processing photo"));
                match self
                    .vision
                    .growth_length(path, &self.cfg.channel, self.cfg.kernel_size)
                {
                    Ok(g) => {
                        tracing::debug!(growth = g, "growth computed");
                        emit(StageEvent::new(Stage::Growth, format!("Growth value : {g:.2}")));
                        Some(g)
                    }
                    Err(VisionError::NoSegmentsFound) => {
                        tracing::warn!("no segment found in the image");
                        emit(StageEvent::new(Stage::Growth, "Error while processing the photo"));
                        errors.push(StageError::NoSegments);
                        Some(GROWTH_NO_SEGMENTS)
                    }
                    Err(VisionError::Failed(msg)) => {
                        tracing::warn!(error = %msg, "vision pipeline failed");
                        emit(StageEvent::new(Stage::Growth, "Error while processing the photo"));
                        errors.push(StageError::Vision(msg));
                        None
                    }
                }
            }
        };

        // Weight
        emit(StageEvent::new(Stage::Weight, "Measuring weight"));
        let weight = self.filter.measure(&mut self.load_cell, calibration);
        match &weight {
            Ok(w) => emit(StageEvent::new(
                Stage::Weight,
                format!("Weight : {:.2}", w.tared),
            )),
            Err(e) => {
                tracing::warn!(error = %e, "weight acquisition failed");
                emit(StageEvent::new(Stage::Weight, "Error while getting the weight"));
                errors.push(StageError::Weight(e.clone()));
            }
        }

        let record = self.build_record(timestamp, growth, picture, weight.as_ref().ok());

        if let Some(history) = &mut self.history {
            let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
            if let Err(e) = history.append(&record, &messages) {
                tracing::warn!(error = %e, "measurement history not written");
                errors.push(StageError::History(e));
            }
        }

        // Publish
        emit(StageEvent::new(Stage::Publish, "Sending data to the DB"));
        let mut tally = Tally::default();
        let mut publish_errors = Vec::new();
        self.publish_record(&record, weight.is_ok(), &errors, &mut tally, &mut publish_errors);
        errors.extend(publish_errors);

        let connected = self.publisher.connected();
        let done = if tally.buffered == 0 && tally.sent > 0 {
            "Data sent to the DB"
        } else if tally.buffered > 0 {
            "Could not send data to the DB, no connection"
        } else {
            "Error while sending data to the DB"
        };
        emit(StageEvent::new(Stage::Done, done));

        let finished_at = self.clock.now();
        tracing::info!(
            sent = tally.sent,
            buffered = tally.buffered,
            errors = errors.len(),
            weight_failed = weight.is_err(),
            "measurement cycle finished"
        );
        CycleOutcome {
            record,
            stage_errors: errors,
            sent: tally.sent,
            buffered: tally.buffered,
            connected,
            image,
            finished_at,
        }
    }

    fn build_record(
        &self,
        timestamp: DateTime<Utc>,
        growth: Option<f64>,
        picture: Option<Vec<u8>>,
        weight: Option<&WeightEstimate>,
    ) -> MeasurementRecord {
        let (weight_raw, weight_grams, weight_stddev) = match weight {
            Some(w) => (w.tared, w.grams, w.stddev),
            None => (WEIGHT_FAILED, WEIGHT_FAILED, WEIGHT_FAILED),
        };
        MeasurementRecord {
            timestamp,
            growth,
            weight_raw,
            weight_grams,
            weight_stddev,
            picture,
            station_id: self.station_id.clone(),
        }
    }

    fn publish_record(
        &mut self,
        record: &MeasurementRecord,
        weight_ok: bool,
        stage_errors: &[StageError],
        tally: &mut Tally,
        failures: &mut Vec<StageError>,
    ) {
        let ts = record.timestamp;
        let mut points: Vec<(Category, &str, FieldValue)> = vec![(
            Category::Growth,
            fields::GROWTH,
            FieldValue::Float(record.growth.unwrap_or(GROWTH_NO_PHOTO)),
        )];
        if weight_ok {
            points.push((Category::Weight, fields::WEIGHT, record.weight_raw.into()));
            points.push((Category::Weight, fields::WEIGHT_G, record.weight_grams.into()));
            points.push((
                Category::Weight,
                fields::STANDARD_DEVIATION,
                record.weight_stddev.into(),
            ));
        }
        if let Some(bytes) = &record.picture {
            let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
            points.push((Category::Picture, fields::PICTURE, FieldValue::Text(encoded)));
        }
        for e in stage_errors {
            points.push((
                Category::Error,
                fields::ERROR_MESSAGE,
                FieldValue::Text(e.to_string()),
            ));
        }

        for (category, field, value) in points {
            match self.publisher.publish(category, field, value, ts) {
                Ok(Delivery::Sent) => tally.sent += 1,
                Ok(Delivery::Buffered) => tally.buffered += 1,
                Err(e) => {
                    tracing::error!(category = %category, field, error = %e, "value lost to local log failure");
                    failures.push(StageError::Publish(e));
                }
            }
        }
    }

    /// Zero-load estimate over the configured tare sample count, raw counts.
    pub fn tare(&mut self) -> Result<f64, AcquisitionError> {
        let s = self
            .filter
            .with_samples(self.cfg.tare_samples)
            .acquire(&mut self.load_cell)?;
        tracing::info!(tare = s.center, stddev = s.stddev, "tare measured");
        Ok(s.center)
    }

    /// Filtered absolute reading, raw counts.
    pub fn read_raw(&mut self) -> Result<f64, AcquisitionError> {
        Ok(self.filter.acquire(&mut self.load_cell)?.center)
    }

    pub fn preview(&mut self) -> Result<PathBuf, CaptureError> {
        self.camera.capture(self.cfg.preview_wait, true)
    }

    /// Flush buffered values to the remote sink.
    pub fn resync(&mut self) -> Result<usize, SinkError> {
        self.publisher.resync()
    }
}
