use chrono::{DateTime, Utc};
use station_traits::CaptureError;
use thiserror::Error;

/// One invalid load-cell read. Always retried by the filter.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SensorError {
    #[error("load cell not ready")]
    NotReady,
    #[error("load cell fault: {0}")]
    Fault(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AcquisitionError {
    #[error("no valid load-cell reading after {attempts} attempts; check load cell connection")]
    NoData { attempts: usize },
    #[error("every sample was rejected as an outlier")]
    EmptyAfterFilter,
}

/// Failure of a single sink write.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("telemetry sink unreachable")]
    Unreachable,
    #[error("telemetry sink rejected write ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("telemetry transport: {0}")]
    Transport(String),
    #[error("local log io: {0}")]
    Io(String),
}

/// The publisher could not even buffer the value locally.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PublishError {
    #[error("failed to buffer {category}/{field_id} locally: {source}")]
    LocalLog {
        category: String,
        field_id: String,
        source: SinkError,
    },
    #[error("refusing to publish non-finite value for {field_id}")]
    NonFinite { field_id: String },
}

/// A stage of the measurement cycle failed; the cycle degrades rather than aborts.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StageError {
    #[error("error while taking the photo: {0}")]
    Capture(#[from] CaptureError),
    #[error("no segment found in the image; check that the plant is clearly visible")]
    NoSegments,
    #[error("error while processing the photo: {0}")]
    Vision(String),
    #[error("error while reading the picture: {0}")]
    Picture(String),
    #[error("error while getting the weight: {0}")]
    Weight(#[from] AcquisitionError),
    #[error("error while sending data: {0}")]
    Publish(#[from] PublishError),
    #[error("error while saving the measurement locally: {0}")]
    History(SinkError),
}

/// Errors from a controller state handler. Each one counts toward the fatal threshold.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StationError {
    #[error("button input: {0}")]
    Input(String),
    #[error("display: {0}")]
    Display(String),
    #[error("config store: {0}")]
    Config(String),
    #[error("calibration: {0}")]
    Calibration(String),
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error("measurement worker: {0}")]
    Worker(String),
}

/// Too many consecutive handler errors; the station gives up.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{consecutive} consecutive errors, last at {}: {last}", .at.format("%Y-%m-%dT%H:%M:%SZ"))]
pub struct FatalError {
    pub consecutive: u32,
    pub at: DateTime<Utc>,
    pub last: String,
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_messages_name_the_stage() {
        let e = StageError::from(AcquisitionError::NoData { attempts: 1000 });
        assert!(e.to_string().starts_with("error while getting the weight"));
        assert!(e.to_string().contains("1000 attempts"));
    }

    #[test]
    fn fatal_error_shows_count_and_last_message() {
        let at = DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let e = FatalError {
            consecutive: 10,
            at,
            last: "display: spi".into(),
        };
        assert_eq!(
            e.to_string(),
            "10 consecutive errors, last at 2024-05-01T10:00:00Z: display: spi"
        );
    }
}
