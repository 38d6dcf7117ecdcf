//! Telemetry points and the sinks that durably record them.
//!
//! A point is one scalar field of one category at one instant. The remote
//! sink (InfluxDB v2) and the local append-only log both consume points;
//! [`ResilientPublisher`] decides which one gets each value.

pub mod history;
pub mod influx;
pub mod local_log;
pub mod publisher;

pub use history::MeasurementHistory;
pub use influx::InfluxSink;
pub use local_log::{LocalLog, Settled};
pub use publisher::{Delivery, ResilientPublisher};

use crate::error::SinkError;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

/// Field ids used by the measurement cycle.
pub mod fields {
    pub const GROWTH: &str = "growth";
    pub const WEIGHT: &str = "weight";
    pub const WEIGHT_G: &str = "weight_g";
    pub const STANDARD_DEVIATION: &str = "standard_deviation";
    pub const PICTURE: &str = "picture";
    pub const ERROR_MESSAGE: &str = "error_message";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Growth,
    Weight,
    Picture,
    Error,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Growth,
        Category::Weight,
        Category::Picture,
        Category::Error,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Growth => "Growth",
            Self::Weight => "Weight",
            Self::Picture => "Picture",
            Self::Error => "Error",
        }
    }

    /// Categories whose values are always strings.
    pub fn is_textual(self) -> bool {
        matches!(self, Self::Picture | Self::Error)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown category {s:?}"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    /// Encoding used in the local log. Floats always carry a `.` or exponent
    /// so they read back as floats.
    pub fn to_log_string(&self) -> String {
        match self {
            Self::Int(v) => v.to_string(),
            Self::Float(v) => format!("{v:?}"),
            Self::Text(s) => s.clone(),
        }
    }

    /// Inverse of [`FieldValue::to_log_string`] for a value of `category`.
    pub fn from_log_str(category: Category, s: &str) -> Self {
        if category.is_textual() {
            return Self::Text(s.to_string());
        }
        let looks_float = s.contains(['.', 'e', 'E']) || s.contains("NaN") || s.contains("inf");
        if !looks_float {
            if let Ok(v) = s.parse::<i64>() {
                return Self::Int(v);
            }
        }
        match s.parse::<f64>() {
            Ok(v) => Self::Float(v),
            Err(_) => Self::Text(s.to_string()),
        }
    }

    pub fn is_finite(&self) -> bool {
        match self {
            Self::Float(v) => v.is_finite(),
            _ => true,
        }
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub category: Category,
    pub field_id: String,
    pub value: FieldValue,
    pub timestamp: DateTime<Utc>,
}

impl Point {
    pub fn new(
        category: Category,
        field_id: impl Into<String>,
        value: impl Into<FieldValue>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            category,
            field_id: field_id.into(),
            value: value.into(),
            timestamp,
        }
    }
}

/// Durably record one point.
pub trait TelemetrySink {
    fn record(&mut self, point: &Point) -> Result<(), SinkError>;
}

/// A sink on the other side of a network link.
pub trait RemoteSink: TelemetrySink {
    /// Cheap connectivity probe.
    fn is_reachable(&mut self) -> bool;

    /// Write points in one request where the backend allows it. Either all
    /// points are acknowledged or the call fails.
    fn write_batch(&mut self, points: &[Point]) -> Result<(), SinkError> {
        points.iter().try_for_each(|p| self.record(p))
    }
}

impl<T: TelemetrySink + ?Sized> TelemetrySink for Box<T> {
    fn record(&mut self, point: &Point) -> Result<(), SinkError> {
        (**self).record(point)
    }
}

impl<T: RemoteSink + ?Sized> RemoteSink for Box<T> {
    fn is_reachable(&mut self) -> bool {
        (**self).is_reachable()
    }

    fn write_batch(&mut self, points: &[Point]) -> Result<(), SinkError> {
        (**self).write_batch(points)
    }
}
