//! Collaborator boundaries for the field station.
//!
//! Everything the measurement core touches outside of pure computation goes
//! through one of these traits: the load cell, camera, vision pipeline,
//! display, buttons and the clock. Implementations live in `station_hardware`
//! (real and simulated) and in `station_core::mocks` (test doubles).
pub mod clock;

pub use clock::{Clock, ManualClock, SystemClock};

use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Source of raw load-cell counts.
///
/// A call must not block indefinitely. Any error is treated by the caller as
/// an invalid reading to discard and retry.
pub trait LoadCell {
    fn read_one(&mut self) -> Result<i32, BoxError>;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("camera command failed: {0}")]
    Command(String),
    #[error("camera produced no image at {0}")]
    Missing(PathBuf),
    #[error("camera io: {0}")]
    Io(String),
}

/// Still camera. `preview` captures go to a fixed scratch file.
pub trait Camera {
    fn capture(&mut self, wait: Duration, preview: bool) -> Result<PathBuf, CaptureError>;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VisionError {
    #[error("no segment found in the image; check that the plant is clearly visible")]
    NoSegmentsFound,
    #[error("vision pipeline failed: {0}")]
    Failed(String),
}

/// Image → plant length, treated as a pure function.
pub trait Vision {
    fn growth_length(
        &self,
        image: &Path,
        channel: &str,
        kernel_size: u32,
    ) -> Result<f64, VisionError>;
}

/// Colour of the status indicator drawn with every screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusColor {
    Green,
    Blue,
    Yellow,
    Red,
}

/// One frame for the display collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct Screen {
    pub color: StatusColor,
    pub lines: Vec<String>,
    pub image: Option<PathBuf>,
}

pub trait Display {
    fn show(&mut self, screen: &Screen) -> Result<(), BoxError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Left,
    Right,
}

/// Edge-triggered, debounced button input. Returns at most one press per poll.
pub trait Buttons {
    fn poll(&mut self) -> Result<Option<Button>, BoxError>;
}

impl<T: LoadCell + ?Sized> LoadCell for Box<T> {
    fn read_one(&mut self) -> Result<i32, BoxError> {
        (**self).read_one()
    }
}

impl<T: Camera + ?Sized> Camera for Box<T> {
    fn capture(&mut self, wait: Duration, preview: bool) -> Result<PathBuf, CaptureError> {
        (**self).capture(wait, preview)
    }
}

impl<T: Vision + ?Sized> Vision for Box<T> {
    fn growth_length(
        &self,
        image: &Path,
        channel: &str,
        kernel_size: u32,
    ) -> Result<f64, VisionError> {
        (**self).growth_length(image, channel, kernel_size)
    }
}

impl<T: Display + ?Sized> Display for Box<T> {
    fn show(&mut self, screen: &Screen) -> Result<(), BoxError> {
        (**self).show(screen)
    }
}

impl<T: Buttons + ?Sized> Buttons for Box<T> {
    fn poll(&mut self) -> Result<Option<Button>, BoxError> {
        (**self).poll()
    }
}
