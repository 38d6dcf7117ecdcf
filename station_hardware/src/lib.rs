//! Peripheral adapters for the station: load cell, camera, vision, display
//! and buttons. Real GPIO-backed types are behind the `hardware` feature;
//! everything else runs anywhere.
pub mod buttons;
pub mod camera;
pub mod display;
pub mod error;
#[cfg(feature = "hardware")]
pub mod hx711;
pub mod util;
pub mod vision;

pub use buttons::KeyboardButtons;
#[cfg(feature = "hardware")]
pub use buttons::GpioButtons;
pub use camera::{CommandCamera, SimulatedCamera};
pub use display::LogDisplay;
pub use vision::{CommandVision, SimulatedVision};

use error::HwError;
use station_traits::{BoxError, LoadCell};

/// Simulated load cell: a steady base count with a small deterministic
/// ripple, an occasional not-ready read and an occasional spike.
pub struct SimulatedLoadCell {
    base: i32,
    tick: u32,
    not_ready_every: u32,
    spike_every: u32,
}

impl SimulatedLoadCell {
    pub fn new(base: i32) -> Self {
        Self {
            base,
            tick: 0,
            not_ready_every: 7,
            spike_every: 13,
        }
    }

    /// Disable not-ready reads and spikes.
    pub fn quiet(mut self) -> Self {
        self.not_ready_every = 0;
        self.spike_every = 0;
        self
    }

    /// Shift the base reading, e.g. to put a reference weight on the simulated platform.
    pub fn set_base(&mut self, base: i32) {
        self.base = base;
    }
}

impl Default for SimulatedLoadCell {
    fn default() -> Self {
        Self::new(842_913)
    }
}

impl LoadCell for SimulatedLoadCell {
    fn read_one(&mut self) -> Result<i32, BoxError> {
        self.tick = self.tick.wrapping_add(1);
        if self.not_ready_every > 0 && self.tick % self.not_ready_every == 0 {
            return Err(Box::new(HwError::NotReady));
        }
        let ripple = ((self.tick as f32 * 37.0).sin() * 40.0) as i32;
        let spike = if self.spike_every > 0 && self.tick % self.spike_every == 0 {
            25_000
        } else {
            0
        };
        let raw = self.base + ripple + spike;
        tracing::trace!(raw, "simulated load cell sample");
        Ok(raw)
    }
}

#[cfg(feature = "hardware")]
pub struct HardwareLoadCell {
    hx711: hx711::Hx711,
}

#[cfg(feature = "hardware")]
impl HardwareLoadCell {
    pub fn open(
        dt_pin: u8,
        sck_pin: u8,
        ready_timeout: std::time::Duration,
    ) -> Result<Self, HwError> {
        let hx711 = hx711::Hx711::open(dt_pin, sck_pin, ready_timeout)?;
        Ok(Self { hx711 })
    }
}

#[cfg(feature = "hardware")]
impl LoadCell for HardwareLoadCell {
    fn read_one(&mut self) -> Result<i32, BoxError> {
        match self.hx711.read() {
            Ok(raw) => {
                tracing::debug!(raw, "hx711 sample");
                Ok(raw)
            }
            Err(e) => {
                tracing::debug!(error = %e, "hx711 invalid read");
                Err(Box::new(e))
            }
        }
    }
}
