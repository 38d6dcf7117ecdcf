use std::time::Duration;
use tracing::trace;

use crate::error::{HwError, Result};
use crate::util::wait_until_low_with_timeout;

/// Raw codes the HX711 emits when the input is out of range.
const SATURATED_HIGH: i32 = 0x7F_FFFF;
const SATURATED_LOW: i32 = -0x80_0000;

pub struct Hx711 {
    dt: rppal::gpio::InputPin,
    sck: rppal::gpio::OutputPin,
    gain_pulses: u8, // 25, 26, 27 based on gain/channel
    ready_timeout: Duration,
}

impl Hx711 {
    pub fn open(dt_pin: u8, sck_pin: u8, ready_timeout: Duration) -> Result<Self> {
        let gpio = rppal::gpio::Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let dt = gpio
            .get(dt_pin)
            .map_err(|e| HwError::Gpio(format!("open hx711 dt pin {dt_pin}: {e}")))?
            .into_input();
        let mut sck = gpio
            .get(sck_pin)
            .map_err(|e| HwError::Gpio(format!("open hx711 sck pin {sck_pin}: {e}")))?
            .into_output();
        sck.set_low(); // clock idle low
        Ok(Self {
            dt,
            sck,
            gain_pulses: 25, // channel A, gain 128
            ready_timeout,
        })
    }

    /// One conversion. Never waits longer than the configured data-ready timeout.
    pub fn read(&mut self) -> Result<i32> {
        let dt = &self.dt;
        wait_until_low_with_timeout(
            || dt.is_high(),
            self.ready_timeout,
            Duration::from_micros(200),
        )?;

        // Clock out 24 bits
        let mut value: i32 = 0;
        for _ in 0..24 {
            self.sck.set_high();
            spin_delay_100ns();
            value = (value << 1) | i32::from(self.dt.is_high());
            self.sck.set_low();
            spin_delay_100ns();
        }

        // Remaining pulses select gain for the next conversion
        for _ in 24..self.gain_pulses {
            self.sck.set_high();
            spin_delay_100ns();
            self.sck.set_low();
            spin_delay_100ns();
        }

        // Sign extend 24-bit
        if (value & 0x80_0000) != 0 {
            value |= !0xFF_FFFF;
        }
        trace!(raw = value, "hx711 raw read");
        if value == SATURATED_HIGH || value == SATURATED_LOW {
            return Err(HwError::Saturated(value));
        }
        Ok(value)
    }
}

#[inline(always)]
fn spin_delay_100ns() {
    std::hint::spin_loop();
}
