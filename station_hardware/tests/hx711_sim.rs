#![cfg(feature = "hardware")]

use std::time::Duration;

use station_hardware::HardwareLoadCell;
use station_traits::LoadCell;

// These tests only make sense on a Raspberry Pi. With no HX711 wired to the
// pins, DT floats high and every read must time out quickly instead of hanging.

#[test]
fn hx711_unwired_read_times_out() {
    let dt_pin = 5u8; // adjust for your test rig
    let sck_pin = 6u8; // adjust for your test rig
    let mut cell =
        HardwareLoadCell::open(dt_pin, sck_pin, Duration::from_millis(5)).expect("open hx711");
    let err = cell.read_one().expect_err("expect timeout");
    let msg = format!("{err}");
    assert!(msg.to_lowercase().contains("timeout"));
}
