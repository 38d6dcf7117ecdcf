//! Peripheral selection: simulated by default, GPIO and external programs
//! with the `hardware` feature.

use station_config::Config;
use station_core::builder::Peripherals;
use station_traits::{Buttons, Display};

pub type DynButtons = Box<dyn Buttons + Send>;
pub type DynDisplay = Box<dyn Display + Send>;

#[cfg(not(feature = "hardware"))]
pub fn open(cfg: &Config) -> eyre::Result<Peripherals> {
    use station_hardware::{SimulatedCamera, SimulatedLoadCell, SimulatedVision};
    tracing::info!("using simulated peripherals");
    Ok(Peripherals {
        load_cell: Box::new(SimulatedLoadCell::default()),
        camera: Box::new(SimulatedCamera::new(&cfg.paths.image_folder)),
        vision: Box::new(SimulatedVision::new(Some(128.0))),
    })
}

#[cfg(feature = "hardware")]
pub fn open(cfg: &Config) -> eyre::Result<Peripherals> {
    use eyre::WrapErr;
    use station_hardware::{CommandCamera, CommandVision, HardwareLoadCell};
    use std::time::Duration;

    let load_cell = HardwareLoadCell::open(
        cfg.pins.hx711_dt,
        cfg.pins.hx711_sck,
        Duration::from_millis(cfg.hardware.sensor_read_timeout_ms),
    )
    .wrap_err("open hx711")?;
    tracing::info!(
        dt = cfg.pins.hx711_dt,
        sck = cfg.pins.hx711_sck,
        "hx711 load cell ready"
    );
    Ok(Peripherals {
        load_cell: Box::new(load_cell),
        camera: Box::new(CommandCamera::new(
            cfg.hardware.camera_program.clone(),
            cfg.paths.image_folder.clone(),
        )),
        vision: Box::new(CommandVision::new(cfg.hardware.vision_program.clone())),
    })
}

#[cfg(not(feature = "hardware"))]
pub fn open_panel(_cfg: &Config) -> eyre::Result<(DynButtons, DynDisplay)> {
    tracing::info!("buttons: type 'l' or 'r' and press enter");
    Ok((
        Box::new(station_hardware::KeyboardButtons::spawn()),
        Box::new(station_hardware::LogDisplay::new()),
    ))
}

#[cfg(feature = "hardware")]
pub fn open_panel(cfg: &Config) -> eyre::Result<(DynButtons, DynDisplay)> {
    use eyre::WrapErr;
    let buttons = station_hardware::GpioButtons::open(
        cfg.pins.button_left,
        cfg.pins.button_right,
        std::time::Duration::from_millis(cfg.controller.debounce_ms),
    )
    .wrap_err("open button pins")?;
    Ok((
        Box::new(buttons),
        Box::new(station_hardware::LogDisplay::new()),
    ))
}
