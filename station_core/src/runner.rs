//! Control loop driver.

use crate::config::RunnerCfg;
use crate::controller::StationController;
use crate::error::FatalError;
use crate::worker::Executor;
use station_config::ConfigStore;
use station_traits::{Buttons, Clock, Display};
use std::sync::atomic::{AtomicBool, Ordering};

/// Tick the controller until `shutdown` is set or it gives up.
///
/// Sleeps one tick between iterations, or the error backoff after a tick
/// that reported a handler error. Returns the number of ticks run.
pub fn run<E, B, D, S>(
    controller: &mut StationController<E, B, D, S>,
    cfg: RunnerCfg,
    clock: &dyn Clock,
    shutdown: &AtomicBool,
) -> Result<u64, FatalError>
where
    E: Executor,
    B: Buttons,
    D: Display,
    S: ConfigStore,
{
    let mut ticks = 0u64;
    tracing::info!(tick_ms = cfg.tick.as_millis() as u64, "control loop started");
    while !shutdown.load(Ordering::Relaxed) {
        let report = controller.tick()?;
        ticks += 1;
        if report.error.is_some() {
            clock.sleep(cfg.error_backoff);
        } else {
            clock.sleep(cfg.tick);
        }
    }
    tracing::info!(ticks, "control loop stopped");
    Ok(ticks)
}
