use std::time::{Duration, Instant};

use crate::error::{HwError, Result};

/// Wait until the provided `is_high` predicate becomes false (i.e., line goes low),
/// or a timeout expires. Sleeps in small intervals to avoid CPU spinning.
pub fn wait_until_low_with_timeout(
    mut is_high: impl FnMut() -> bool,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    while is_high() {
        if Instant::now() >= deadline {
            return Err(HwError::DataReadyTimeout);
        }
        std::thread::sleep(poll_interval);
    }
    Ok(())
}

/// Falling-edge detector with a minimum gap between accepted edges.
///
/// Buttons are wired active-low with pull-ups, so a press is a high→low
/// transition. Presses closer than `debounce` to the last accepted one are
/// dropped.
#[derive(Debug)]
pub struct EdgeDetector {
    last_high: bool,
    last_edge: Option<Instant>,
    debounce: Duration,
}

impl EdgeDetector {
    pub fn new(debounce: Duration) -> Self {
        Self {
            last_high: true,
            last_edge: None,
            debounce,
        }
    }

    /// Feed the current line level; returns true on an accepted press.
    pub fn update(&mut self, is_high: bool, now: Instant) -> bool {
        let falling = self.last_high && !is_high;
        self.last_high = is_high;
        if !falling {
            return false;
        }
        if let Some(prev) = self.last_edge
            && now.saturating_duration_since(prev) < self.debounce
        {
            return false;
        }
        self.last_edge = Some(now);
        true
    }
}
