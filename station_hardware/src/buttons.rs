//! Button inputs.
use crossbeam_channel as xch;
use station_traits::{BoxError, Button, Buttons};
use std::io::BufRead;

/// Reads `l` / `r` lines from stdin on a background thread. Used in
/// simulation runs where no GPIO is available.
pub struct KeyboardButtons {
    rx: xch::Receiver<Button>,
}

impl KeyboardButtons {
    pub fn spawn() -> Self {
        let (tx, rx) = xch::unbounded();
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                let button = match line.trim() {
                    "l" | "left" => Button::Left,
                    "r" | "right" => Button::Right,
                    "" => continue,
                    other => {
                        tracing::warn!(input = other, "unknown key; use 'l' or 'r'");
                        continue;
                    }
                };
                if tx.send(button).is_err() {
                    break;
                }
            }
            tracing::trace!("keyboard reader exiting");
        });
        Self { rx }
    }
}

impl Buttons for KeyboardButtons {
    fn poll(&mut self) -> Result<Option<Button>, BoxError> {
        match self.rx.try_recv() {
            Ok(b) => Ok(Some(b)),
            Err(xch::TryRecvError::Empty) => Ok(None),
            // stdin closed: behave as an idle panel
            Err(xch::TryRecvError::Disconnected) => Ok(None),
        }
    }
}

#[cfg(feature = "hardware")]
pub use gpio::GpioButtons;

#[cfg(feature = "hardware")]
mod gpio {
    use crate::error::HwError;
    use crate::util::EdgeDetector;
    use rppal::gpio::{Gpio, InputPin};
    use station_traits::{BoxError, Button, Buttons};
    use std::time::{Duration, Instant};

    /// Two active-low push buttons with internal pull-ups.
    pub struct GpioButtons {
        left: InputPin,
        right: InputPin,
        left_edge: EdgeDetector,
        right_edge: EdgeDetector,
    }

    impl GpioButtons {
        pub fn open(left_pin: u8, right_pin: u8, debounce: Duration) -> Result<Self, HwError> {
            let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
            let left = gpio
                .get(left_pin)
                .map_err(|e| HwError::Gpio(format!("open left button pin {left_pin}: {e}")))?
                .into_input_pullup();
            let right = gpio
                .get(right_pin)
                .map_err(|e| HwError::Gpio(format!("open right button pin {right_pin}: {e}")))?
                .into_input_pullup();
            Ok(Self {
                left,
                right,
                left_edge: EdgeDetector::new(debounce),
                right_edge: EdgeDetector::new(debounce),
            })
        }
    }

    impl Buttons for GpioButtons {
        fn poll(&mut self) -> Result<Option<Button>, BoxError> {
            let now = Instant::now();
            let left = self.left_edge.update(self.left.is_high(), now);
            let right = self.right_edge.update(self.right.is_high(), now);
            Ok(if left {
                Some(Button::Left)
            } else if right {
                Some(Button::Right)
            } else {
                None
            })
        }
    }
}
