use station_traits::{BoxError, Display, Screen};

/// Display stand-in that logs each distinct frame. Repeated identical frames
/// are suppressed so a 5 Hz control loop does not flood the log.
#[derive(Default)]
pub struct LogDisplay {
    last: Option<Screen>,
}

impl LogDisplay {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Display for LogDisplay {
    fn show(&mut self, screen: &Screen) -> Result<(), BoxError> {
        if self.last.as_ref() == Some(screen) {
            return Ok(());
        }
        tracing::info!(
            color = ?screen.color,
            image = ?screen.image,
            "screen: {}",
            screen.lines.join(" | ")
        );
        self.last = Some(screen.clone());
        Ok(())
    }
}
