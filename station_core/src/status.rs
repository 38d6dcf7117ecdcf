//! Station status and its display colour.

use chrono::{DateTime, Utc};
use station_traits::StatusColor;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StationStatus {
    #[default]
    Idle,
    Measuring,
    Error { at: DateTime<Utc>, message: String },
}

impl StationStatus {
    /// Indicator colour: green when idle and the sink answered the last probe,
    /// blue when idle and offline, yellow while measuring, red on error.
    pub fn color(&self, connected: bool) -> StatusColor {
        match self {
            Self::Idle if connected => StatusColor::Green,
            Self::Idle => StatusColor::Blue,
            Self::Measuring => StatusColor::Yellow,
            Self::Error { .. } => StatusColor::Red,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(StationStatus::Idle, true, StatusColor::Green)]
    #[case(StationStatus::Idle, false, StatusColor::Blue)]
    #[case(StationStatus::Measuring, true, StatusColor::Yellow)]
    #[case(StationStatus::Measuring, false, StatusColor::Yellow)]
    #[case(StationStatus::Error { at: Utc::now(), message: "x".into() }, true, StatusColor::Red)]
    fn colour_follows_status(
        #[case] status: StationStatus,
        #[case] connected: bool,
        #[case] expected: StatusColor,
    ) {
        assert_eq!(status.color(connected), expected);
    }
}
