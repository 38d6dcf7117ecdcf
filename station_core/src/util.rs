//! Time formatting helpers shared by the log, the camera names and the screens.

use chrono::{DateTime, Utc};

/// File-name-safe timestamp (no `:`).
pub const FILE_STAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%SZ";
/// Timestamp shown on screens and in error records.
pub const DISPLAY_FORMAT: &str = "%Y/%m/%d %H:%M:%S";
pub const TIME_OF_DAY_FORMAT: &str = "%H:%M:%S";

pub fn display_time(t: DateTime<Utc>) -> String {
    t.format(DISPLAY_FORMAT).to_string()
}

pub fn time_of_day(t: DateTime<Utc>) -> String {
    t.format(TIME_OF_DAY_FORMAT).to_string()
}

/// Convert a std duration to chrono, saturating on overflow.
pub fn to_chrono(d: std::time::Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::MAX)
}
