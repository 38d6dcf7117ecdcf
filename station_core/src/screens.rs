//! Screen builders for each controller view.

use crate::status::StationStatus;
use crate::util::{display_time, time_of_day};
use chrono::{DateTime, Utc};
use station_traits::{Screen, StatusColor};
use std::path::PathBuf;

fn screen(color: StatusColor, lines: Vec<String>) -> Screen {
    Screen {
        color,
        lines,
        image: None,
    }
}

pub fn menu(color: StatusColor) -> Screen {
    screen(
        color,
        vec!["Menu".into(), "<-- Config        Start -->".into()],
    )
}

pub fn config_menu(color: StatusColor) -> Screen {
    screen(
        color,
        vec![
            "Configuration".into(),
            "<-- Calib           Prev -->".into(),
        ],
    )
}

pub fn preview(color: StatusColor, image: Option<PathBuf>) -> Screen {
    let mut s = screen(
        color,
        vec![
            if image.is_some() {
                "Preview".into()
            } else {
                "Preview: capturing...".into()
            },
            "Back -->".into(),
        ],
    );
    s.image = image;
    s
}

/// Calibration readout. `raw` and `grams` appear once the reference weight was read.
pub fn calibration(
    color: StatusColor,
    tare: Option<f64>,
    raw: Option<f64>,
    grams: Option<f64>,
) -> Screen {
    let fmt = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"));
    let tare_line = match tare {
        Some(t) => format!("Tare : {t:.2}"),
        None => "Tare : measuring...".to_string(),
    };
    screen(
        color,
        vec![
            tare_line,
            format!("Raw val : {}", fmt(raw)),
            format!("Weight : {} g", fmt(grams)),
            "<-- Get Calib    Back -->".into(),
        ],
    )
}

pub struct MeasuringView {
    pub now: DateTime<Utc>,
    pub next: Option<DateTime<Utc>>,
    pub weight_g: f64,
    pub growth: f64,
    pub rounds: u64,
}

pub fn measuring(color: StatusColor, v: &MeasuringView) -> Screen {
    screen(
        color,
        vec![
            display_time(v.now),
            format!(
                "Next : {}",
                v.next.map_or_else(|| "-".to_string(), time_of_day)
            ),
            format!("Weight : {:.2}", v.weight_g),
            format!("Growth : {:.2}", v.growth),
            format!("Measurement n°{}", v.rounds),
            "Stop -->".into(),
        ],
    )
}

pub fn collecting(color: StatusColor, progress: Option<&str>) -> Screen {
    let mut lines = vec!["Collecting data...".to_string()];
    if let Some(p) = progress.filter(|p| !p.is_empty()) {
        lines.push(p.to_string());
    }
    screen(color, lines)
}

pub fn status(
    color: StatusColor,
    status: &StationStatus,
    last_error: Option<&(DateTime<Utc>, String)>,
    connected: bool,
) -> Screen {
    let state = match status {
        StationStatus::Idle => "Idle",
        StationStatus::Measuring => "Measuring",
        StationStatus::Error { .. } => "Error",
    };
    let mut lines = vec![
        format!("Status : {state}"),
        format!("DB : {}", if connected { "connected" } else { "offline" }),
    ];
    match last_error {
        Some((at, msg)) => {
            lines.push(format!("Last error : {}", display_time(*at)));
            lines.push(msg.clone());
        }
        None => lines.push("No error".into()),
    }
    lines.push("<-- Stop      Resume -->".into());
    screen(color, lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn status_view_shows_last_error_even_when_idle() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let err = (at, "display: spi".to_string());
        let s = status(StatusColor::Green, &StationStatus::Idle, Some(&err), true);
        assert!(s.lines.contains(&"Last error : 2024/05/01 10:00:00".to_string()));
        assert!(s.lines.contains(&"display: spi".to_string()));
    }

    #[test]
    fn measuring_view_formats_values() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let v = MeasuringView {
            now,
            next: Some(now + chrono::Duration::minutes(30)),
            weight_g: 12.346,
            growth: 3.0,
            rounds: 4,
        };
        let s = measuring(StatusColor::Green, &v);
        assert_eq!(s.lines[1], "Next : 10:30:00");
        assert_eq!(s.lines[2], "Weight : 12.35");
        assert_eq!(s.lines[4], "Measurement n°4");
    }
}
