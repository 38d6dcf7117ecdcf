//! Human-readable error descriptions, exit codes and structured JSON errors.

use station_core::{AcquisitionError, FatalError, SinkError};
use std::path::PathBuf;

/// The config file could not be read, parsed or validated.
#[derive(Debug, thiserror::Error)]
#[error("config {}: {message}", .path.display())]
pub struct ConfigError {
    pub path: PathBuf,
    pub message: String,
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(ce) = err.downcast_ref::<ConfigError>() {
        return format!(
            "What happened: Invalid configuration ({}).\nLikely causes: Missing file, TOML syntax error or an out-of-range value.\nHow to fix: Edit {} (see etc/station.toml for a complete sample), then rerun.",
            ce.message,
            ce.path.display()
        );
    }

    if let Some(fe) = err.downcast_ref::<FatalError>() {
        return format!(
            "What happened: The station stopped after {} consecutive errors (last: {}).\nLikely causes: A peripheral failing on every control-loop iteration (display, buttons, config file not writable).\nHow to fix: Check the logs around {} and the wiring of the failing device, then restart.",
            fe.consecutive,
            fe.last,
            fe.at.format("%Y-%m-%dT%H:%M:%SZ")
        );
    }

    if let Some(ae) = err.downcast_ref::<AcquisitionError>() {
        return match ae {
            AcquisitionError::NoData { attempts } => format!(
                "What happened: No valid load-cell reading after {attempts} attempts.\nLikely causes: HX711 not wired correctly, no power/ground, or data-ready timeout too low.\nHow to fix: Verify [pins] hx711_dt/hx711_sck and power, and consider raising hardware.sensor_read_timeout_ms."
            ),
            AcquisitionError::EmptyAfterFilter => "What happened: Every load-cell sample was rejected as an outlier.\nLikely causes: A very noisy or unstable platform.\nHow to fix: Steady the platform or switch [weight].strategy to median.".to_string(),
        };
    }

    if let Some(se) = err.downcast_ref::<SinkError>() {
        return match se {
            SinkError::Io(msg) if msg.contains("in use by another process") => format!(
                "What happened: The pending log is locked ({msg}).\nLikely causes: Another station process is running on the same data folder.\nHow to fix: Stop the other process or point [paths] at a different folder."
            ),
            SinkError::Io(msg) => format!(
                "What happened: Local log I/O failed ({msg}).\nLikely causes: Disk full, read-only filesystem or missing permissions.\nHow to fix: Check the [paths] folders and free space."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: InfluxDB down, wrong url/token/org/bucket, or no network.\nHow to fix: Check [influxdb] in the config; buffered values are replayed automatically once it is reachable."
            ),
        };
    }

    // String-based heuristics for errors coming from init
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("influxdb unreachable") {
        return format!(
            "What happened: {msg}.\nLikely causes: InfluxDB down or no network.\nHow to fix: Retry later; nothing was lost."
        );
    }

    if lower.contains("open hx711") || lower.contains("open button pins") {
        return "What happened: Failed to initialize hardware pins.\nLikely causes: Incorrect pin numbers or insufficient GPIO permissions.\nHow to fix: Fix the [pins] values in the config; ensure the process has permission to access GPIO.".to_string();
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: fatal = 3, config = 2, anything else = 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<FatalError>().is_some() {
        return 3;
    }
    if err.downcast_ref::<ConfigError>().is_some() {
        return 2;
    }
    1
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<FatalError>().is_some() {
        "Fatal"
    } else if err.downcast_ref::<ConfigError>().is_some() {
        "Config"
    } else if err.downcast_ref::<AcquisitionError>().is_some() {
        "Acquisition"
    } else if err.downcast_ref::<SinkError>().is_some() {
        "Sink"
    } else {
        "Error"
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    if let Some(fe) = err.downcast_ref::<FatalError>() {
        return json!({
            "reason": "Fatal",
            "details": {
                "consecutive": fe.consecutive,
                "at": fe.at.to_rfc3339(),
                "last": fe.last,
            },
            "message": humanize(err),
        })
        .to_string();
    }
    json!({ "reason": reason_name(err), "message": humanize(err) }).to_string()
}
