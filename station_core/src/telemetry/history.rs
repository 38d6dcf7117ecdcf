//! Local per-cycle measurement history.
//!
//! Every cycle appends one row to `measurements.csv`, whether or not the
//! remote sink was reachable. Unlike the pending log this file is never
//! replayed or archived; it is the station's own record for offline plots.

use crate::error::SinkError;
use crate::pipeline::{MeasurementRecord, GROWTH_NO_PHOTO};
use chrono::SecondsFormat;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

pub const HEADER: [&str; 7] = [
    "time",
    "station",
    "growth",
    "weight",
    "weight_g",
    "standard_deviation",
    "error_message",
];

#[derive(Debug, Clone)]
pub struct MeasurementHistory {
    path: PathBuf,
}

impl MeasurementHistory {
    /// Create the parent folder if needed. The file itself is created, with
    /// its header, on the first append.
    pub fn open(path: &Path) -> Result<Self, SinkError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| SinkError::Io(format!("create {}: {e}", parent.display())))?;
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row. `errors` ends up joined in the last column.
    pub fn append(&mut self, record: &MeasurementRecord, errors: &[String]) -> Result<(), SinkError> {
        let io = |what: &str, e: &dyn std::fmt::Display| {
            SinkError::Io(format!("{what} {}: {e}", self.path.display()))
        };
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| io("open", &e))?;
        let fresh = file.metadata().map_err(|e| io("stat", &e))?.len() == 0;
        {
            let mut w = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(&file);
            if fresh {
                w.write_record(HEADER).map_err(|e| io("write header", &e))?;
            }
            w.write_record([
                record.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
                record.station_id.clone(),
                record.growth.unwrap_or(GROWTH_NO_PHOTO).to_string(),
                record.weight_raw.to_string(),
                record.weight_grams.to_string(),
                record.weight_stddev.to_string(),
                errors.join("; "),
            ])
            .map_err(|e| io("append", &e))?;
            w.flush().map_err(|e| io("flush", &e))?;
        }
        file.sync_data().map_err(|e| io("sync", &e))?;
        tracing::debug!(path = %self.path.display(), "measurement row appended");
        Ok(())
    }
}
