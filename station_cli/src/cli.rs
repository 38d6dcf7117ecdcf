//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "station", version, about = "Field station: growth and weight measurements")]
pub struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE", default_value = "etc/station.toml")]
    pub config: PathBuf,

    /// Log as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); overrides [logging].level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the button-driven station until ctrl-c or too many errors
    Run,
    /// Run one measurement cycle now and print a summary
    Measure,
    /// Send buffered values to InfluxDB
    Resync,
    /// Print the filtered zero-load reading (raw counts)
    Tare {
        /// Valid samples to collect (defaults to [calibration].samples)
        #[arg(long)]
        samples: Option<usize>,
    },
    /// Validate the config, read the load cell once and probe InfluxDB
    SelfCheck,
}
