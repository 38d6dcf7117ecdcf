//! Tracing subscriber setup: console layer plus an optional file layer.

use crate::cli::FILE_GUARD;
use station_config::Logging;
use std::path::Path;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// `RUST_LOG` wins over `--log-level`, which wins over `[logging].level`.
pub fn init(json: bool, level: Option<&str>, logging: &Logging) -> eyre::Result<()> {
    let level = level.or(logging.level.as_deref()).unwrap_or("info");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let console = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed()
    };

    let file = match &logging.file {
        Some(path) => {
            let (writer, guard) = tracing_appender::non_blocking(file_appender(
                Path::new(path),
                logging.rotation.as_deref(),
            )?);
            let _ = FILE_GUARD.set(guard);
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| eyre::eyre!("failed to initialize tracing subscriber: {e}"))
}

fn file_appender(
    path: &Path,
    rotation: Option<&str>,
) -> eyre::Result<tracing_appender::rolling::RollingFileAppender> {
    use tracing_appender::rolling;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .ok_or_else(|| eyre::eyre!("logging.file has no file name: {}", path.display()))?;
    std::fs::create_dir_all(dir)
        .map_err(|e| eyre::eyre!("create log directory {}: {e}", dir.display()))?;
    Ok(match rotation.unwrap_or("never") {
        "daily" => rolling::daily(dir, name),
        "hourly" => rolling::hourly(dir, name),
        "never" => rolling::never(dir, name),
        other => eyre::bail!("logging.rotation must be never, daily or hourly (got {other:?})"),
    })
}
