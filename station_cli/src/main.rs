mod cli;
mod commands;
mod error_fmt;
mod logging;
mod peripherals;

use clap::Parser;
use cli::{Cli, Commands, JSON_MODE};
use error_fmt::{ConfigError, exit_code_for_error, format_error_json, humanize};
use station_config::TomlConfigStore;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

fn main() {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(err) = run(cli) {
        let code = exit_code_for_error(&err);
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        tracing::error!(error = %format!("{err:#}"), code, "exiting with error");
        std::process::exit(code);
    }
}

fn run(cli: Cli) -> eyre::Result<()> {
    let store = TomlConfigStore::open(&cli.config).map_err(|e| ConfigError {
        path: cli.config.clone(),
        message: format!("{e:#}"),
    })?;
    let cfg = store.config().clone();
    logging::init(cli.json, cli.log_level.as_deref(), &cfg.logging)?;
    tracing::debug!(config = %cli.config.display(), command = ?cli.cmd, "starting");

    match cli.cmd {
        Commands::Run => {
            let shutdown = Arc::new(AtomicBool::new(false));
            let flag = shutdown.clone();
            ctrlc::set_handler(move || {
                tracing::info!("shutdown requested");
                flag.store(true, Ordering::Relaxed);
            })
            .map_err(|e| eyre::eyre!("install ctrl-c handler: {e}"))?;
            commands::run(store, &shutdown)
        }
        Commands::Measure => commands::measure(&cfg, cli.json),
        Commands::Resync => commands::resync(&cfg, cli.json),
        Commands::Tare { samples } => commands::tare(&cfg, samples, cli.json),
        Commands::SelfCheck => commands::self_check(&cfg, cli.json),
    }
}
