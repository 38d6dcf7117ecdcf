//! Command handlers. Each returns `eyre::Result` and prints its own summary.

use crate::peripherals;
use serde_json::json;
use station_config::{Config, TomlConfigStore};
use station_core::builder::{self, DynPipeline};
use station_core::runner;
use station_core::{
    CalibrationState, ControllerCfg, CycleOutcome, InfluxSink, InfluxTarget, RemoteSink,
    RunnerCfg, SharedClock, SinkError, StationController, Worker,
};
use station_traits::{Clock, SystemClock};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

fn system_clock() -> SharedClock {
    Arc::new(SystemClock::new())
}

fn pipeline(cfg: &Config, clock: SharedClock) -> eyre::Result<DynPipeline> {
    Ok(builder::build_pipeline(cfg, peripherals::open(cfg)?, clock)?)
}

/// Control loop until `shutdown` is set. A fatal error propagates as
/// `station_core::FatalError`.
pub fn run(store: TomlConfigStore, shutdown: &AtomicBool) -> eyre::Result<()> {
    let cfg = store.config().clone();
    let clock = system_clock();
    let worker = Worker::spawn(pipeline(&cfg, clock.clone())?);
    let (buttons, display) = peripherals::open_panel(&cfg)?;
    tracing::info!(
        station = %cfg.station.id,
        interval_s = cfg.station.interval_s,
        running = cfg.station.running,
        "station starting"
    );
    let mut controller = StationController::new(
        worker,
        buttons,
        display,
        store,
        clock.clone(),
        ControllerCfg::from(&cfg),
    );
    let ticks = runner::run(
        &mut controller,
        RunnerCfg::from(&cfg.controller),
        &*clock,
        shutdown,
    )?;
    tracing::info!(ticks, rounds = controller.rounds(), "station stopped");
    Ok(())
}

pub fn measure(cfg: &Config, json: bool) -> eyre::Result<()> {
    let mut p = pipeline(cfg, system_clock())?;
    let cal = CalibrationState::from(&cfg.calibration);
    let outcome = p.run_cycle(&cal, &mut |ev| {
        tracing::info!(stage = ?ev.stage, "{}", ev.message);
    });
    print_outcome(&outcome, json);
    Ok(())
}

fn print_outcome(o: &CycleOutcome, json: bool) {
    let errors: Vec<String> = o.stage_errors.iter().map(ToString::to_string).collect();
    if json {
        let obj = json!({
            "timestamp": o.record.timestamp.to_rfc3339(),
            "station": o.record.station_id,
            "growth": o.record.growth,
            "weight": (!o.weight_failed()).then_some(o.record.weight_raw),
            "weight_g": (!o.weight_failed()).then_some(o.record.weight_grams),
            "standard_deviation": (!o.weight_failed()).then_some(o.record.weight_stddev),
            "sent": o.sent,
            "buffered": o.buffered,
            "connected": o.connected,
            "errors": errors,
        });
        println!("{obj}");
        return;
    }
    match o.record.growth {
        Some(g) => println!("Growth: {g:.2}"),
        None => println!("Growth: no photo"),
    }
    if o.weight_failed() {
        println!("Weight: failed");
    } else {
        println!(
            "Weight: {:.2} g (tared {:.0}, stddev {:.1})",
            o.record.weight_grams, o.record.weight_raw, o.record.weight_stddev
        );
    }
    println!("Sent {} values, buffered {}", o.sent, o.buffered);
    for e in &errors {
        println!("Error: {e}");
    }
    println!("Measurement complete.");
}

pub fn resync(cfg: &Config, json: bool) -> eyre::Result<()> {
    let mut publisher = builder::open_publisher(cfg, system_clock())?;
    let before = publisher.pending_count();
    match publisher.resync() {
        Ok(n) => {
            if json {
                println!("{}", json!({ "replayed": n, "pending": publisher.pending_count() }));
            } else {
                println!("Replayed {n} buffered values.");
            }
            Ok(())
        }
        Err(SinkError::Unreachable) => {
            eyre::bail!("InfluxDB unreachable at {}; {before} values still pending", cfg.influxdb.url)
        }
        Err(e) => Err(eyre::Report::new(e).wrap_err(format!(
            "resync interrupted; {} values still pending",
            publisher.pending_count()
        ))),
    }
}

pub fn tare(cfg: &Config, samples: Option<usize>, json: bool) -> eyre::Result<()> {
    let mut cell = peripherals::open(cfg)?.load_cell;
    let filter = station_core::WeightFilter::from(&cfg.weight)
        .with_samples(samples.unwrap_or(cfg.calibration.samples));
    let s = filter.acquire(&mut cell)?;
    if json {
        println!(
            "{}",
            json!({ "tare": s.center, "stddev": s.stddev, "kept": s.kept, "total": s.total })
        );
    } else {
        println!("Tare: {:.1} (stddev {:.1}, {} samples)", s.center, s.stddev, s.kept);
    }
    Ok(())
}

pub fn self_check(cfg: &Config, json: bool) -> eyre::Result<()> {
    let mut cell = peripherals::open(cfg)?.load_cell;
    let raw = station_core::WeightFilter::from(&cfg.weight)
        .with_samples(1)
        .acquire(&mut cell)?
        .center;
    // Probe only: the local log may be locked by a running station.
    let reachable = InfluxSink::new(&InfluxTarget::from(cfg))?.is_reachable();
    let now = SystemClock::new().now();
    if json {
        println!(
            "{}",
            json!({
                "ok": true,
                "checked_at": now.to_rfc3339(),
                "load_cell_raw": raw,
                "influxdb_reachable": reachable,
            })
        );
    } else {
        println!("Config: ok");
        println!("Load cell: ok (raw {raw:.0})");
        if reachable {
            println!("InfluxDB: reachable");
        } else {
            println!("InfluxDB: unreachable (values will be buffered locally)");
        }
        println!("Self-check complete.");
    }
    Ok(())
}
