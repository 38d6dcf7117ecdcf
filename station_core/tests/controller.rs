use chrono::{DateTime, TimeZone, Utc};
use station_config::MemoryConfigStore;
use station_core::mocks::{
    MemoryRemote, RecordingDisplay, ScriptedButtons, SeqLoadCell, StubCamera, StubVision,
};
use station_core::runner;
use station_core::{
    ControllerCfg, Executor, Inline, LocalLog, MeasurementPipeline, Mode, PipelineCfg, ResilientPublisher,
    RunnerCfg, StationController, StationStatus, WeightFilter, Worker,
};
use station_traits::{Button, Clock, ManualClock};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};
use tempfile::{TempDir, tempdir};

type Pipeline = MeasurementPipeline<SeqLoadCell, StubCamera, StubVision, MemoryRemote>;
type Controller =
    StationController<Inline<Pipeline>, ScriptedButtons, RecordingDisplay, MemoryConfigStore>;

struct Rig {
    _dir: TempDir,
    clock: ManualClock,
    buttons: ScriptedButtons,
    display: RecordingDisplay,
    remote: MemoryRemote,
    controller: Controller,
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
}

struct Setup {
    cell: SeqLoadCell,
    capture_takes: Duration,
    store: MemoryConfigStore,
    interval: Duration,
}

impl Default for Setup {
    fn default() -> Self {
        Self {
            cell: SeqLoadCell::constant(1_000),
            capture_takes: Duration::ZERO,
            store: MemoryConfigStore::default(),
            interval: Duration::from_secs(60),
        }
    }
}

fn rig(setup: Setup) -> Rig {
    let dir = tempdir().unwrap();
    let clock = ManualClock::starting_at(t0());
    let shared = Arc::new(clock.clone());
    let remote = MemoryRemote::new(true);
    let log = LocalLog::open(&dir.path().join("pending"), &dir.path().join("archive")).unwrap();
    let publisher = ResilientPublisher::new(remote.clone(), log, shared.clone(), 50);
    let camera = StubCamera::new(dir.path()).taking(clock.clone(), setup.capture_takes);
    let filter = WeightFilter {
        max_attempts: 50,
        ..WeightFilter::default()
    };
    let pipeline = MeasurementPipeline::new(
        setup.cell,
        camera,
        StubVision::length(12.0),
        publisher,
        filter,
        PipelineCfg::default(),
        "S1",
        shared.clone(),
    );
    let buttons = ScriptedButtons::new();
    let display = RecordingDisplay::new();
    let cfg = ControllerCfg {
        interval: setup.interval,
        error_threshold: 10,
        reference_weight_g: 100.0,
    };
    let controller = StationController::new(
        Inline::new(pipeline),
        buttons.clone(),
        display.clone(),
        setup.store,
        shared,
        cfg,
    );
    Rig {
        _dir: dir,
        clock,
        buttons,
        display,
        remote,
        controller,
    }
}

impl Rig {
    fn press(&mut self, b: Button) -> Mode {
        self.buttons.press(b);
        self.controller.tick().unwrap().mode
    }

    fn idle(&mut self) -> Mode {
        self.controller.tick().unwrap().mode
    }
}

#[test]
fn starts_in_menu_and_shows_it() {
    let mut r = rig(Setup::default());
    assert_eq!(r.idle(), Mode::Menu);
    let screen = r.display.last().unwrap();
    assert_eq!(screen.lines, vec!["Menu", "<-- Config        Start -->"]);
}

#[test]
fn starting_measurements_persists_the_running_flag() {
    let mut r = rig(Setup::default());
    assert_eq!(r.press(Button::Right), Mode::Measuring);
    assert!(r.controller.store().running);
    assert_eq!(r.controller.store().writes, 1);
    assert_eq!(r.controller.next_due(), Some(t0() + chrono::Duration::seconds(60)));

    assert_eq!(r.press(Button::Right), Mode::Menu);
    assert!(!r.controller.store().running);
    assert_eq!(r.controller.next_due(), None);
}

#[test]
fn running_flag_resumes_measuring_on_start() {
    let r = rig(Setup {
        store: MemoryConfigStore::new(0.0, 1.0, true),
        ..Setup::default()
    });
    assert_eq!(r.controller.mode(), Mode::Measuring);
    assert_eq!(r.controller.store().writes, 0);
}

#[test]
fn next_measurement_counts_from_completion() {
    let mut r = rig(Setup {
        capture_takes: Duration::from_secs(20),
        store: MemoryConfigStore::new(0.0, 1.0, true),
        ..Setup::default()
    });
    let first_due = r.controller.next_due().unwrap();
    assert_eq!(first_due, t0() + chrono::Duration::seconds(60));

    r.clock.advance(Duration::from_secs(30));
    r.idle();
    assert_eq!(r.controller.rounds(), 0);

    r.clock.advance(Duration::from_secs(30));
    r.idle(); // submits and runs the cycle; the capture takes 20 s
    r.idle(); // applies the outcome
    assert_eq!(r.controller.rounds(), 1);
    let finished = t0() + chrono::Duration::seconds(80);
    assert_eq!(r.clock.now(), finished);
    assert_eq!(
        r.controller.next_due(),
        Some(finished + chrono::Duration::seconds(60))
    );
    assert_eq!(r.controller.status(), &StationStatus::Idle);
    assert_eq!(r.remote.written().len(), 5);
}

#[test]
fn status_view_returns_without_rescheduling() {
    let mut r = rig(Setup::default());
    r.press(Button::Right);
    let due = r.controller.next_due();
    r.clock.advance(Duration::from_secs(10));
    assert_eq!(r.press(Button::Left), Mode::Status);
    assert_eq!(r.press(Button::Right), Mode::Measuring);
    assert_eq!(r.controller.next_due(), due);
    assert!(r.controller.store().running);
}

#[test]
fn leaving_status_with_left_stops_measuring() {
    let mut r = rig(Setup::default());
    r.press(Button::Right);
    r.press(Button::Left);
    assert_eq!(r.press(Button::Left), Mode::Menu);
    assert!(!r.controller.store().running);
}

#[test]
fn calibration_tares_then_derives_scale() {
    let reads = std::iter::repeat_n(1_000, 20).chain(std::iter::repeat_n(1_200, 10));
    let mut r = rig(Setup {
        cell: SeqLoadCell::new(reads),
        ..Setup::default()
    });
    assert_eq!(r.press(Button::Left), Mode::ConfigMenu);
    assert_eq!(r.press(Button::Left), Mode::Calibration);
    r.idle();
    assert_eq!(r.controller.calibration().tare, 1_000.0);
    assert_eq!(r.controller.store().tare, 1_000.0);

    r.press(Button::Left);
    r.idle();
    let cal = r.controller.calibration();
    assert_eq!(cal.scale, 0.5);
    assert_eq!(r.controller.store().scale, 0.5);
    assert_eq!(r.controller.store().writes, 2);
    let lines = r.display.last().unwrap().lines;
    assert_eq!(lines[0], "Tare : 1000.00");
    assert_eq!(lines[1], "Raw val : 1200.00");
    assert_eq!(lines[2], "Weight : 100.00 g");

    assert_eq!(r.press(Button::Right), Mode::Menu);
}

#[test]
fn reference_reading_equal_to_tare_is_an_error() {
    let mut r = rig(Setup::default());
    r.press(Button::Left);
    r.press(Button::Left);
    r.idle();
    r.buttons.press(Button::Left);
    r.controller.tick().unwrap();
    let report = r.controller.tick().unwrap();
    assert_eq!(report.mode, Mode::Menu);
    assert!(report.error.unwrap().contains("equals the tare"));
    assert_eq!(r.controller.consecutive_errors(), 1);
    assert!(r.controller.status().is_error());
    // scale untouched
    assert_eq!(r.controller.calibration().scale, 1.0);
}

#[test]
fn preview_keeps_refreshing_until_back() {
    let mut r = rig(Setup::default());
    r.press(Button::Left);
    assert_eq!(r.press(Button::Right), Mode::Preview);
    r.idle();
    let screen = r.display.last().unwrap();
    assert!(screen.image.unwrap().ends_with("preview.jpg"));
    assert_eq!(screen.lines[0], "Preview");
    assert_eq!(r.press(Button::Right), Mode::Menu);
}

#[test]
fn ten_consecutive_errors_are_fatal() {
    let mut r = rig(Setup::default());
    r.display.fail_with(Some("spi write failed"));
    for n in 1..10 {
        let report = r.controller.tick().unwrap();
        assert!(report.error.is_some());
        assert_eq!(r.controller.consecutive_errors(), n);
    }
    let fatal = r.controller.tick().unwrap_err();
    assert_eq!(fatal.consecutive, 10);
    assert!(fatal.last.contains("spi write failed"));
}

#[test]
fn measuring_again_resets_the_error_count() {
    let mut r = rig(Setup {
        store: MemoryConfigStore::new(0.0, 1.0, true),
        ..Setup::default()
    });
    r.display.fail_with(Some("spi"));
    for _ in 0..3 {
        let report = r.controller.tick().unwrap();
        assert_eq!(report.mode, Mode::Measuring);
    }
    assert_eq!(r.controller.consecutive_errors(), 3);

    r.display.fail_with(None);
    r.clock.advance(Duration::from_secs(60));
    r.idle();
    assert_eq!(r.controller.consecutive_errors(), 0);
    assert_eq!(r.controller.status(), &StationStatus::Measuring);
    assert_eq!(r.display.last().unwrap().lines[0], "Collecting data...");
}

#[test]
fn failed_weight_marks_status_without_counting() {
    let mut r = rig(Setup {
        cell: SeqLoadCell::dead(),
        store: MemoryConfigStore::new(0.0, 1.0, true),
        ..Setup::default()
    });
    r.clock.advance(Duration::from_secs(60));
    r.idle();
    r.idle();
    assert_eq!(r.controller.rounds(), 1);
    assert!(r.controller.status().is_error());
    assert_eq!(r.controller.consecutive_errors(), 0);
    let (_, msg) = r.controller.last_error().unwrap();
    assert!(msg.contains("getting the weight"));
    assert_eq!(r.controller.mode(), Mode::Measuring);
}

#[test]
fn persistence_failure_counts_as_an_error() {
    let mut store = MemoryConfigStore::default();
    store.fail_writes = Some("read-only filesystem".into());
    let mut r = rig(Setup {
        store,
        ..Setup::default()
    });
    r.buttons.press(Button::Right);
    let report = r.controller.tick().unwrap();
    assert_eq!(report.mode, Mode::Menu);
    assert!(report.error.unwrap().contains("read-only filesystem"));
}

#[test]
fn runner_backs_off_after_errors_and_stops_on_fatal() {
    let mut r = rig(Setup::default());
    r.display.fail_with(Some("spi"));
    let shutdown = AtomicBool::new(false);
    let cfg = RunnerCfg {
        tick: Duration::from_millis(200),
        error_backoff: Duration::from_secs(5),
    };
    let fatal = runner::run(&mut r.controller, cfg, &r.clock, &shutdown).unwrap_err();
    assert_eq!(fatal.consecutive, 10);
    // nine backoffs before the tenth error
    assert_eq!(r.clock.now(), t0() + chrono::Duration::seconds(45));
}

#[test]
fn runner_stops_when_asked() {
    let mut r = rig(Setup::default());
    let shutdown = AtomicBool::new(true);
    let ticks = runner::run(&mut r.controller, RunnerCfg::default(), &r.clock, &shutdown).unwrap();
    assert_eq!(ticks, 0);
}

#[test]
fn stop_during_a_threaded_cycle_is_seen_at_once_and_the_cycle_still_lands() {
    let dir = tempdir().unwrap();
    let clock = ManualClock::starting_at(t0());
    let shared = Arc::new(clock.clone());
    let remote = MemoryRemote::new(true);
    let log = LocalLog::open(&dir.path().join("pending"), &dir.path().join("archive")).unwrap();
    let publisher = ResilientPublisher::new(remote.clone(), log, shared.clone(), 50);
    let (camera, gate) = StubCamera::new(dir.path()).gated();
    let pipeline = MeasurementPipeline::new(
        SeqLoadCell::constant(1_000),
        camera,
        StubVision::length(12.0),
        publisher,
        WeightFilter {
            max_attempts: 50,
            ..WeightFilter::default()
        },
        PipelineCfg::default(),
        "S1",
        shared.clone(),
    );
    let buttons = ScriptedButtons::new();
    let mut c = StationController::new(
        Worker::spawn(pipeline),
        buttons.clone(),
        RecordingDisplay::new(),
        MemoryConfigStore::default(),
        shared,
        ControllerCfg {
            interval: Duration::from_secs(60),
            error_threshold: 10,
            reference_weight_g: 100.0,
        },
    );

    buttons.press(Button::Right);
    assert_eq!(c.tick().unwrap().mode, Mode::Measuring);
    clock.advance(Duration::from_secs(60));
    assert_eq!(c.tick().unwrap().mode, Mode::Measuring);
    assert!(c.executor_mut().busy(), "cycle should be running on the worker");

    // The capture is held, so the cycle is still in flight.
    buttons.press(Button::Right);
    let report = c.tick().unwrap();
    assert_eq!(report.mode, Mode::Menu);
    assert!(report.error.is_none());
    assert!(!c.store().running);
    assert_eq!(c.rounds(), 0);

    gate.release();
    let deadline = Instant::now() + Duration::from_secs(5);
    while c.rounds() == 0 {
        assert!(Instant::now() < deadline, "cycle never completed");
        c.tick().unwrap();
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(c.rounds(), 1);
    assert_eq!(c.mode(), Mode::Menu);
    assert_eq!(c.status(), &StationStatus::Idle);
    assert_eq!(remote.written().len(), 5);
    assert!(!c.executor_mut().busy());
}
