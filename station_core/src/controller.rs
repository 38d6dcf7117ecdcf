//! Button-driven state machine of the station.
//!
//! Transitions (left / right button):
//! - Menu: left → ConfigMenu, right → Measuring (persists running)
//! - ConfigMenu: left → Calibration, right → Preview
//! - Preview, Calibration: right → Menu; in Calibration left confirms the reference weight
//! - Measuring: left → Status, right → Menu (persists stopped)
//! - Status: left → Menu (persists stopped), right → Measuring with the schedule kept
//!
//! Each `tick` drains executor events, polls one button press, runs the
//! handler for the current mode and renders the screen. A handler error is
//! recorded, sends the controller back to `Menu` (which resumes measuring if
//! the running flag is persisted) and counts toward a fail-stop threshold.

use crate::calibration::CalibrationState;
use crate::config::ControllerCfg;
use crate::error::{FatalError, StationError};
use crate::pipeline::{CycleOutcome, GROWTH_NO_PHOTO};
use crate::screens::{self, MeasuringView};
use crate::status::StationStatus;
use crate::telemetry::publisher::SharedClock;
use crate::util::to_chrono;
use crate::worker::{Executor, Job, JobKind, JobResult, WorkerEvent};
use chrono::{DateTime, Utc};
use station_config::ConfigStore;
use station_traits::{Button, Buttons, Display};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Menu,
    ConfigMenu,
    Preview,
    Calibration,
    Measuring,
    Status,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub mode: Mode,
    /// Message of the handler error raised during this tick, if any.
    pub error: Option<String>,
}

#[derive(Debug, Default, Clone, Copy)]
struct CalibrationView {
    tare: Option<f64>,
    raw: Option<f64>,
    grams: Option<f64>,
}

pub struct StationController<E, B, D, S> {
    executor: E,
    buttons: B,
    display: D,
    store: S,
    clock: SharedClock,
    cfg: ControllerCfg,
    mode: Mode,
    status: StationStatus,
    last_error: Option<(DateTime<Utc>, String)>,
    consecutive_errors: u32,
    calibration: CalibrationState,
    next_due: Option<DateTime<Utc>>,
    rounds: u64,
    last_weight_g: f64,
    last_growth: f64,
    connected: bool,
    in_flight: Option<JobKind>,
    queued: Option<Job>,
    progress: Option<String>,
    cal_view: CalibrationView,
    preview_image: Option<PathBuf>,
}

impl<E, B, D, S> StationController<E, B, D, S>
where
    E: Executor,
    B: Buttons,
    D: Display,
    S: ConfigStore,
{
    pub fn new(
        executor: E,
        buttons: B,
        display: D,
        store: S,
        clock: SharedClock,
        cfg: ControllerCfg,
    ) -> Self {
        let (tare, scale) = store.calibration();
        let mut c = Self {
            executor,
            buttons,
            display,
            store,
            clock,
            cfg,
            mode: Mode::Menu,
            status: StationStatus::Idle,
            last_error: None,
            consecutive_errors: 0,
            calibration: CalibrationState::new(tare, scale),
            next_due: None,
            rounds: 0,
            last_weight_g: 0.0,
            last_growth: 0.0,
            connected: false,
            in_flight: None,
            queued: None,
            progress: None,
            cal_view: CalibrationView::default(),
            preview_image: None,
        };
        if c.store.running() {
            tracing::info!("running flag set, resuming measurements");
            let now = c.clock.now();
            c.enter_measuring(now);
        }
        c
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn status(&self) -> &StationStatus {
        &self.status
    }

    pub fn last_error(&self) -> Option<&(DateTime<Utc>, String)> {
        self.last_error.as_ref()
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.next_due
    }

    pub fn rounds(&self) -> u64 {
        self.rounds
    }

    pub fn calibration(&self) -> CalibrationState {
        self.calibration
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn executor_mut(&mut self) -> &mut E {
        &mut self.executor
    }

    /// One control-loop iteration.
    pub fn tick(&mut self) -> Result<TickReport, FatalError> {
        match self.step() {
            Ok(()) => Ok(TickReport {
                mode: self.mode,
                error: None,
            }),
            Err(e) => self.fail(e),
        }
    }

    fn step(&mut self) -> Result<(), StationError> {
        let now = self.clock.now();

        let mut first_err = None;
        for ev in self.executor.poll()? {
            if let Err(e) = self.apply(ev) {
                first_err.get_or_insert(e);
            }
        }
        if let Some(e) = first_err {
            return Err(e);
        }
        self.dispatch_queued()?;

        let button = self
            .buttons
            .poll()
            .map_err(|e| StationError::Input(e.to_string()))?;
        if let Some(b) = button {
            tracing::debug!(button = ?b, mode = ?self.mode, "button pressed");
        }
        self.handle(button, now)?;
        self.dispatch_queued()?;
        self.render(now)
    }

    fn handle(&mut self, button: Option<Button>, now: DateTime<Utc>) -> Result<(), StationError> {
        match (self.mode, button) {
            (Mode::Menu, Some(Button::Right)) => {
                self.persist_running(true)?;
                self.next_due = None;
                self.enter_measuring(now);
            }
            (Mode::Menu, Some(Button::Left)) => self.mode = Mode::ConfigMenu,
            (Mode::Menu, None) if self.store.running() => self.enter_measuring(now),

            (Mode::ConfigMenu, Some(Button::Right)) => {
                self.mode = Mode::Preview;
                self.preview_image = None;
                self.request(Job::Preview)?;
            }
            (Mode::ConfigMenu, Some(Button::Left)) => {
                self.mode = Mode::Calibration;
                self.cal_view = CalibrationView::default();
                self.request(Job::Tare)?;
            }

            (Mode::Preview | Mode::Calibration, Some(Button::Right)) => {
                self.queued = None;
                self.mode = Mode::Menu;
            }
            (Mode::Calibration, Some(Button::Left)) => self.request(Job::ReadRaw)?,

            (Mode::Measuring, Some(Button::Right)) | (Mode::Status, Some(Button::Left)) => {
                self.persist_running(false)?;
                self.next_due = None;
                self.mode = Mode::Menu;
                tracing::info!("measurements stopped");
            }
            (Mode::Measuring, Some(Button::Left)) => self.mode = Mode::Status,
            (Mode::Measuring, None) => {
                let due = self.next_due.is_some_and(|d| now >= d);
                if due && self.in_flight.is_none() && self.queued.is_none() {
                    tracing::info!("measuring time reached, starting measurement");
                    self.set_status(StationStatus::Measuring);
                    self.progress = None;
                    self.request(Job::Measure {
                        calibration: self.calibration,
                    })?;
                }
            }
            (Mode::Status, Some(Button::Right)) => self.enter_measuring(now),

            _ => {}
        }
        Ok(())
    }

    /// Switch to Measuring, keeping an existing schedule.
    fn enter_measuring(&mut self, now: DateTime<Utc>) {
        self.mode = Mode::Measuring;
        if self.next_due.is_none() {
            let next = now + to_chrono(self.cfg.interval);
            tracing::debug!(next = %next, "first measurement scheduled");
            self.next_due = Some(next);
        }
    }

    fn persist_running(&mut self, running: bool) -> Result<(), StationError> {
        self.store
            .set_running(running)
            .map_err(|e| StationError::Config(e.to_string()))
    }

    fn persist_calibration(&mut self) -> Result<(), StationError> {
        self.store
            .save_calibration(self.calibration.tare, self.calibration.scale)
            .map_err(|e| StationError::Config(e.to_string()))
    }

    fn request(&mut self, job: Job) -> Result<(), StationError> {
        if self.in_flight.is_some() {
            self.queued = Some(job);
            return Ok(());
        }
        let kind = job.kind();
        self.executor.submit(job)?;
        self.in_flight = Some(kind);
        Ok(())
    }

    fn dispatch_queued(&mut self) -> Result<(), StationError> {
        if self.in_flight.is_none() {
            if let Some(job) = self.queued.take() {
                self.request(job)?;
            }
        }
        Ok(())
    }

    fn apply(&mut self, ev: WorkerEvent) -> Result<(), StationError> {
        let result = match ev {
            WorkerEvent::Stage(stage) => {
                self.progress = Some(stage.message);
                return Ok(());
            }
            WorkerEvent::Done(result) => result,
        };
        self.in_flight = None;
        self.progress = None;
        match result {
            JobResult::Measured(outcome) => {
                self.apply_outcome(&outcome);
                Ok(())
            }
            JobResult::Tared(res) if self.mode == Mode::Calibration => {
                let tare = res?;
                self.calibration.tare = tare;
                self.cal_view.tare = Some(tare);
                self.persist_calibration()
            }
            JobResult::Raw(res) if self.mode == Mode::Calibration => {
                let raw = res?;
                let scale = self
                    .calibration
                    .scale_from_reference(raw, self.cfg.reference_weight_g)
                    .ok_or_else(|| {
                        StationError::Calibration(format!(
                            "reading {raw:.0} equals the tare; place the reference weight and retry"
                        ))
                    })?;
                self.calibration.scale = scale;
                self.cal_view.raw = Some(raw);
                self.cal_view.grams = Some(self.calibration.to_grams(raw));
                tracing::info!(tare = self.calibration.tare, scale, "calibration updated");
                self.persist_calibration()
            }
            JobResult::Previewed(res) if self.mode == Mode::Preview => {
                self.preview_image = Some(res?);
                self.request(Job::Preview)
            }
            other => {
                tracing::debug!(result = ?other, mode = ?self.mode, "discarding stale job result");
                Ok(())
            }
        }
    }

    fn apply_outcome(&mut self, outcome: &CycleOutcome) {
        self.rounds += 1;
        self.last_growth = outcome.record.growth.unwrap_or(GROWTH_NO_PHOTO);
        self.last_weight_g = outcome.record.weight_grams;
        self.connected = outcome.connected;
        // next = completion + interval
        self.next_due = Some(outcome.finished_at + to_chrono(self.cfg.interval));
        if outcome.stage_errors.is_empty() {
            self.set_status(StationStatus::Idle);
        } else {
            let message = outcome
                .stage_errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            self.record_error(outcome.finished_at, message);
        }
        tracing::info!(
            round = self.rounds,
            weight_g = self.last_weight_g,
            growth = self.last_growth,
            sent = outcome.sent,
            buffered = outcome.buffered,
            "measurement applied"
        );
    }

    fn set_status(&mut self, status: StationStatus) {
        if !status.is_error() {
            self.consecutive_errors = 0;
        }
        self.status = status;
    }

    fn record_error(&mut self, at: DateTime<Utc>, message: String) {
        self.last_error = Some((at, message.clone()));
        self.status = StationStatus::Error { at, message };
    }

    fn fail(&mut self, e: StationError) -> Result<TickReport, FatalError> {
        let at = self.clock.now();
        let message = e.to_string();
        self.consecutive_errors += 1;
        tracing::error!(
            error = %message,
            consecutive = self.consecutive_errors,
            mode = ?self.mode,
            "station handler error"
        );
        self.record_error(at, message.clone());
        if self.consecutive_errors >= self.cfg.error_threshold {
            tracing::error!("too many consecutive errors, giving up");
            return Err(FatalError {
                consecutive: self.consecutive_errors,
                at,
                last: message,
            });
        }
        self.queued = None;
        self.mode = Mode::Menu;
        if self.store.running() {
            self.enter_measuring(at);
        }
        Ok(TickReport {
            mode: self.mode,
            error: Some(message),
        })
    }

    fn render(&mut self, now: DateTime<Utc>) -> Result<(), StationError> {
        let color = self.status.color(self.connected);
        let screen = match self.mode {
            Mode::Menu => screens::menu(color),
            Mode::ConfigMenu => screens::config_menu(color),
            Mode::Preview => screens::preview(color, self.preview_image.clone()),
            Mode::Calibration => screens::calibration(
                color,
                self.cal_view.tare,
                self.cal_view.raw,
                self.cal_view.grams,
            ),
            Mode::Measuring if self.in_flight == Some(JobKind::Measure) => {
                screens::collecting(color, self.progress.as_deref())
            }
            Mode::Measuring => screens::measuring(
                color,
                &MeasuringView {
                    now,
                    next: self.next_due,
                    weight_g: self.last_weight_g,
                    growth: self.last_growth,
                    rounds: self.rounds,
                },
            ),
            Mode::Status => {
                screens::status(color, &self.status, self.last_error.as_ref(), self.connected)
            }
        };
        self.display
            .show(&screen)
            .map_err(|e| StationError::Display(e.to_string()))
    }
}
