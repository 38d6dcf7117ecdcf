//! Executor seam between the controller and the measurement pipeline.
//!
//! `Inline` runs a job synchronously on the caller's thread. `Worker` owns the
//! pipeline (load cell, camera, vision, publisher) on a dedicated thread so the
//! control loop keeps polling buttons during a long cycle. Calibration travels
//! by value inside each job.
//!
//! Each `Worker` spawns exactly one thread, shut down and joined on drop. A job
//! in progress is always finished first.

use crate::calibration::CalibrationState;
use crate::error::{AcquisitionError, StationError};
use crate::pipeline::{CycleOutcome, MeasurementPipeline, StageEvent};
use crate::telemetry::RemoteSink;
use crossbeam_channel as xch;
use station_traits::{Camera, CaptureError, LoadCell, Vision};
use std::collections::VecDeque;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub enum Job {
    Measure { calibration: CalibrationState },
    Tare,
    ReadRaw,
    Preview,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Measure,
    Tare,
    ReadRaw,
    Preview,
}

impl Job {
    pub fn kind(&self) -> JobKind {
        match self {
            Self::Measure { .. } => JobKind::Measure,
            Self::Tare => JobKind::Tare,
            Self::ReadRaw => JobKind::ReadRaw,
            Self::Preview => JobKind::Preview,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobResult {
    Measured(Box<CycleOutcome>),
    Tared(Result<f64, AcquisitionError>),
    Raw(Result<f64, AcquisitionError>),
    Previewed(Result<PathBuf, CaptureError>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    Stage(StageEvent),
    Done(JobResult),
}

/// Something that can carry out a job.
pub trait JobHandler {
    fn handle(&mut self, job: Job, emit: &mut dyn FnMut(StageEvent)) -> JobResult;
}

impl<L, C, V, R> JobHandler for MeasurementPipeline<L, C, V, R>
where
    L: LoadCell,
    C: Camera,
    V: Vision,
    R: RemoteSink,
{
    fn handle(&mut self, job: Job, emit: &mut dyn FnMut(StageEvent)) -> JobResult {
        match job {
            Job::Measure { calibration } => {
                JobResult::Measured(Box::new(self.run_cycle(&calibration, emit)))
            }
            Job::Tare => JobResult::Tared(self.tare()),
            Job::ReadRaw => JobResult::Raw(self.read_raw()),
            Job::Preview => JobResult::Previewed(self.preview()),
        }
    }
}

/// Submit jobs, collect their events. At most one job is in flight.
pub trait Executor {
    fn submit(&mut self, job: Job) -> Result<(), StationError>;
    /// Events produced since the last call, oldest first.
    fn poll(&mut self) -> Result<Vec<WorkerEvent>, StationError>;
    fn busy(&self) -> bool;
}

/// Runs each job to completion inside `submit`.
pub struct Inline<H> {
    handler: H,
    events: VecDeque<WorkerEvent>,
}

impl<H: JobHandler> Inline<H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            events: VecDeque::new(),
        }
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn into_inner(self) -> H {
        self.handler
    }
}

impl<H: JobHandler> Executor for Inline<H> {
    fn submit(&mut self, job: Job) -> Result<(), StationError> {
        let events = &mut self.events;
        let result = self
            .handler
            .handle(job, &mut |e| events.push_back(WorkerEvent::Stage(e)));
        self.events.push_back(WorkerEvent::Done(result));
        Ok(())
    }

    fn poll(&mut self) -> Result<Vec<WorkerEvent>, StationError> {
        Ok(self.events.drain(..).collect())
    }

    fn busy(&self) -> bool {
        false
    }
}

/// Runs jobs on a dedicated thread that owns the handler.
pub struct Worker {
    jobs: Option<xch::Sender<Job>>,
    events: xch::Receiver<WorkerEvent>,
    in_flight: bool,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl Worker {
    pub fn spawn<H: JobHandler + Send + 'static>(mut handler: H) -> Self {
        let (job_tx, job_rx) = xch::bounded::<Job>(1);
        let (ev_tx, ev_rx) = xch::unbounded();

        let join_handle = std::thread::spawn(move || {
            // Ends when the controller drops its sender.
            for job in job_rx.iter() {
                let kind = job.kind();
                tracing::debug!(?kind, "worker picked up job");
                let result = handler.handle(job, &mut |e| {
                    let _ = ev_tx.send(WorkerEvent::Stage(e));
                });
                if ev_tx.send(WorkerEvent::Done(result)).is_err() {
                    tracing::debug!("worker consumer disconnected, exiting thread");
                    break;
                }
            }
            tracing::trace!("worker thread exiting cleanly");
        });

        Self {
            jobs: Some(job_tx),
            events: ev_rx,
            in_flight: false,
            join_handle: Some(join_handle),
        }
    }
}

impl Executor for Worker {
    fn submit(&mut self, job: Job) -> Result<(), StationError> {
        if self.in_flight {
            return Err(StationError::Worker("a job is already running".into()));
        }
        let tx = self
            .jobs
            .as_ref()
            .ok_or_else(|| StationError::Worker("worker is shut down".into()))?;
        tx.try_send(job)
            .map_err(|e| StationError::Worker(format!("submit failed: {e}")))?;
        self.in_flight = true;
        Ok(())
    }

    fn poll(&mut self) -> Result<Vec<WorkerEvent>, StationError> {
        let mut out = Vec::new();
        loop {
            match self.events.try_recv() {
                Ok(ev) => {
                    if matches!(ev, WorkerEvent::Done(_)) {
                        self.in_flight = false;
                    }
                    out.push(ev);
                }
                Err(xch::TryRecvError::Empty) => break,
                Err(xch::TryRecvError::Disconnected) => {
                    if self.in_flight || out.is_empty() {
                        self.in_flight = false;
                        return Err(StationError::Worker(
                            "measurement worker stopped unexpectedly".into(),
                        ));
                    }
                    break;
                }
            }
        }
        Ok(out)
    }

    fn busy(&self) -> bool {
        self.in_flight
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        // Closing the job channel lets the thread finish its current job and exit.
        self.jobs.take();
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("worker thread joined"),
                Err(e) => tracing::warn!(?e, "worker thread panicked during shutdown"),
            }
        }
    }
}
