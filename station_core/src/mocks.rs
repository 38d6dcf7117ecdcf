//! Test doubles for the station collaborators.
//!
//! Doubles that tests need to inspect after handing them to the controller or
//! pipeline share their state through `Arc<Mutex<_>>`; keep a clone.

use crate::error::SinkError;
use crate::telemetry::{Point, RemoteSink, TelemetrySink};
use crossbeam_channel as xch;
use station_traits::{
    BoxError, Button, Buttons, Camera, CaptureError, Display, LoadCell, ManualClock, Screen,
    Vision, VisionError,
};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Load cell replaying a fixed sequence; `None` entries are not-ready reads.
/// Once exhausted it keeps returning not-ready, or repeats the sequence when cycling.
pub struct SeqLoadCell {
    seq: Vec<Option<i32>>,
    pos: usize,
    cycle: bool,
    reads: Arc<Mutex<usize>>,
}

impl SeqLoadCell {
    pub fn new(values: impl IntoIterator<Item = i32>) -> Self {
        Self::with_gaps(values.into_iter().map(Some))
    }

    pub fn with_gaps(values: impl IntoIterator<Item = Option<i32>>) -> Self {
        Self {
            seq: values.into_iter().collect(),
            pos: 0,
            cycle: false,
            reads: Arc::new(Mutex::new(0)),
        }
    }

    pub fn constant(v: i32) -> Self {
        Self::new([v]).cycling()
    }

    /// A cell that never produces a valid reading.
    pub fn dead() -> Self {
        Self::with_gaps([])
    }

    pub fn cycling(mut self) -> Self {
        self.cycle = true;
        self
    }

    /// Shared counter of `read_one` calls.
    pub fn reads(&self) -> Arc<Mutex<usize>> {
        self.reads.clone()
    }
}

impl LoadCell for SeqLoadCell {
    fn read_one(&mut self) -> Result<i32, BoxError> {
        *lock(&self.reads) += 1;
        if self.pos >= self.seq.len() {
            if self.cycle && !self.seq.is_empty() {
                self.pos = 0;
            } else {
                return Err(Box::new(std::io::Error::other("load cell not ready")));
            }
        }
        let v = self.seq[self.pos];
        self.pos += 1;
        v.ok_or_else(|| Box::new(std::io::Error::other("load cell not ready")) as BoxError)
    }
}

#[derive(Debug, Default)]
pub struct RemoteState {
    pub reachable: bool,
    /// Every acknowledged point, in write order.
    pub written: Vec<Point>,
    /// Number of write requests (batches) received, including failed ones.
    pub requests: usize,
    /// Accept this many more requests, then fail every write.
    pub fail_after: Option<usize>,
    /// Batches containing a point with this field id are rejected with a 400.
    pub reject_field: Option<String>,
}

/// In-memory remote sink.
#[derive(Clone, Default)]
pub struct MemoryRemote {
    state: Arc<Mutex<RemoteState>>,
}

impl MemoryRemote {
    pub fn new(reachable: bool) -> Self {
        let r = Self::default();
        r.set_reachable(reachable);
        r
    }

    pub fn set_reachable(&self, reachable: bool) {
        lock(&self.state).reachable = reachable;
    }

    pub fn fail_after(&self, requests: Option<usize>) {
        lock(&self.state).fail_after = requests;
    }

    pub fn reject_field(&self, field_id: Option<&str>) {
        lock(&self.state).reject_field = field_id.map(str::to_string);
    }

    pub fn written(&self) -> Vec<Point> {
        lock(&self.state).written.clone()
    }

    pub fn requests(&self) -> usize {
        lock(&self.state).requests
    }
}

impl TelemetrySink for MemoryRemote {
    fn record(&mut self, point: &Point) -> Result<(), SinkError> {
        self.write_batch(std::slice::from_ref(point))
    }
}

impl RemoteSink for MemoryRemote {
    fn is_reachable(&mut self) -> bool {
        lock(&self.state).reachable
    }

    fn write_batch(&mut self, points: &[Point]) -> Result<(), SinkError> {
        let mut s = lock(&self.state);
        s.requests += 1;
        if !s.reachable {
            return Err(SinkError::Unreachable);
        }
        if let Some(field) = &s.reject_field {
            if points.iter().any(|p| &p.field_id == field) {
                return Err(SinkError::Rejected {
                    status: 400,
                    body: format!("invalid field {field}"),
                });
            }
        }
        match s.fail_after {
            Some(0) => return Err(SinkError::Transport("injected failure".into())),
            Some(n) => s.fail_after = Some(n - 1),
            None => {}
        }
        s.written.extend_from_slice(points);
        Ok(())
    }
}

/// Buttons fed from a shared queue; one press per poll.
#[derive(Clone, Default)]
pub struct ScriptedButtons {
    queue: Arc<Mutex<VecDeque<Option<Button>>>>,
    fail: Arc<Mutex<Option<String>>>,
}

impl ScriptedButtons {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&self, b: Button) {
        lock(&self.queue).push_back(Some(b));
    }

    /// Queue a poll that returns no press.
    pub fn idle(&self) {
        lock(&self.queue).push_back(None);
    }

    pub fn fail_with(&self, msg: Option<&str>) {
        *lock(&self.fail) = msg.map(str::to_string);
    }
}

impl Buttons for ScriptedButtons {
    fn poll(&mut self) -> Result<Option<Button>, BoxError> {
        if let Some(msg) = lock(&self.fail).clone() {
            return Err(msg.into());
        }
        Ok(lock(&self.queue).pop_front().flatten())
    }
}

/// Display that records every frame.
#[derive(Clone, Default)]
pub struct RecordingDisplay {
    frames: Arc<Mutex<Vec<Screen>>>,
    fail: Arc<Mutex<Option<String>>>,
}

impl RecordingDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> Vec<Screen> {
        lock(&self.frames).clone()
    }

    pub fn last(&self) -> Option<Screen> {
        lock(&self.frames).last().cloned()
    }

    pub fn fail_with(&self, msg: Option<&str>) {
        *lock(&self.fail) = msg.map(str::to_string);
    }
}

impl Display for RecordingDisplay {
    fn show(&mut self, screen: &Screen) -> Result<(), BoxError> {
        if let Some(msg) = lock(&self.fail).clone() {
            return Err(msg.into());
        }
        lock(&self.frames).push(screen.clone());
        Ok(())
    }
}

/// Camera writing a small file per capture. Optionally advances a manual
/// clock to simulate the time a capture takes.
pub struct StubCamera {
    folder: PathBuf,
    fail: Option<CaptureError>,
    clock: Option<(ManualClock, Duration)>,
    gate: Option<xch::Receiver<()>>,
    shots: usize,
}

/// Releases captures held by a gated [`StubCamera`], one per call.
pub struct CameraGate {
    tx: xch::Sender<()>,
}

impl CameraGate {
    pub fn release(&self) {
        let _ = self.tx.send(());
    }
}

impl StubCamera {
    pub fn new(folder: &Path) -> Self {
        Self {
            folder: folder.to_path_buf(),
            fail: None,
            clock: None,
            gate: None,
            shots: 0,
        }
    }

    pub fn failing(err: CaptureError) -> Self {
        Self {
            folder: PathBuf::new(),
            fail: Some(err),
            clock: None,
            gate: None,
            shots: 0,
        }
    }

    pub fn taking(mut self, clock: ManualClock, elapsed: Duration) -> Self {
        self.clock = Some((clock, elapsed));
        self
    }

    /// Block every capture until the returned gate releases it. Dropping the
    /// gate releases all captures.
    pub fn gated(mut self) -> (Self, CameraGate) {
        let (tx, rx) = xch::unbounded();
        self.gate = Some(rx);
        (self, CameraGate { tx })
    }
}

impl Camera for StubCamera {
    fn capture(&mut self, _wait: Duration, preview: bool) -> Result<PathBuf, CaptureError> {
        if let Some(gate) = &self.gate {
            let _ = gate.recv();
        }
        if let Some((clock, d)) = &self.clock {
            clock.advance(*d);
        }
        if let Some(e) = &self.fail {
            return Err(e.clone());
        }
        self.shots += 1;
        let name = if preview {
            "preview.jpg".to_string()
        } else {
            format!("shot_{}.jpg", self.shots)
        };
        let path = self.folder.join(name);
        std::fs::write(&path, b"\xFF\xD8stub\xFF\xD9").map_err(|e| CaptureError::Io(e.to_string()))?;
        Ok(path)
    }
}

/// Vision returning a fixed result.
pub struct StubVision {
    result: Result<f64, VisionError>,
}

impl StubVision {
    pub fn length(v: f64) -> Self {
        Self { result: Ok(v) }
    }

    pub fn no_segments() -> Self {
        Self {
            result: Err(VisionError::NoSegmentsFound),
        }
    }

    pub fn failing(msg: &str) -> Self {
        Self {
            result: Err(VisionError::Failed(msg.to_string())),
        }
    }
}

impl Vision for StubVision {
    fn growth_length(&self, _image: &Path, _channel: &str, _kernel: u32) -> Result<f64, VisionError> {
        self.result.clone()
    }
}
