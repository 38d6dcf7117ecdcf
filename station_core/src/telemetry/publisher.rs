//! Remote-first delivery with a local durable fallback.
//!
//! Every value ends up either acknowledged by the remote sink or appended to
//! the local log. Buffered values of a category are replayed, oldest first
//! and with their original timestamps, before any new value of that category
//! is sent.

use super::{Category, FieldValue, LocalLog, Point, RemoteSink};
use crate::error::{PublishError, SinkError};
use chrono::{DateTime, Utc};
use station_traits::Clock;
use std::sync::Arc;

pub type SharedClock = Arc<dyn Clock + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Acknowledged by the remote sink.
    Sent,
    /// Appended to the local log; will be replayed later.
    Buffered,
}

pub struct ResilientPublisher<R> {
    remote: R,
    log: LocalLog,
    clock: SharedClock,
    replay_chunk: usize,
    connected: bool,
}

impl<R: RemoteSink> ResilientPublisher<R> {
    pub fn new(remote: R, log: LocalLog, clock: SharedClock, replay_chunk: usize) -> Self {
        Self {
            remote,
            log,
            clock,
            replay_chunk: replay_chunk.max(1),
            connected: false,
        }
    }

    /// Result of the most recent reachability probe.
    pub fn connected(&self) -> bool {
        self.connected
    }

    pub fn pending_count(&self) -> usize {
        self.log.pending_count()
    }

    pub fn remote_mut(&mut self) -> &mut R {
        &mut self.remote
    }

    pub fn local_log(&self) -> &LocalLog {
        &self.log
    }

    pub fn publish(
        &mut self,
        category: Category,
        field_id: &str,
        value: impl Into<FieldValue>,
        timestamp: DateTime<Utc>,
    ) -> Result<Delivery, PublishError> {
        let point = Point::new(category, field_id, value, timestamp);
        if !point.value.is_finite() {
            return Err(PublishError::NonFinite {
                field_id: point.field_id,
            });
        }

        self.connected = self.remote.is_reachable();
        if self.connected {
            let report = self.replay_all();
            match report.failure(category) {
                None => match self.remote.record(&point) {
                    Ok(()) => {
                        tracing::debug!(category = %category, field = field_id, "value sent");
                        return Ok(Delivery::Sent);
                    }
                    Err(e) => {
                        tracing::warn!(category = %category, field = field_id, error = %e, "remote write failed; buffering");
                    }
                },
                Some(e) => {
                    tracing::warn!(category = %category, error = %e, "replay interrupted; buffering new value");
                }
            }
        } else {
            tracing::debug!(category = %category, field = field_id, "remote unreachable; buffering");
        }

        self.log
            .append(&point)
            .map_err(|source| PublishError::LocalLog {
                category: category.to_string(),
                field_id: field_id.to_string(),
                source,
            })?;
        Ok(Delivery::Buffered)
    }

    /// Replay every buffered value if the remote answers. Returns how many
    /// values were acknowledged, or the first category failure.
    pub fn resync(&mut self) -> Result<usize, SinkError> {
        self.connected = self.remote.is_reachable();
        if !self.connected {
            return Err(SinkError::Unreachable);
        }
        let report = self.replay_all();
        match report.failed.into_iter().next() {
            Some((_, e)) => Err(e),
            None => Ok(report.acked),
        }
    }

    fn replay_all(&mut self) -> ReplayReport {
        let mut report = ReplayReport::default();
        for category in Category::ALL {
            match self.replay(category) {
                Ok(n) => report.acked += n,
                Err(e) => report.failed.push((category, e)),
            }
        }
        report
    }

    fn replay(&mut self, category: Category) -> Result<usize, SinkError> {
        let points = self.log.pending(category)?;
        if points.is_empty() {
            return Ok(0);
        }
        // Positions (among `points`) of values refused for good.
        let mut rejected = Vec::new();
        let mut handled = 0usize;
        let mut failure = None;
        for chunk in points.chunks(self.replay_chunk) {
            match self.remote.write_batch(chunk) {
                Ok(()) => handled += chunk.len(),
                Err(SinkError::Rejected { .. }) => {
                    // Find the offending values one by one.
                    for point in chunk {
                        match self.remote.write_batch(std::slice::from_ref(point)) {
                            Ok(()) => {}
                            Err(SinkError::Rejected { status, body }) => {
                                tracing::warn!(
                                    category = %category,
                                    field = %point.field_id,
                                    status,
                                    body = %body,
                                    "remote refused buffered value"
                                );
                                rejected.push(handled);
                            }
                            Err(e) => {
                                failure = Some(e);
                                break;
                            }
                        }
                        handled += 1;
                    }
                }
                Err(e) => failure = Some(e),
            }
            if failure.is_some() {
                break;
            }
        }

        self.log
            .settle(category, handled, &rejected, self.clock.now())?;
        let acked = handled - rejected.len();
        match failure {
            Some(e) => {
                tracing::warn!(
                    category = %category,
                    acked,
                    remaining = points.len() - handled,
                    error = %e,
                    "replay aborted"
                );
                Err(e)
            }
            None => {
                tracing::info!(category = %category, replayed = acked, rejected = rejected.len(), "replayed pending records");
                Ok(acked)
            }
        }
    }
}

/// Outcome of replaying every category once.
#[derive(Debug, Default)]
struct ReplayReport {
    acked: usize,
    failed: Vec<(Category, SinkError)>,
}

impl ReplayReport {
    fn failure(&self, category: Category) -> Option<&SinkError> {
        self.failed
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, e)| e)
    }
}
