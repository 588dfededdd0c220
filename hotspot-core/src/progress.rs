//! Progress events published by the simulation engine.
//!
//! The engine publishes and moves on; rendering is up to the sink. Sinks must
//! not block, the scan calls them once per record.

use serde::{Deserialize, Serialize};

use crate::outliers::OutlierNotice;
use crate::record::RecordError;

/// Change in one partition's load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionUpdate {
    pub partition: usize,
    /// Change in displayed progress. On overflow this is the remaining headroom.
    pub delta: i64,
    /// Load after the update.
    pub current: i64,
}

/// Structured event emitted while a simulation runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulationEvent {
    /// A pass over the input is about to start (one-based).
    IterationStarted { iteration: usize },
    /// Scan offset accumulated across every pass so far.
    ScanPosition { overall: u64 },
    /// Running totals, refreshed after every decoded record.
    Totals { documents: u64, ids: i64 },
    PartitionProgress(PartitionUpdate),
    PartitionOverflow(PartitionUpdate),
    Outlier(OutlierNotice),
    /// A row that could not be decoded was skipped.
    RecordRejected { position: u64, error: RecordError },
}

/// Receiver of simulation events.
pub trait ProgressSink {
    fn publish(&mut self, event: SimulationEvent);
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn publish(&mut self, _event: SimulationEvent) {}
}

/// Collecting sink, handy for tests and post-run inspection.
impl ProgressSink for Vec<SimulationEvent> {
    fn publish(&mut self, event: SimulationEvent) {
        self.push(event);
    }
}

impl<S: ProgressSink + ?Sized> ProgressSink for &mut S {
    fn publish(&mut self, event: SimulationEvent) {
        (**self).publish(event);
    }
}
