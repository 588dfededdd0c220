//! Simulation engine: replays records through the partition hash and accounts
//! the load each partition receives.
//!
//! A run is a fixed number of passes over a restartable source. Every decoded
//! record counts towards the run totals. Records over the outlier threshold are
//! then dropped, the rest are offered to the partition their key hashes to.
//! A partition that would exceed its capacity is closed for the rest of the
//! run, and once every partition is closed the current pass stops early.

use std::fmt;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::RecordSource;
use crate::config::{ConfigError, SimulationConfig};
use crate::hash::partition_index;
use crate::outliers::{OutlierNotice, OutlierRegistry};
use crate::partition::{Admission, Partition};
use crate::progress::{PartitionUpdate, ProgressSink, SimulationEvent};
use crate::record::{RawRecord, Record};

/// Point in the scan where the input failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStage {
    Rewind,
    Header,
    Record,
}

impl fmt::Display for ScanStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Rewind => "error resetting input position",
            Self::Header => "error reading CSV header",
            Self::Record => "error reading CSV",
        };
        f.write_str(label)
    }
}

/// Run-level failures. The run's result is still available alongside them.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("{stage}: {source}")]
    Stream {
        stage: ScanStage,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
    #[error("all partitions have exceeded their maximum value")]
    AllPartitionsOverflowed,
    #[error("1 partition exceeded its maximum value")]
    PartitionOverflowed,
    #[error("{count} partitions exceeded their maximum value")]
    PartitionsOverflowed { count: usize },
}

impl SimulationError {
    fn stream<E>(stage: ScanStage, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Stream {
            stage,
            source: Box::new(source),
        }
    }

    /// Whether the failure is an overflow classification rather than an I/O fault.
    #[must_use]
    pub const fn is_overflow(&self) -> bool {
        !matches!(self, Self::Stream { .. })
    }
}

/// Aggregate produced once per run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Records decoded across every pass, outliers included.
    pub total_documents: u64,
    /// Sum of decoded weights across every pass, outliers included.
    pub total_ids: i64,
    /// Final load of each partition, by index.
    pub partition_counts: Vec<i64>,
    /// Indices of partitions that overflowed, ascending.
    pub overflowed_partitions: Vec<usize>,
    pub iterations_completed: usize,
    /// Outlier notices in the order they were raised.
    pub outliers: Vec<OutlierNotice>,
}

/// Result of a run plus its failure, if any.
#[derive(Debug)]
pub struct SimulationOutcome {
    pub result: SimulationResult,
    pub error: Option<SimulationError>,
}

impl SimulationOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Collapse into a `Result`, dropping the result on failure.
    ///
    /// # Errors
    ///
    /// Returns the run's failure if it had one.
    pub fn into_result(self) -> Result<SimulationResult, SimulationError> {
        match self.error {
            None => Ok(self.result),
            Some(err) => Err(err),
        }
    }
}

/// What the engine did with one input row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The row could not be decoded.
    Rejected,
    /// Dropped by the outlier policy; `first_sighting` if a notice was raised.
    Outlier {
        partition: usize,
        first_sighting: bool,
    },
    Accepted(PartitionUpdate),
    Overflowed(PartitionUpdate),
    /// Targeted partition had already overflowed.
    Closed { partition: usize },
}

/// Owned state of one simulation run.
#[derive(Debug, Clone)]
pub struct Simulation {
    config: SimulationConfig,
    modulus: u32,
    partitions: Vec<Partition>,
    outliers: OutlierRegistry,
    errored_partitions: usize,
    total_documents: u64,
    total_ids: i64,
    iterations_completed: usize,
}

impl Simulation {
    /// Allocate partitions and empty counters for `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let modulus = config.partition_modulus()?;
        let partitions = vec![Partition::new(config.floor, config.capacity); config.partitions];
        Ok(Self {
            config,
            modulus,
            partitions,
            outliers: OutlierRegistry::new(),
            errored_partitions: 0,
            total_documents: 0,
            total_ids: 0,
            iterations_completed: 0,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &SimulationConfig {
        &self.config
    }

    #[must_use]
    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    #[must_use]
    pub const fn errored_partitions(&self) -> usize {
        self.errored_partitions
    }

    #[must_use]
    pub fn all_partitions_errored(&self) -> bool {
        self.errored_partitions == self.partitions.len()
    }

    #[must_use]
    pub const fn total_documents(&self) -> u64 {
        self.total_documents
    }

    #[must_use]
    pub const fn total_ids(&self) -> i64 {
        self.total_ids
    }

    /// Partition slot a key hashes to.
    #[must_use]
    pub const fn partition_for(&self, key: u32) -> usize {
        partition_index(key, self.modulus) as usize
    }

    /// Run every configured pass over `source`, then classify the outcome.
    pub fn run<R, P>(mut self, source: &mut R, sink: &mut P) -> SimulationOutcome
    where
        R: RecordSource,
        P: ProgressSink + ?Sized,
    {
        let error = match self.scan(source, sink) {
            Ok(()) => self.classify(),
            Err(err) => Some(err),
        };
        if let Some(err) = &error {
            debug!("simulation finished with error: {err}");
        }
        SimulationOutcome {
            result: self.result(),
            error,
        }
    }

    fn scan<R, P>(&mut self, source: &mut R, sink: &mut P) -> Result<(), SimulationError>
    where
        R: RecordSource,
        P: ProgressSink + ?Sized,
    {
        let mut offset = 0_u64;

        for iteration in 1..=self.config.iterations {
            offset += source.position();
            source
                .rewind()
                .map_err(|e| SimulationError::stream(ScanStage::Rewind, e))?;
            source
                .read_header()
                .map_err(|e| SimulationError::stream(ScanStage::Header, e))?;

            debug!("pass {iteration}/{} started", self.config.iterations);
            sink.publish(SimulationEvent::IterationStarted { iteration });

            while let Some(raw) = source
                .next_record()
                .map_err(|e| SimulationError::stream(ScanStage::Record, e))?
            {
                let position = source.position();
                sink.publish(SimulationEvent::ScanPosition {
                    overall: offset + position,
                });

                let outcome = self.process_record(&raw, position, sink);
                if matches!(outcome, RecordOutcome::Overflowed(_)) && self.all_partitions_errored()
                {
                    info!("every partition has overflowed, ending pass {iteration}");
                    break;
                }
            }

            self.iterations_completed = iteration;
        }

        sink.publish(SimulationEvent::ScanPosition {
            overall: offset + source.position(),
        });
        sink.publish(SimulationEvent::Totals {
            documents: self.total_documents,
            ids: self.total_ids,
        });
        Ok(())
    }

    /// Decode one row and apply it. Undecodable rows are logged and skipped.
    pub fn process_record<P>(
        &mut self,
        raw: &RawRecord,
        position: u64,
        sink: &mut P,
    ) -> RecordOutcome
    where
        P: ProgressSink + ?Sized,
    {
        match Record::try_from(raw) {
            Ok(record) => self.apply(record, sink),
            Err(error) => {
                debug!("skipping row at offset {position}: {error}");
                sink.publish(SimulationEvent::RecordRejected { position, error });
                RecordOutcome::Rejected
            }
        }
    }

    /// Account one decoded record.
    pub fn apply<P>(&mut self, record: Record, sink: &mut P) -> RecordOutcome
    where
        P: ProgressSink + ?Sized,
    {
        self.total_documents += 1;
        self.total_ids = self.total_ids.saturating_add(record.weight);
        sink.publish(SimulationEvent::Totals {
            documents: self.total_documents,
            ids: self.total_ids,
        });

        let partition = self.partition_for(record.key);

        if record.weight > self.config.outlier_threshold {
            let notice = OutlierNotice {
                key: record.key,
                weight: record.weight,
                partition,
            };
            let first_sighting = self.outliers.register(notice).is_some();
            if first_sighting {
                debug!("{notice}");
                sink.publish(SimulationEvent::Outlier(notice));
            }
            return RecordOutcome::Outlier {
                partition,
                first_sighting,
            };
        }

        match self.partitions[partition].admit(record.weight) {
            Admission::Accepted { delta, current } => {
                let update = PartitionUpdate {
                    partition,
                    delta,
                    current,
                };
                sink.publish(SimulationEvent::PartitionProgress(update));
                RecordOutcome::Accepted(update)
            }
            Admission::Overflowed { delta, current } => {
                debug!("partition {partition} exceeded maximum value");
                self.errored_partitions += 1;
                let update = PartitionUpdate {
                    partition,
                    delta,
                    current,
                };
                sink.publish(SimulationEvent::PartitionOverflow(update));
                RecordOutcome::Overflowed(update)
            }
            Admission::Closed => RecordOutcome::Closed { partition },
        }
    }

    fn classify(&self) -> Option<SimulationError> {
        match self.errored_partitions {
            0 => None,
            n if n == self.partitions.len() => Some(SimulationError::AllPartitionsOverflowed),
            1 => Some(SimulationError::PartitionOverflowed),
            count => Some(SimulationError::PartitionsOverflowed { count }),
        }
    }

    /// Snapshot of the run so far.
    #[must_use]
    pub fn result(&self) -> SimulationResult {
        SimulationResult {
            total_documents: self.total_documents,
            total_ids: self.total_ids,
            partition_counts: self.partitions.iter().map(Partition::current).collect(),
            overflowed_partitions: self
                .partitions
                .iter()
                .enumerate()
                .filter(|(_, p)| p.is_errored())
                .map(|(index, _)| index)
                .collect(),
            iterations_completed: self.iterations_completed,
            outliers: self.outliers.notices().to_vec(),
        }
    }
}

/// Build a simulation for `config` and run it over `source`.
///
/// # Errors
///
/// Returns an error if the configuration is invalid. Run failures are carried
/// in the returned outcome.
pub fn simulate<R, P>(
    config: SimulationConfig,
    source: &mut R,
    sink: &mut P,
) -> Result<SimulationOutcome, ConfigError>
where
    R: RecordSource,
    P: ProgressSink + ?Sized,
{
    Ok(Simulation::new(config)?.run(source, sink))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use crate::source::MemorySource;

    fn config(partitions: usize, capacity: i64) -> SimulationConfig {
        SimulationConfig::default()
            .with_partitions(partitions)
            .with_capacity(capacity)
            .with_floor(0)
    }

    #[test]
    fn classify_follows_overflow_count() {
        let mut sim = Simulation::new(config(3, 10)).unwrap();
        assert!(sim.classify().is_none());
        sim.errored_partitions = 1;
        assert_eq!(
            sim.classify().unwrap().to_string(),
            "1 partition exceeded its maximum value"
        );
        sim.errored_partitions = 2;
        assert_eq!(
            sim.classify().unwrap().to_string(),
            "2 partitions exceeded their maximum value"
        );
        sim.errored_partitions = 3;
        assert_eq!(
            sim.classify().unwrap().to_string(),
            "all partitions have exceeded their maximum value"
        );
    }

    #[test]
    fn single_partition_overflow_reports_all() {
        let mut source = MemorySource::from_records(&[Record::new(1, 11)]);
        let outcome = simulate(config(1, 10), &mut source, &mut NoProgress).unwrap();
        assert!(matches!(
            outcome.error,
            Some(SimulationError::AllPartitionsOverflowed)
        ));
    }

    #[test]
    fn outliers_count_towards_totals_but_not_partitions() {
        let cfg = config(1, 100).with_outlier_threshold(10);
        let mut sim = Simulation::new(cfg).unwrap();
        let mut events = Vec::new();
        let outcome = sim.apply(Record::new(5, 50), &mut events);
        assert_eq!(
            outcome,
            RecordOutcome::Outlier {
                partition: 0,
                first_sighting: true
            }
        );
        assert_eq!(sim.total_documents(), 1);
        assert_eq!(sim.total_ids(), 50);
        assert_eq!(sim.partitions()[0].current(), 0);
    }

    #[test]
    fn repeated_outlier_is_skipped_silently() {
        let cfg = config(1, 100).with_outlier_threshold(10);
        let mut sim = Simulation::new(cfg).unwrap();
        let mut events = Vec::new();
        sim.apply(Record::new(5, 50), &mut events);
        events.clear();
        let outcome = sim.apply(Record::new(5, 60), &mut events);
        assert_eq!(
            outcome,
            RecordOutcome::Outlier {
                partition: 0,
                first_sighting: false
            }
        );
        assert!(
            !events
                .iter()
                .any(|e| matches!(e, SimulationEvent::Outlier(_)))
        );
        assert_eq!(sim.partitions()[0].current(), 0);
    }

    #[test]
    fn registered_key_under_threshold_is_admitted() {
        let cfg = config(1, 100).with_outlier_threshold(10);
        let mut sim = Simulation::new(cfg).unwrap();
        sim.apply(Record::new(5, 50), &mut NoProgress);
        let outcome = sim.apply(Record::new(5, 3), &mut NoProgress);
        assert!(matches!(outcome, RecordOutcome::Accepted(_)));
        assert_eq!(sim.partitions()[0].current(), 3);
    }

    #[test]
    fn rejected_rows_leave_counters_alone() {
        let mut sim = Simulation::new(config(2, 100)).unwrap();
        let mut events = Vec::new();
        let outcome = sim.process_record(&RawRecord::new("x", "1"), 12, &mut events);
        assert_eq!(outcome, RecordOutcome::Rejected);
        assert_eq!(sim.total_documents(), 0);
        assert_eq!(sim.total_ids(), 0);
        assert!(matches!(
            events.as_slice(),
            [SimulationEvent::RecordRejected { position: 12, .. }]
        ));
    }

    #[test]
    fn overflow_emits_clamped_progress() {
        let mut sim = Simulation::new(config(1, 10)).unwrap();
        let mut events = Vec::new();
        sim.apply(Record::new(1, 4), &mut events);
        events.clear();
        let outcome = sim.apply(Record::new(2, 9), &mut events);
        let expected = PartitionUpdate {
            partition: 0,
            delta: 6,
            current: 4,
        };
        assert_eq!(outcome, RecordOutcome::Overflowed(expected));
        assert!(events.contains(&SimulationEvent::PartitionOverflow(expected)));
        assert_eq!(sim.errored_partitions(), 1);
        assert_eq!(
            sim.apply(Record::new(3, 1), &mut events),
            RecordOutcome::Closed { partition: 0 }
        );
    }

    mod capture {
        use std::sync::Mutex;

        use log::{Level, Log, Metadata, Record};

        pub struct CaptureLogger {
            pub levels: Mutex<Vec<Level>>,
        }

        impl Log for CaptureLogger {
            fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
                true
            }

            fn log(&self, record: &Record<'_>) {
                if let Ok(mut levels) = self.levels.lock() {
                    levels.push(record.level());
                }
            }

            fn flush(&self) {}
        }

        pub static LOGGER: CaptureLogger = CaptureLogger {
            levels: Mutex::new(Vec::new()),
        };
    }

    #[test]
    fn per_record_diagnostics_stay_below_warn() {
        log::set_logger(&capture::LOGGER).ok();
        log::set_max_level(log::LevelFilter::Trace);

        let cfg = config(1, 10).with_outlier_threshold(50);
        let mut source = MemorySource::new(vec![
            RawRecord::new("x", "1"),
            RawRecord::new("5", "60"),
            RawRecord::new("6", "11"),
        ]);
        let mut events = Vec::new();
        Simulation::new(cfg).unwrap().run(&mut source, &mut events);

        assert!(events.iter().any(|e| matches!(e, SimulationEvent::RecordRejected { .. })));
        assert!(events.iter().any(|e| matches!(e, SimulationEvent::Outlier(_))));
        assert!(events.iter().any(|e| matches!(e, SimulationEvent::PartitionOverflow(_))));
        let levels = capture::LOGGER.levels.lock().unwrap();
        assert!(!levels.is_empty());
        assert!(levels.iter().all(|level| *level > log::Level::Warn));
    }

    #[test]
    fn into_result_surfaces_error() {
        let mut source = MemorySource::from_records(&[Record::new(1, 11)]);
        let outcome = simulate(config(1, 10), &mut source, &mut NoProgress).unwrap();
        assert!(!outcome.is_success());
        assert!(outcome.into_result().is_err());
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let mut source = MemorySource::default();
        let err = simulate(config(0, 10), &mut source, &mut NoProgress).unwrap_err();
        assert_eq!(err, ConfigError::NoPartitions(0));
    }
}
