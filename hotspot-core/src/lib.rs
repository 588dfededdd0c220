//! Hotspot Simulation Engine
//!
//! Replays a stream of `(key, weight)` records through the Postgres
//! `hash_bytes_uint32` partition hash and accounts the load every partition
//! receives, to reveal hotspots and bounded partitions that would overflow.
//! This crate has no terminal or file-system dependencies; the CLI supplies
//! the input source and renders progress.

pub mod config;
pub mod distribution;
pub mod engine;
pub mod hash;
pub mod numbers;
pub mod outliers;
pub mod partition;
pub mod progress;
pub mod record;
pub mod source;

// Re-export commonly used types
pub use config::{ConfigError, SimulationConfig};
pub use distribution::{DistributionSummary, Hotspot, PartitionShare};
pub use engine::{
    RecordOutcome, ScanStage, Simulation, SimulationError, SimulationOutcome, SimulationResult,
    simulate,
};
pub use hash::{hash, hash_signed, partition_index};
pub use numbers::format_thousands;
pub use outliers::{OutlierNotice, OutlierRegistry};
pub use partition::{Admission, Partition, PartitionState};
pub use progress::{NoProgress, PartitionUpdate, ProgressSink, SimulationEvent};
pub use record::{RawRecord, Record, RecordError};
pub use source::{CsvSource, MemorySource, SourceError};

/// Restartable producer of input rows.
///
/// A simulation scans the source once per iteration: `rewind`, `read_header`,
/// then `next_record` until it yields `None`.
pub trait RecordSource {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Reposition to the first row of the input.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying input cannot be repositioned.
    fn rewind(&mut self) -> Result<(), Self::Error>;

    /// Consume the header row, if the input has one.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is missing or unreadable.
    fn read_header(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Next data row, or `None` at the end of the pass.
    ///
    /// # Errors
    ///
    /// Returns an error if the row cannot be read.
    fn next_record(&mut self) -> Result<Option<RawRecord>, Self::Error>;

    /// Offset of the scan within the current pass.
    fn position(&self) -> u64;

    /// Size of one full pass, in the same unit as [`position`](Self::position).
    fn total_len(&self) -> u64;
}
