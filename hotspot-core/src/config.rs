use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when a simulation configuration is unusable.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("partition count must be at least 1 (got {0})")]
    NoPartitions(usize),
    #[error("partition count {0} exceeds the 32-bit hash range")]
    TooManyPartitions(usize),
    #[error("iterations must be at least 1 (got {0})")]
    NoIterations(usize),
    #[error("partition minimum {floor} exceeds maximum {capacity}")]
    FloorAboveCapacity { floor: i64, capacity: i64 },
}

/// Run parameters for a hotspot simulation.
///
/// Defaults mirror an unbounded single-partition run: every partition starts at
/// `1`, never overflows, and no record is treated as an outlier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Number of partitions keys are hashed into.
    #[serde(default = "SimulationConfig::default_partitions")]
    pub partitions: usize,
    /// Maximum accumulated weight per partition.
    #[serde(default = "SimulationConfig::default_capacity", alias = "max")]
    pub capacity: i64,
    /// Starting value of every partition.
    #[serde(default = "SimulationConfig::default_floor", alias = "min")]
    pub floor: i64,
    /// Number of full passes over the input.
    #[serde(default = "SimulationConfig::default_iterations")]
    pub iterations: usize,
    /// Records weighing more than this are reported once and skipped.
    #[serde(default = "SimulationConfig::default_outlier_threshold", alias = "outlier")]
    pub outlier_threshold: i64,
}

impl SimulationConfig {
    const fn default_partitions() -> usize {
        1
    }

    const fn default_capacity() -> i64 {
        i64::MAX
    }

    const fn default_floor() -> i64 {
        1
    }

    const fn default_iterations() -> usize {
        1
    }

    const fn default_outlier_threshold() -> i64 {
        i64::MAX
    }

    #[must_use]
    pub const fn with_partitions(mut self, partitions: usize) -> Self {
        self.partitions = partitions;
        self
    }

    #[must_use]
    pub const fn with_capacity(mut self, capacity: i64) -> Self {
        self.capacity = capacity;
        self
    }

    #[must_use]
    pub const fn with_floor(mut self, floor: i64) -> Self {
        self.floor = floor;
        self
    }

    #[must_use]
    pub const fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    #[must_use]
    pub const fn with_outlier_threshold(mut self, threshold: i64) -> Self {
        self.outlier_threshold = threshold;
        self
    }

    /// Load a configuration from JSON; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed into a configuration.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Partition count as the hash modulus.
    ///
    /// # Errors
    ///
    /// Returns an error if the count is zero or does not fit in 32 bits.
    pub fn partition_modulus(&self) -> Result<u32, ConfigError> {
        if self.partitions == 0 {
            return Err(ConfigError::NoPartitions(self.partitions));
        }
        u32::try_from(self.partitions).map_err(|_| ConfigError::TooManyPartitions(self.partitions))
    }

    /// Check the configuration invariants.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.partition_modulus()?;
        if self.iterations == 0 {
            return Err(ConfigError::NoIterations(self.iterations));
        }
        if self.floor > self.capacity {
            return Err(ConfigError::FloorAboveCapacity {
                floor: self.floor,
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// Headroom of a fresh partition, used as the length of its progress bar.
    #[must_use]
    pub const fn headroom(&self) -> i64 {
        self.capacity.saturating_sub(self.floor)
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            partitions: Self::default_partitions(),
            capacity: Self::default_capacity(),
            floor: Self::default_floor(),
            iterations: Self::default_iterations(),
            outlier_threshold: Self::default_outlier_threshold(),
        }
    }
}
