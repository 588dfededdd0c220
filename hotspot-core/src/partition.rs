//! Bounded accumulator for one partition slot.

use serde::{Deserialize, Serialize};

/// Lifecycle of a partition. Only `Active` partitions accept weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum PartitionState {
    Active { current: i64 },
    /// Terminal: an admitted record would have pushed the load past capacity.
    Errored { current: i64 },
}

impl PartitionState {
    #[must_use]
    pub const fn current(&self) -> i64 {
        match *self {
            Self::Active { current } | Self::Errored { current } => current,
        }
    }

    #[must_use]
    pub const fn is_errored(&self) -> bool {
        matches!(self, Self::Errored { .. })
    }
}

/// What happened when weight was offered to a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Weight was added; `delta` is the change in load.
    Accepted { delta: i64, current: i64 },
    /// The partition just overflowed. `delta` is the headroom that was left,
    /// so progress stops exactly at the ceiling.
    Overflowed { delta: i64, current: i64 },
    /// The partition had already overflowed and ignored the weight.
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    capacity: i64,
    state: PartitionState,
}

impl Partition {
    #[must_use]
    pub const fn new(floor: i64, capacity: i64) -> Self {
        Self {
            capacity,
            state: PartitionState::Active { current: floor },
        }
    }

    #[must_use]
    pub const fn capacity(&self) -> i64 {
        self.capacity
    }

    #[must_use]
    pub const fn state(&self) -> PartitionState {
        self.state
    }

    #[must_use]
    pub const fn current(&self) -> i64 {
        self.state.current()
    }

    #[must_use]
    pub const fn is_errored(&self) -> bool {
        self.state.is_errored()
    }

    /// Offer `weight` to the partition.
    ///
    /// A sum that does not fit in an `i64` is treated as exceeding capacity.
    pub fn admit(&mut self, weight: i64) -> Admission {
        let PartitionState::Active { current } = self.state else {
            return Admission::Closed;
        };

        match current.checked_add(weight) {
            Some(next) if next <= self.capacity => {
                self.state = PartitionState::Active { current: next };
                Admission::Accepted {
                    delta: next - current,
                    current: next,
                }
            }
            _ => {
                self.state = PartitionState::Errored { current };
                Admission::Overflowed {
                    delta: self.capacity.saturating_sub(current),
                    current,
                }
            }
        }
    }
}
