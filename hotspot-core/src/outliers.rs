use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::numbers::format_thousands;

/// Notice published the first time a key exceeds the outlier threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlierNotice {
    pub key: u32,
    pub weight: i64,
    pub partition: usize,
}

impl fmt::Display for OutlierNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Skipping outlier DocumentID {} with count {} and partition {}",
            self.key,
            format_thousands(self.weight),
            self.partition
        )
    }
}

/// Keys already reported as outliers, kept for the whole run.
#[derive(Debug, Clone, Default)]
pub struct OutlierRegistry {
    seen: HashSet<u32>,
    notices: Vec<OutlierNotice>,
}

impl OutlierRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an outlier; returns the notice only on first sight of the key.
    pub fn register(&mut self, notice: OutlierNotice) -> Option<OutlierNotice> {
        if self.seen.insert(notice.key) {
            self.notices.push(notice);
            Some(notice)
        } else {
            None
        }
    }

    /// Notices in the order they were first raised.
    #[must_use]
    pub fn notices(&self) -> &[OutlierNotice] {
        &self.notices
    }
}
