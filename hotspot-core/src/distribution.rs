//! Load distribution statistics over the final partition counts.

use serde::{Deserialize, Serialize};

use crate::engine::SimulationResult;
use crate::numbers::{i64_to_f64, usize_to_f64};

/// One partition's slice of the total load.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PartitionShare {
    pub partition: usize,
    /// Weight received, excluding the starting floor.
    pub load: i64,
    /// Percentage of the total load.
    pub share_pct: f64,
    /// Signed distance from the mean load, in percent of the mean; `0.0` when
    /// the mean is not positive.
    pub deviation_pct: f64,
    pub overflowed: bool,
}

/// A partition loaded above the mean by more than the tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hotspot {
    pub partition: usize,
    pub load: i64,
    pub deviation_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionSummary {
    pub total_load: i64,
    pub mean: f64,
    pub std_dev: f64,
    /// `max / mean`; `1.0` is a perfectly even spread.
    pub imbalance: f64,
    pub coolest: Option<PartitionShare>,
    pub hottest: Option<PartitionShare>,
    pub shares: Vec<PartitionShare>,
}

impl DistributionSummary {
    /// Summarize final partition counts that all started at `floor`.
    #[must_use]
    pub fn from_counts(counts: &[i64], floor: i64, overflowed: &[usize]) -> Self {
        let loads: Vec<i64> = counts.iter().map(|c| c.saturating_sub(floor)).collect();
        let total_load = loads.iter().fold(0_i64, |acc, l| acc.saturating_add(*l));
        let n = usize_to_f64(loads.len());
        let mean = if loads.is_empty() {
            0.0
        } else {
            i64_to_f64(total_load) / n
        };

        let shares: Vec<PartitionShare> = loads
            .iter()
            .enumerate()
            .map(|(partition, &load)| PartitionShare {
                partition,
                load,
                share_pct: percent_of(i64_to_f64(load), i64_to_f64(total_load)),
                deviation_pct: if mean > 0.0 {
                    percent_of(i64_to_f64(load) - mean, mean)
                } else {
                    0.0
                },
                overflowed: overflowed.contains(&partition),
            })
            .collect();

        let std_dev = if loads.is_empty() {
            0.0
        } else {
            let variance = loads
                .iter()
                .map(|&l| (i64_to_f64(l) - mean).powi(2))
                .sum::<f64>()
                / n;
            variance.sqrt()
        };

        let hottest = shares.iter().copied().max_by_key(|s| s.load);
        let coolest = shares.iter().copied().min_by_key(|s| s.load);
        let imbalance = match hottest {
            Some(h) if mean > 0.0 => i64_to_f64(h.load) / mean,
            _ => 0.0,
        };

        Self {
            total_load,
            mean,
            std_dev,
            imbalance,
            coolest,
            hottest,
            shares,
        }
    }

    /// Summarize a finished run whose partitions started at `floor`.
    #[must_use]
    pub fn from_result(result: &SimulationResult, floor: i64) -> Self {
        Self::from_counts(
            &result.partition_counts,
            floor,
            &result.overflowed_partitions,
        )
    }

    /// Coefficient of variation (`std_dev / mean`), `0.0` for an empty load.
    #[must_use]
    pub fn coefficient_of_variation(&self) -> f64 {
        if self.mean > 0.0 {
            self.std_dev / self.mean
        } else {
            0.0
        }
    }

    /// Partitions loaded more than `tolerance_pct` above the mean, hottest first.
    #[must_use]
    pub fn hotspots(&self, tolerance_pct: f64) -> Vec<Hotspot> {
        let mut hot: Vec<Hotspot> = self
            .shares
            .iter()
            .filter(|s| s.deviation_pct > tolerance_pct)
            .map(|s| Hotspot {
                partition: s.partition,
                load: s.load,
                deviation_pct: s.deviation_pct,
            })
            .collect();
        hot.sort_by(|a, b| b.deviation_pct.total_cmp(&a.deviation_pct));
        hot
    }

    /// Whether every partition is within `tolerance_pct` of the mean, either way.
    #[must_use]
    pub fn is_balanced(&self, tolerance_pct: f64) -> bool {
        self.shares
            .iter()
            .all(|s| s.deviation_pct.abs() <= tolerance_pct)
    }
}

fn percent_of(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        0.0
    } else {
        part / whole * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_load_is_balanced() {
        let summary = DistributionSummary::from_counts(&[10, 10, 10, 10], 0, &[]);
        assert_eq!(summary.total_load, 40);
        assert!((summary.mean - 10.0).abs() < f64::EPSILON);
        assert!(summary.std_dev.abs() < f64::EPSILON);
        assert!((summary.imbalance - 1.0).abs() < f64::EPSILON);
        assert!(summary.is_balanced(0.0));
        assert!(summary.hotspots(5.0).is_empty());
    }

    #[test]
    fn floor_is_excluded_from_load() {
        let summary = DistributionSummary::from_counts(&[11, 21], 1, &[]);
        assert_eq!(summary.total_load, 30);
        assert_eq!(summary.shares[0].load, 10);
        assert!((summary.shares[1].share_pct - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn skewed_load_reports_hotspots_hottest_first() {
        let summary = DistributionSummary::from_counts(&[5, 40, 10, 25], 0, &[1]);
        let hot = summary.hotspots(5.0);
        assert_eq!(hot.len(), 2);
        assert_eq!(hot[0].partition, 1);
        assert!((hot[0].deviation_pct - 100.0).abs() < 1e-9);
        assert_eq!(hot[1].partition, 3);
        assert_eq!(summary.hottest.unwrap().partition, 1);
        assert!(summary.hottest.unwrap().overflowed);
        assert_eq!(summary.coolest.unwrap().partition, 0);
        assert!((summary.imbalance - 2.0).abs() < 1e-9);
        assert!(!summary.is_balanced(5.0));
    }

    #[test]
    fn negative_mean_reports_no_hotspots() {
        let summary = DistributionSummary::from_counts(&[-30, -10, -5], 0, &[]);
        assert!(summary.mean < 0.0);
        assert!(summary.hotspots(0.0).is_empty());
        assert!(summary.shares.iter().all(|s| s.deviation_pct.abs() < f64::EPSILON));
        assert_eq!(summary.hottest.unwrap().partition, 2);
    }

    #[test]
    fn empty_load_has_zero_statistics() {
        let summary = DistributionSummary::from_counts(&[0, 0], 0, &[]);
        assert!(summary.mean.abs() < f64::EPSILON);
        assert!(summary.imbalance.abs() < f64::EPSILON);
        assert!(summary.coefficient_of_variation().abs() < f64::EPSILON);
        assert!(summary.hotspots(0.0).is_empty());
    }
}
