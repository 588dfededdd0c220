//! Terminal rendering of simulation events.

use hotspot_core::numbers::{clamp_i64_to_u64, usize_to_u64};
use hotspot_core::{ProgressSink, SimulationConfig, SimulationEvent, format_thousands};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

const OVERALL_TEMPLATE: &str =
    "{prefix:16} [{elapsed_precise}] {bar:50.cyan/blue} {bytes}/{total_bytes} {msg}";
const PARTITION_TEMPLATE: &str = "{prefix:16} {bar:50.green/white} {percent:>3}%";
const OVERFLOW_TEMPLATE: &str = "{prefix:16} {bar:50.red/white} {percent:>3}% {msg}";

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏ ")
}

fn status_line(documents: u64, ids: i64) -> String {
    format!(
        "Documents processed: {} | IDs created: {}",
        format_thousands(i64::try_from(documents).unwrap_or(i64::MAX)),
        format_thousands(ids)
    )
}

/// One bar for the whole run, one per partition, and a status line.
///
/// Partition bars span the headroom between the floor and the capacity.
pub struct TerminalProgress {
    multi: MultiProgress,
    overall: ProgressBar,
    partitions: Vec<ProgressBar>,
    status: ProgressBar,
    floor: i64,
}

impl TerminalProgress {
    pub fn new(config: &SimulationConfig, pass_len: u64, hidden: bool) -> Self {
        let target = if hidden {
            ProgressDrawTarget::hidden()
        } else {
            ProgressDrawTarget::stderr()
        };
        let multi = MultiProgress::with_draw_target(target);

        let total = pass_len.saturating_mul(usize_to_u64(config.iterations));
        let overall = multi.add(ProgressBar::new(total));
        overall.set_style(style(OVERALL_TEMPLATE));
        overall.set_prefix("Total Progress");

        let headroom = clamp_i64_to_u64(config.headroom());
        let partitions = (0..config.partitions)
            .map(|index| {
                let bar = multi.add(ProgressBar::new(headroom));
                bar.set_style(style(PARTITION_TEMPLATE));
                bar.set_prefix(format!("Partition {index:03}"));
                bar
            })
            .collect();

        let status = multi.add(ProgressBar::new_spinner());
        status.set_style(
            ProgressStyle::with_template("{msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        status.set_message(status_line(0, 0));

        Self {
            multi,
            overall,
            partitions,
            status,
            floor: config.floor,
        }
    }

    fn load(&self, current: i64) -> u64 {
        clamp_i64_to_u64(current.saturating_sub(self.floor))
    }

    /// Print a line above the bars so it survives redraws.
    fn note(&self, line: &str) {
        if self.multi.println(line).is_err() {
            log::debug!("progress output closed: {line}");
        }
    }

    /// Leave every bar at its final state.
    pub fn finish(&self) {
        self.overall.finish();
        for bar in &self.partitions {
            if !bar.is_finished() {
                bar.finish();
            }
        }
        self.status.finish();
    }
}

impl ProgressSink for TerminalProgress {
    fn publish(&mut self, event: SimulationEvent) {
        match event {
            SimulationEvent::IterationStarted { iteration } => {
                self.overall.set_message(format!("pass {iteration}"));
            }
            SimulationEvent::ScanPosition { overall } => self.overall.set_position(overall),
            SimulationEvent::Totals { documents, ids } => {
                self.status.set_message(status_line(documents, ids));
            }
            SimulationEvent::PartitionProgress(update) => {
                if let Some(bar) = self.partitions.get(update.partition) {
                    bar.set_position(self.load(update.current));
                }
            }
            SimulationEvent::PartitionOverflow(update) => {
                if let Some(bar) = self.partitions.get(update.partition) {
                    bar.set_style(style(OVERFLOW_TEMPLATE));
                    bar.set_position(self.load(update.current.saturating_add(update.delta)));
                    bar.abandon_with_message("exceeded maximum");
                }
                self.note(&format!(
                    "Partition {} exceeded maximum value",
                    update.partition
                ));
            }
            SimulationEvent::Outlier(notice) => self.note(&notice.to_string()),
            SimulationEvent::RecordRejected { position, error } => {
                self.note(&format!("{error} (offset {position})"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hotspot_core::PartitionUpdate;

    fn config() -> SimulationConfig {
        SimulationConfig::default()
            .with_partitions(2)
            .with_floor(10)
            .with_capacity(110)
            .with_iterations(3)
    }

    #[test]
    fn bars_span_run_and_headroom() {
        let progress = TerminalProgress::new(&config(), 40, true);
        assert_eq!(progress.overall.length(), Some(120));
        assert_eq!(progress.partitions.len(), 2);
        assert_eq!(progress.partitions[1].length(), Some(100));
    }

    #[test]
    fn partition_progress_excludes_floor() {
        let mut progress = TerminalProgress::new(&config(), 40, true);
        progress.publish(SimulationEvent::PartitionProgress(PartitionUpdate {
            partition: 1,
            delta: 25,
            current: 35,
        }));
        assert_eq!(progress.partitions[1].position(), 25);
        assert_eq!(progress.partitions[0].position(), 0);
    }

    #[test]
    fn overflow_fills_and_closes_bar() {
        let mut progress = TerminalProgress::new(&config(), 40, true);
        progress.publish(SimulationEvent::PartitionOverflow(PartitionUpdate {
            partition: 0,
            delta: 30,
            current: 80,
        }));
        assert_eq!(progress.partitions[0].position(), 100);
        assert!(progress.partitions[0].is_finished());
        progress.finish();
        assert!(progress.partitions[1].is_finished());
    }

    #[test]
    fn scan_position_moves_overall_bar() {
        let mut progress = TerminalProgress::new(&config(), 40, true);
        progress.publish(SimulationEvent::ScanPosition { overall: 57 });
        assert_eq!(progress.overall.position(), 57);
    }

    #[test]
    fn status_line_uses_separators() {
        assert_eq!(
            status_line(1_234_567, 89_000),
            "Documents processed: 1,234,567 | IDs created: 89,000"
        );
    }
}
