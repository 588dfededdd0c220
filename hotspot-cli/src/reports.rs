use std::io::Write;

use anyhow::Result;
use colored::Colorize;
use hotspot_core::{
    DistributionSummary, Hotspot, SimulationConfig, SimulationOutcome, SimulationResult,
    format_thousands,
};
use serde::Serialize;

/// Everything a report renders about one run.
#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub input: String,
    pub config: &'a SimulationConfig,
    pub result: &'a SimulationResult,
    pub summary: DistributionSummary,
    pub hotspot_tolerance_pct: f64,
    pub hotspots: Vec<Hotspot>,
    pub error: Option<String>,
}

impl<'a> RunReport<'a> {
    pub fn new(
        input: impl Into<String>,
        config: &'a SimulationConfig,
        outcome: &'a SimulationOutcome,
        hotspot_tolerance_pct: f64,
    ) -> Self {
        let summary = DistributionSummary::from_result(&outcome.result, config.floor);
        let hotspots = summary.hotspots(hotspot_tolerance_pct);
        Self {
            input: input.into(),
            config,
            result: &outcome.result,
            summary,
            hotspot_tolerance_pct,
            hotspots,
            error: outcome.error.as_ref().map(ToString::to_string),
        }
    }

    fn overflowed(&self, partition: usize) -> bool {
        self.result.overflowed_partitions.contains(&partition)
    }
}

pub fn generate_console_report(out: &mut dyn Write, report: &RunReport<'_>) -> Result<()> {
    let result = report.result;
    let summary = &report.summary;

    writeln!(out)?;
    writeln!(out, "{}", "📊 Partition Load Summary".bright_cyan().bold())?;
    writeln!(out, "{}", "==========================".cyan())?;
    writeln!(out, "Input: {}", report.input)?;
    writeln!(
        out,
        "Documents processed: {}",
        format_thousands(i64::try_from(result.total_documents).unwrap_or(i64::MAX))
    )?;
    writeln!(out, "IDs created: {}", format_thousands(result.total_ids))?;
    writeln!(
        out,
        "Passes completed: {}/{}",
        result.iterations_completed, report.config.iterations
    )?;
    writeln!(
        out,
        "Partitions: {} ({} overflowed)",
        result.partition_counts.len(),
        result.overflowed_partitions.len()
    )?;
    writeln!(
        out,
        "Mean load: {:.1}  Std dev: {:.1}  CV: {:.3}  Imbalance: {:.3}",
        summary.mean,
        summary.std_dev,
        summary.coefficient_of_variation(),
        summary.imbalance
    )?;
    writeln!(out)?;

    for share in &summary.shares {
        let label = format!("Partition {:03}", share.partition);
        let line = format!(
            "{label}  {:>15}  {:>6.2}%  {:>+8.2}%",
            format_thousands(share.load),
            share.share_pct,
            share.deviation_pct
        );
        if share.overflowed {
            writeln!(out, "{} {}", line.red(), "exceeded maximum".red().bold())?;
        } else if share.deviation_pct > report.hotspot_tolerance_pct {
            writeln!(out, "{}", line.yellow())?;
        } else {
            writeln!(out, "{line}")?;
        }
    }
    writeln!(out)?;

    writeln!(
        out,
        "{}",
        format!(
            "🔥 Hotspots (> {:.1}% above mean)",
            report.hotspot_tolerance_pct
        )
        .bright_yellow()
        .bold()
    )?;
    if report.hotspots.is_empty() {
        writeln!(out, "   none")?;
    } else {
        for hot in &report.hotspots {
            writeln!(
                out,
                "   • Partition {:03}: {} ({:+.2}%)",
                hot.partition,
                format_thousands(hot.load),
                hot.deviation_pct
            )?;
        }
    }

    if !result.outliers.is_empty() {
        writeln!(out)?;
        writeln!(out, "{}", "Outliers skipped:".bright_white().bold())?;
        for notice in &result.outliers {
            writeln!(out, "   • {notice}")?;
        }
    }

    writeln!(out)?;
    match &report.error {
        None => writeln!(out, "{}", "✅ No partition exceeded its maximum".green())?,
        Some(message) => writeln!(out, "{} {}", "❌".red(), message.red())?,
    }
    Ok(())
}

pub fn generate_json_report(out: &mut dyn Write, report: &RunReport<'_>) -> Result<()> {
    let json_output = serde_json::to_string_pretty(report)?;
    writeln!(out, "{json_output}")?;
    Ok(())
}

pub fn generate_markdown_report(out: &mut dyn Write, report: &RunReport<'_>) -> Result<()> {
    let result = report.result;
    writeln!(out, "# Partition Hotspot Report\n")?;

    writeln!(out, "## Summary\n")?;
    writeln!(out, "- **Input**: `{}`", report.input)?;
    writeln!(out, "- **Partitions**: {}", result.partition_counts.len())?;
    writeln!(
        out,
        "- **Documents processed**: {}",
        format_thousands(i64::try_from(result.total_documents).unwrap_or(i64::MAX))
    )?;
    writeln!(
        out,
        "- **IDs created**: {}",
        format_thousands(result.total_ids)
    )?;
    writeln!(
        out,
        "- **Passes completed**: {}/{}",
        result.iterations_completed, report.config.iterations
    )?;
    writeln!(out, "- **Imbalance (max/mean)**: {:.3}", report.summary.imbalance)?;
    writeln!(
        out,
        "- **Coefficient of variation**: {:.3}",
        report.summary.coefficient_of_variation()
    )?;
    match &report.error {
        None => writeln!(out, "- **Status**: ✅ ok\n")?,
        Some(message) => writeln!(out, "- **Status**: ❌ {message}\n")?,
    }

    writeln!(out, "## Partitions\n")?;
    writeln!(out, "| Partition | Load | Share | Deviation | Overflowed |")?;
    writeln!(out, "|---|---:|---:|---:|:---:|")?;
    for share in &report.summary.shares {
        writeln!(
            out,
            "| {:03} | {} | {:.2}% | {:+.2}% | {} |",
            share.partition,
            format_thousands(share.load),
            share.share_pct,
            share.deviation_pct,
            if report.overflowed(share.partition) {
                "❌"
            } else {
                ""
            }
        )?;
    }
    writeln!(out)?;

    writeln!(
        out,
        "## Hotspots (> {:.1}% above mean)\n",
        report.hotspot_tolerance_pct
    )?;
    if report.hotspots.is_empty() {
        writeln!(out, "_None._")?;
    } else {
        for hot in &report.hotspots {
            writeln!(
                out,
                "- Partition {:03}: {} ({:+.2}%)",
                hot.partition,
                format_thousands(hot.load),
                hot.deviation_pct
            )?;
        }
    }

    if !result.outliers.is_empty() {
        writeln!(out, "\n## Outliers\n")?;
        for notice in &result.outliers {
            writeln!(out, "- {notice}")?;
        }
    }
    Ok(())
}
