mod progress;
mod reports;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write, stdout};
use std::path::{Path, PathBuf};

use hotspot_core::{CsvSource, RecordSource, Simulation, SimulationConfig, SimulationOutcome};
use progress::TerminalProgress;
use reports::RunReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Colored summary for a terminal
    Console,
    /// Machine-readable result, summary and hotspots
    Json,
    /// Markdown tables
    Markdown,
}

#[derive(Debug, Parser)]
#[command(name = "hotspot-sim", version)]
#[command(
    about = "Replay a keyed CSV through the Postgres partition hash and report the load per partition"
)]
struct Args {
    /// CSV file to process: a header row, then `DocumentID,count` rows
    #[arg(long)]
    file: PathBuf,

    /// Number of partitions
    #[arg(long)]
    partitions: Option<usize>,

    /// Maximum value for each partition
    #[arg(long, allow_negative_numbers = true)]
    max: Option<i64>,

    /// Minimum (starting) value for each partition
    #[arg(long, allow_negative_numbers = true)]
    min: Option<i64>,

    /// Number of passes over the file
    #[arg(long)]
    iterations: Option<usize>,

    /// Counts above this are reported once and left out of the partitions
    #[arg(long, allow_negative_numbers = true)]
    outlier: Option<i64>,

    /// JSON file with simulation settings; flags given here override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Console)]
    report: ReportFormat,

    /// Optional path to write the report to instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Percent above the mean load at which a partition counts as a hotspot
    #[arg(long, default_value_t = 5.0)]
    hotspot_tolerance: f64,

    /// Hide progress bars and the banner
    #[arg(short, long)]
    quiet: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = resolve_config(&args)?;
    if !args.quiet {
        announce_banner(&args.file, &config);
    }

    let mut source = open_source(&args.file)?;
    let outcome = run_simulation(config, &mut source, args.quiet)?;

    write_reports(&args, &config, &outcome)?;

    if let Some(err) = &outcome.error {
        eprintln!("{} {err}", "Error processing CSV:".red().bold());
        std::process::exit(1);
    }

    Ok(())
}

fn announce_banner(file: &Path, config: &SimulationConfig) {
    eprintln!("{}", "🔥 Partition Hotspot Simulator".bright_cyan().bold());
    eprintln!("{}", "================================".cyan());
    eprintln!(
        "{} partitions, range {}..={}, {} pass(es) over {}",
        config.partitions,
        config.floor,
        config.capacity,
        config.iterations,
        file.display()
    );
}

/// Defaults, then the JSON config file, then explicit flags.
fn resolve_config(args: &Args) -> Result<SimulationConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            SimulationConfig::from_json(&text)
                .with_context(|| format!("failed to parse {}", path.display()))?
        }
        None => SimulationConfig::default(),
    };

    if let Some(partitions) = args.partitions {
        config.partitions = partitions;
    }
    if let Some(max) = args.max {
        config.capacity = max;
    }
    if let Some(min) = args.min {
        config.floor = min;
    }
    if let Some(iterations) = args.iterations {
        config.iterations = iterations;
    }
    if let Some(outlier) = args.outlier {
        config.outlier_threshold = outlier;
    }

    config.validate().context("invalid simulation settings")?;
    if args.verbose {
        eprintln!("⚙️  {config:?}");
    }
    Ok(config)
}

fn open_source(path: &Path) -> Result<CsvSource<BufReader<File>>> {
    let file =
        File::open(path).with_context(|| format!("Error opening file: {}", path.display()))?;
    CsvSource::new(BufReader::new(file))
        .with_context(|| format!("failed to measure {}", path.display()))
}

fn run_simulation<R: RecordSource>(
    config: SimulationConfig,
    source: &mut R,
    quiet: bool,
) -> Result<SimulationOutcome> {
    let mut progress = TerminalProgress::new(&config, source.total_len(), quiet);
    let outcome = Simulation::new(config)?.run(source, &mut progress);
    progress.finish();
    Ok(outcome)
}

fn write_reports(args: &Args, config: &SimulationConfig, outcome: &SimulationOutcome) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;
    let report = RunReport::new(
        args.file.display().to_string(),
        config,
        outcome,
        args.hotspot_tolerance,
    );

    match args.report {
        ReportFormat::Json => reports::generate_json_report(output_target.writer(), &report)?,
        ReportFormat::Markdown => {
            reports::generate_markdown_report(output_target.writer(), &report)?;
        }
        ReportFormat::Console => reports::generate_console_report(output_target.writer(), &report)?,
    }

    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}
