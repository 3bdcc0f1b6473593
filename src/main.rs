mod config;
mod dataset;
mod error;
mod explore;
mod loader;
mod normalizer;
mod output;
mod record;
mod report;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{DEFAULT_INPUT_DIR, DEFAULT_OUTPUT_DIR, InputSource, RunConfig};
use crate::explore::ExploreOptions;
use crate::loader::LoadStats;
use crate::normalizer::{NormalizeOutcome, NormalizeReport};
use crate::output::OutputFormat;
use crate::record::Column;

#[derive(Parser, Debug)]
#[command(author, version, about = "Clean and explore equipment downtime logs", long_about = None)]
struct Args {
    /// Log at debug level (RUST_LOG still wins when set)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Normalize the downtime log and write clean_<file> to the output directory
    Clean {
        #[command(flatten)]
        source: SourceArgs,

        #[arg(short, long, default_value = "csv")]
        format: OutputFormat,

        #[arg(long)]
        stats: bool,
    },
    /// Filter the cleaned data and print summaries
    Explore {
        #[command(flatten)]
        source: SourceArgs,

        #[arg(long)]
        year: Option<i32>,

        #[arg(long)]
        dept: Option<String>,

        #[arg(long)]
        scheduled: Option<String>,

        /// Columns to show, comma separated
        #[arg(long, value_delimiter = ',')]
        columns: Vec<Column>,

        #[arg(long)]
        group_by: Option<Column>,

        /// Exclusive bounds for the minutes histogram
        #[arg(long, num_args = 2, value_names = ["LOW", "HIGH"])]
        minutes: Option<Vec<f64>>,

        /// Print the distinct cleaned values of one column and stop
        #[arg(long, value_name = "COLUMN")]
        distinct: Option<Column>,

        /// Also write the full cleaned data set, as `clean` does
        #[arg(long)]
        save: bool,
    },
}

#[derive(clap::Args, Debug)]
struct SourceArgs {
    /// Input CSV; when absent, the single .csv in --input-dir is used
    #[arg(short, long, value_name = "FILE")]
    input: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_INPUT_DIR)]
    input_dir: PathBuf,

    #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// Read at most this many rows
    #[arg(long)]
    nrows: Option<usize>,
}

impl SourceArgs {
    fn to_config(&self) -> RunConfig {
        let input = match &self.input {
            Some(file) => InputSource::File(file.clone()),
            None => InputSource::Dir(self.input_dir.clone()),
        };
        RunConfig {
            input,
            output_dir: self.output_dir.clone(),
            nrows: self.nrows,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    match args.command {
        Command::Clean {
            source,
            format,
            stats,
        } => run_clean(&source.to_config(), format, stats),
        Command::Explore {
            source,
            year,
            dept,
            scheduled,
            columns,
            group_by,
            minutes,
            distinct,
            save,
        } => {
            let config = source.to_config();
            if let Some(column) = distinct {
                return run_distinct(&config, column);
            }
            let options = ExploreOptions {
                year,
                dept,
                scheduled,
                columns,
                group_by,
                minutes: minutes.map(|m| (m[0], m[1])),
            };
            run_explore(&config, &options, save)
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();
}

fn load(config: &RunConfig) -> Result<(PathBuf, NormalizeOutcome, LoadStats)> {
    let input = config.resolve_input()?;
    let (outcome, stats) = loader::load_clean(&input, config.nrows)
        .with_context(|| format!("cleaning {}", input.display()))?;
    Ok((input, outcome, stats))
}

fn run_clean(config: &RunConfig, format: OutputFormat, stats: bool) -> Result<()> {
    let start_time = Instant::now();
    let (input, outcome, load_stats) = load(config)?;

    if outcome.dataset.is_empty() {
        warn!(input = %input.display(), "input has no data rows");
    }

    let path = config.output_path(&input, format.swapped_extension());
    output::export(&outcome.dataset, format, &path)?;

    if stats {
        print_run_stats(&load_stats, &outcome.report, start_time.elapsed());
    }
    Ok(())
}

fn run_explore(config: &RunConfig, options: &ExploreOptions, save: bool) -> Result<()> {
    let (input, outcome, _) = load(config)?;
    info!("Loading data...done!");

    let summary = explore::explore(&outcome.dataset, options)?;
    print!("{}", report::render(&summary));

    if save {
        save_clean(&outcome.dataset, config, &input)?;
        println!("Data has been successfully saved");
    }
    Ok(())
}

fn run_distinct(config: &RunConfig, column: Column) -> Result<()> {
    let (_, outcome, _) = load(config)?;
    for value in outcome.dataset.distinct(column) {
        println!("{value}");
    }
    Ok(())
}

fn save_clean(dataset: &dataset::CleanedDataset, config: &RunConfig, input: &Path) -> Result<()> {
    let format = OutputFormat::Csv;
    output::export(dataset, format, &config.output_path(input, format.swapped_extension()))?;
    Ok(())
}

fn print_run_stats(loaded: &LoadStats, report: &NormalizeReport, duration: Duration) {
    let duration_secs = duration.as_secs_f64();
    let file_size_mb = loaded.bytes as f64 / (1024.0 * 1024.0);

    eprintln!("\n=== RUN SUMMARY ===");
    eprintln!("File size: {:.2} MB", file_size_mb);
    eprintln!("Total lines: {}", loaded.lines);
    eprintln!("Rows cleaned: {}", report.rows);
    eprintln!("Sentinel values: {}", loaded.sentinel_fields);
    eprintln!("Unrecognized shifts: {}", report.unrecognized_shifts);
    eprintln!("Unparseable minutes: {}", report.unparseable_minutes);
    eprintln!("Rows without a date: {}", report.missing_dates);
    eprintln!("Fields emptied by cleaning: {}", report.emptied_fields);
    eprintln!("Processing time: {:.3}s", duration_secs);
    if duration_secs > 0.0 {
        eprintln!("Throughput: {:.0} rows/s", report.rows as f64 / duration_secs);
    }
}
