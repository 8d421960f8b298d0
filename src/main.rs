use anyhow::Context;
use clap::{Parser, Subcommand};
use netmetrics::config::load_config;
use netmetrics::{EventStore, NetworkMetricsAggregator, ReportScope};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, trace};

/// File name of the consolidated report
const REPORT_FILE: &str = "network-metrics.json";
/// File name of the consolidated event log written with `--write-events`
const MERGED_EVENTS_FILE: &str = "network-metrics-events.json";

/// Aggregate network request metrics collected by test workers
#[derive(Parser)]
#[command(name = "netmetrics")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge per-worker event files into one report
    Merge {
        /// Directory containing `*.events.json` files
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write the report (default: configured output dir)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Path to configuration file (toml, yaml or json)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Report scope: run, spec, test, run+spec or run+test
        #[arg(long)]
        scope: Option<ReportScope>,

        /// Number of contributors listed per entry
        #[arg(long)]
        top_n: Option<usize>,

        /// Also write the consolidated event log
        #[arg(long)]
        write_events: bool,
    },
    /// Validate a configuration file
    CheckConfig {
        /// Path to configuration file
        path: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .with_target(cli.verbose >= 2) // Show target module for -vv and above
        .with_thread_ids(cli.verbose >= 3) // Show thread IDs for -vvv
        .with_line_number(cli.verbose >= 3) // Show line numbers for -vvv
        .init();

    debug!("netmetrics started with verbosity level: {}", cli.verbose);
    trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());

    let result = match cli.command {
        Commands::Merge {
            input,
            output_dir,
            config,
            scope,
            top_n,
            write_events,
        } => run_merge(
            &input,
            output_dir,
            config.as_deref(),
            scope,
            top_n,
            write_events,
        ),
        Commands::CheckConfig { path } => run_check_config(&path),
    };

    if let Err(e) = result {
        error!("Fatal error: {:#}", e);
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run_merge(
    input: &Path,
    output_dir: Option<PathBuf>,
    config_path: Option<&Path>,
    scope: Option<ReportScope>,
    top_n: Option<usize>,
    write_events: bool,
) -> anyhow::Result<()> {
    let mut config = load_config(config_path).context("Failed to load configuration")?;
    if let Some(scope) = scope {
        config.report_scope = scope;
    }
    if let Some(top_n) = top_n {
        config.top_n = top_n;
    }
    if let Some(dir) = output_dir {
        config.output_dir = dir;
    }
    let output_dir = config.output_dir.clone();

    let mut aggregator = NetworkMetricsAggregator::new(config);
    let summary = EventStore::new(input)
        .load_into(&mut aggregator)
        .with_context(|| format!("Failed to read event files from {}", input.display()))?;

    let report = aggregator.export_report();
    let out = EventStore::new(&output_dir);
    let report_path = output_dir.join(REPORT_FILE);
    out.write_json(&report_path, &report)
        .with_context(|| format!("Failed to write {}", report_path.display()))?;
    info!("Report written to {}", report_path.display());

    if write_events {
        let events_path = output_dir.join(MERGED_EVENTS_FILE);
        let envelope = netmetrics::EventEnvelope::new(aggregator.export_events());
        out.write_json(&events_path, &envelope)
            .with_context(|| format!("Failed to write {}", events_path.display()))?;
        info!("Event log written to {}", events_path.display());
    }

    println!(
        "Merged {} files ({} skipped): {} requests, {:.1}ms total",
        summary.files_read,
        summary.files_skipped,
        report.totals.total_requests,
        report.totals.total_duration_ms
    );
    println!("Report: {}", report_path.display());
    Ok(())
}

fn run_check_config(path: &Path) -> anyhow::Result<()> {
    let config = load_config(Some(path))
        .with_context(|| format!("Invalid configuration {}", path.display()))?;
    println!("Configuration OK: {}", path.display());
    println!("  report scope: {}", config.report_scope);
    println!("  top N: {}", config.top_n);
    match config.max_samples_per_key {
        Some(max) => println!("  max samples per key: {max}"),
        None => println!("  max samples per key: unbounded"),
    }
    println!("  route rules: {}", config.route_rules.len());
    Ok(())
}
