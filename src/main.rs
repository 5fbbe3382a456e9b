use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use counter_race::harness::{self, HarnessConfig, Report, Strategy, TrialSummary};
use counter_race::Variant;
use serde::Serialize;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Spawn workers that each increment a shared counter once and report what
/// the counter ends up holding.
#[derive(Debug, Parser)]
#[command(name = "counter-race", version, about)]
struct Cli {
    /// Counter implementation to exercise
    #[arg(long, value_enum, default_value_t = Variant::Locked)]
    variant: Variant,

    /// Number of workers, each incrementing once
    #[arg(short, long, env = "COUNTER_WORKERS", default_value_t = harness::DEFAULT_WORKERS)]
    workers: usize,

    /// Number of independent runs, each on a fresh counter
    #[arg(short, long, default_value_t = 1)]
    trials: usize,

    /// How workers are scheduled
    #[arg(long, value_enum, default_value_t = Strategy::Threads)]
    strategy: Strategy,

    /// Thread count for the tokio and pool strategies
    #[arg(long, env = "COUNTER_THREADS")]
    threads: Option<usize>,

    /// Milliseconds each worker sleeps before incrementing
    #[arg(long, env = "COUNTER_START_DELAY_MS", default_value_t = 10)]
    start_delay_ms: u64,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Debug, Serialize)]
struct Output {
    variant: Variant,
    strategy: Strategy,
    #[serde(flatten)]
    outcome: Outcome,
}

/// A single run reports itself; repeated runs report their aggregate.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum Outcome {
    Report(Report),
    Summary(TrialSummary),
}

impl Outcome {
    fn workers(&self) -> usize {
        match self {
            Outcome::Report(report) => report.workers,
            Outcome::Summary(summary) => summary.workers,
        }
    }

    fn worst_loss(&self) -> u64 {
        match self {
            Outcome::Report(report) => report.lost_updates(),
            Outcome::Summary(summary) => summary.worst_loss(),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = HarnessConfig::default()
        .with_workers(cli.workers)
        .with_strategy(cli.strategy)
        .with_start_delay(Duration::from_millis(cli.start_delay_ms));
    config.threads = cli.threads;

    let variant = cli.variant;
    let outcome = if cli.trials == 1 {
        harness::run(&variant.build(), &config).map(Outcome::Report)
    } else {
        harness::run_trials(|| variant.build(), &config, cli.trials).map(Outcome::Summary)
    }
    .with_context(|| format!("running {variant} counter with {} workers", config.workers))?;

    match cli.format {
        Format::Text => print_text(variant, &outcome),
        Format::Json => {
            let output = Output {
                variant,
                strategy: config.strategy,
                outcome,
            };
            let json = serde_json::to_string_pretty(&output).context("serializing outcome")?;
            println!("{json}");
            return check(variant, &output.outcome);
        }
    }
    check(variant, &outcome)
}

/// Fail when a counter that promises exact counts lost an increment.
fn check(variant: Variant, outcome: &Outcome) -> Result<()> {
    let lost = outcome.worst_loss();
    if variant.is_synchronized() && lost > 0 {
        bail!(
            "{variant} counter lost up to {lost} of {} increments",
            outcome.workers()
        );
    }
    Ok(())
}

fn print_text(variant: Variant, outcome: &Outcome) {
    match outcome {
        Outcome::Report(report) => {
            println!("COUNT = {} (expected = {})", report.final_count, report.workers)
        }
        Outcome::Summary(summary) => println!(
            "{variant}: {}/{} trials exact, count range {}..={} (expected = {})",
            summary.exact_trials, summary.trials, summary.min, summary.max, summary.workers
        ),
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
