//! Checks a file of SQL answers against the reference queries.

use std::io::{stdout, IsTerminal};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use sql_checker::{
    read_queries, Checker, CheckerConfig, GeneratorConfig, RunReport, SqliteEngine,
};

/// Differential checker for the real estate SQL problems.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// File with the numbered queries (`1.---` ... `---`).
    queries: PathBuf,

    /// Check only this query.
    index: Option<usize>,

    /// Number of random datasets per query.
    #[arg(short = 'n', long, default_value_t = 10)]
    trials: usize,

    /// Replay a single trial per query with this seed.
    #[arg(short, long)]
    seed: Option<u64>,

    /// Seed of the generator the trial seeds are drawn from.
    #[arg(long)]
    master_seed: Option<u64>,

    /// Where the dataset of a failing trial is written.
    #[arg(long, default_value = "debug.db")]
    debug_db: PathBuf,

    /// Where the answers of a failing trial are written.
    #[arg(long, default_value = "debug.txt")]
    debug_answers: PathBuf,

    /// Schema script to use instead of the built-in one.
    #[arg(long)]
    schema: Option<PathBuf>,

    /// Write a JSON report of the run to this path.
    #[arg(long)]
    report: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let mut subscriber = tracing_subscriber::fmt().with_env_filter(
        tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
    );
    if !stdout().is_terminal() {
        subscriber = subscriber.with_ansi(false)
    }
    subscriber.init();

    let queries = read_queries(&args.queries)
        .with_context(|| format!("failed to load queries from {}", args.queries.display()))?;

    let engine = match &args.schema {
        Some(path) => SqliteEngine::from_schema_file(path)
            .with_context(|| format!("failed to load schema from {}", path.display()))?,
        None => SqliteEngine::new(),
    };

    let config = CheckerConfig {
        trials: args.trials,
        seed: args.seed,
        master_seed: args.master_seed,
        debug_db: args.debug_db.clone(),
        debug_answers: args.debug_answers.clone(),
        generator: GeneratorConfig::default(),
    };
    tracing::debug!("Starting sql-checker with config: {:?}", config);

    let checker = Checker::new(config, engine).context("invalid checker configuration")?;
    let (summary, result) = checker.run_with_summary(&queries, args.index);
    let failure = result.err();

    if let Some(path) = &args.report {
        RunReport::new(&summary, failure.as_ref(), &queries)
            .write(path)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
    }

    summary.print_table(failure.as_ref());

    if let Some(err) = failure {
        tracing::error!("{err}");
        std::process::exit(1);
    }
    Ok(())
}
