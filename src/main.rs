use clap::Parser;
use jemallocator::Jemalloc;
use std::path::PathBuf;
use tracing::{error, info};

use binge_report::report::{self, context::ExecutionContext};

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

/// Batch report of binge-watching percentages per age group.
#[derive(Parser, Debug)]
#[command(name = "binge_report", version)]
struct Cli {
    /// Path to the movie ratings CSV
    #[arg(long, default_value = "input/movie_ratings_data.csv")]
    input: PathBuf,

    /// Destination for the report CSV (overwritten if present)
    #[arg(long, default_value = "outputs/binge_watching_patterns.csv")]
    output: PathBuf,

    /// Worker threads for parsing and aggregation (default: all cores)
    #[arg(long)]
    threads: Option<usize>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
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
        .with_target(cli.verbose >= 2)
        .init();

    let result = ExecutionContext::new(cli.threads)
        .and_then(|ctx| report::run(&ctx, &cli.input, &cli.output));

    match result {
        Ok(summary) => info!(
            rows = summary.rows_loaded,
            groups = summary.groups_reported,
            output = %summary.output_path.display(),
            "binge-watching report complete"
        ),
        Err(err) => {
            error!("{err}");
            std::process::exit(1);
        }
    }
}
