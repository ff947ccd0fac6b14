use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::report::context::ExecutionContext;

pub mod aggregator;
pub mod column;
pub mod context;
pub mod loader;
pub mod schema;
pub mod writer;

/// Error type used across the crate
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("dataset not found at {}", .path.display())]
    SourceNotFound { path: PathBuf },

    #[error("schema mismatch at line {line}, column {column}: {value:?} is not a valid {expected}")]
    SchemaMismatch {
        line: usize,
        column: String,
        value: String,
        expected: &'static str,
    },

    #[error("malformed input: {0}")]
    Malformed(String),

    #[error("failed to write {}: {source}", .path.display())]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("UTF8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("execution context error: {0}")]
    Context(String),
}

/// One output row: an age group that has at least one binge-watched record.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub age_group: String,
    pub binge_watchers: u64,
    pub percentage: f64,
}

/// What a completed run produced, for logging and callers.
#[derive(Debug, Clone)]
pub struct ReportSummary {
    pub rows_loaded: usize,
    pub groups_reported: usize,
    pub output_path: PathBuf,
}

/// Runs the full pipeline: load the ratings table, aggregate binge
/// percentages per age group, write the report.
///
/// A load error aborts before anything is written; the output either exists
/// complete or not at all.
///
/// # Errors
/// Propagates [`ReportError`] from any stage.
pub fn run(
    ctx: &ExecutionContext,
    input: &Path,
    output: &Path,
) -> Result<ReportSummary, ReportError> {
    let table = loader::load_ratings(ctx, input)?;
    debug!(rows = table.row_count(), "ratings table loaded");

    let rows = aggregator::binge_patterns(ctx, &table)?;
    debug!(groups = rows.len(), "binge patterns aggregated");

    writer::write_report(&rows, output)?;
    info!(output = %output.display(), "report written");

    Ok(ReportSummary {
        rows_loaded: table.row_count(),
        groups_reported: rows.len(),
        output_path: output.to_path_buf(),
    })
}
