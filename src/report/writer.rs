use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::report::{ReportError, ResultRow};

/// Header of the output artifact.
pub const OUTPUT_HEADER: &str = "AgeGroup,BingeWatchers,Percentage";

/// Serializes the result rows as a single CSV file at `path`, replacing any
/// existing artifact.
///
/// The file is staged in the destination directory and renamed into place,
/// so the destination either holds the complete report or is untouched.
/// Missing parent directories are created.
///
/// # Errors
/// [`ReportError::WriteFailure`] with the destination path on any IO failure.
pub fn write_report(rows: &[ResultRow], path: &Path) -> Result<(), ReportError> {
    let fail = |source: std::io::Error| ReportError::WriteFailure {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(fail)?;

    let mut staged = NamedTempFile::new_in(parent).map_err(fail)?;
    writeln!(staged, "{OUTPUT_HEADER}").map_err(fail)?;
    for row in rows {
        writeln!(
            staged,
            "{},{},{}",
            row.age_group,
            row.binge_watchers,
            format_percentage(row.percentage)
        )
        .map_err(fail)?;
    }
    staged.flush().map_err(fail)?;
    staged.persist(path).map_err(|e| fail(e.error))?;

    debug!(rows = rows.len(), path = %path.display(), "report serialized");
    Ok(())
}

/// Renders a two-decimal percentage the way the report's consumers expect:
/// trailing zeros trimmed, but always at least one decimal digit
/// (`50.0`, `100.0`, `33.33`).
fn format_percentage(value: f64) -> String {
    let mut s = format!("{value:.2}");
    while s.ends_with('0') && !s.ends_with(".0") {
        s.pop();
    }
    s
}
