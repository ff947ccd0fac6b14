//! # binge_report
//!
//! `binge_report` is a batch report generator over movie-ratings CSV data.
//! It computes, per demographic age group, how many viewing records were
//! binge-watched and what percentage of the group's records that represents,
//! then writes the result as a single CSV artifact.
//!
//! The pipeline is Loader → Aggregator → Writer:
//!
//! - Memory-mapped CSV loading against a fixed 13-column schema
//! - Parallel chunked parsing and group tallying with Rayon
//! - Deterministic first-seen group ordering in the output
//! - Atomic single-file output (staged and renamed over the destination)
//!
//! # Example
//!
//! ```no_run
//! use binge_report::report::{self, context::ExecutionContext};
//! use std::path::Path;
//!
//! fn main() -> Result<(), binge_report::report::ReportError> {
//!     let ctx = ExecutionContext::new(None)?;
//!     let summary = report::run(
//!         &ctx,
//!         Path::new("input/movie_ratings_data.csv"),
//!         Path::new("outputs/binge_watching_patterns.csv"),
//!     )?;
//!     println!("{} groups reported", summary.groups_reported);
//!     Ok(())
//! }
//! ```

pub mod report;
