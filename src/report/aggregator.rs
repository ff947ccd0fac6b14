use indexmap::IndexMap;
use rayon::{iter::ParallelIterator, slice::ParallelSlice};

use crate::report::{context::ExecutionContext, ReportError, ResultRow};

/// Tabular capability the aggregation runs against.
///
/// The loaded columnar table implements this over the mmap; tests implement
/// it over a plain vector.
pub trait BingeSource {
    /// Group key and binge flag for every record, in input order.
    fn keyed_flags(&self) -> Result<Vec<(&str, bool)>, ReportError>;
}

#[derive(Debug, Clone, Copy, Default)]
struct GroupTally {
    binge: u64,
    total: u64,
}

/// Computes per age group the binge-watcher count and the percentage of the
/// group's records that were binge-watched.
///
/// Grouping runs one pass with two running tallies per key (binge count and
/// total count). Only groups with at least one binge-watched record are
/// emitted, matching an inner join of binge counts against group totals on
/// the group key: a group where every flag is false drops out entirely
/// rather than appearing with a zero percentage.
///
/// Rows come out in first-seen order of the group key in the input, which
/// keeps output deterministic for a fixed input regardless of how many
/// workers tallied it.
pub fn binge_patterns<S: BingeSource>(
    ctx: &ExecutionContext,
    source: &S,
) -> Result<Vec<ResultRow>, ReportError> {
    let pairs = source.keyed_flags()?;
    let tallies = ctx.install(|| tally_groups(&pairs));

    let mut rows = Vec::with_capacity(tallies.len());
    for (key, tally) in tallies {
        if tally.binge == 0 {
            continue;
        }
        // total >= binge >= 1 by construction, so the division is safe
        let percentage = round2(tally.binge as f64 / tally.total as f64 * 100.0);
        rows.push(ResultRow {
            age_group: key.to_string(),
            binge_watchers: tally.binge,
            percentage,
        });
    }
    Ok(rows)
}

/// One pass over the records, data-parallel across contiguous slices.
///
/// Per-slice tallies are merged in slice order, so the merged map's
/// insertion order is the first-seen order of each key in the input.
fn tally_groups<'a>(pairs: &[(&'a str, bool)]) -> IndexMap<&'a str, GroupTally> {
    if pairs.is_empty() {
        return IndexMap::new();
    }

    let slice_len = pairs.len().div_ceil(rayon::current_num_threads()).max(1);
    let locals: Vec<IndexMap<&str, GroupTally>> = pairs
        .par_chunks(slice_len)
        .map(|slice| {
            let mut local: IndexMap<&str, GroupTally> = IndexMap::new();
            for &(key, flag) in slice {
                let tally = local.entry(key).or_default();
                tally.total += 1;
                if flag {
                    tally.binge += 1;
                }
            }
            local
        })
        .collect();

    let mut merged: IndexMap<&str, GroupTally> = IndexMap::new();
    for local in locals {
        for (key, tally) in local {
            let entry = merged.entry(key).or_default();
            entry.binge += tally.binge;
            entry.total += tally.total;
        }
    }
    merged
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MemTable(Vec<(String, bool)>);

    impl MemTable {
        fn new(rows: &[(&str, bool)]) -> Self {
            MemTable(rows.iter().map(|&(k, b)| (k.to_string(), b)).collect())
        }
    }

    impl BingeSource for MemTable {
        fn keyed_flags(&self) -> Result<Vec<(&str, bool)>, ReportError> {
            Ok(self.0.iter().map(|(k, b)| (k.as_str(), *b)).collect())
        }
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(Some(2)).unwrap()
    }

    #[test]
    fn test_mixed_groups() {
        let table = MemTable::new(&[
            ("Teen", true),
            ("Teen", false),
            ("Adult", true),
            ("Adult", true),
        ]);
        let rows = binge_patterns(&ctx(), &table).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].age_group, "Teen");
        assert_eq!(rows[0].binge_watchers, 1);
        assert_eq!(rows[0].percentage, 50.0);
        assert_eq!(rows[1].age_group, "Adult");
        assert_eq!(rows[1].binge_watchers, 2);
        assert_eq!(rows[1].percentage, 100.0);
    }

    #[test]
    fn test_zero_binge_group_excluded() {
        let table = MemTable::new(&[
            ("Senior", false),
            ("Senior", false),
            ("Senior", false),
            ("Teen", true),
        ]);
        let rows = binge_patterns(&ctx(), &table).unwrap();
        assert!(rows.iter().all(|r| r.age_group != "Senior"));
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_empty_input() {
        let table = MemTable::new(&[]);
        let rows = binge_patterns(&ctx(), &table).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_rounding_two_decimals() {
        let table = MemTable::new(&[("Adult", true), ("Adult", false), ("Adult", false)]);
        let rows = binge_patterns(&ctx(), &table).unwrap();
        // 1/3 * 100 = 33.333... rounds to 33.33
        assert_eq!(rows[0].percentage, 33.33);
    }

    #[test]
    fn test_first_seen_order() {
        let table = MemTable::new(&[
            ("Senior", true),
            ("Teen", true),
            ("Adult", true),
            ("Teen", true),
        ]);
        let rows = binge_patterns(&ctx(), &table).unwrap();
        let order: Vec<&str> = rows.iter().map(|r| r.age_group.as_str()).collect();
        assert_eq!(order, vec!["Senior", "Teen", "Adult"]);
    }

    #[test]
    fn test_tally_invariants() {
        let pairs = vec![
            ("Teen", true),
            ("Teen", false),
            ("Adult", false),
            ("Senior", true),
            ("Teen", true),
        ];
        let tallies = tally_groups(&pairs);
        // grouping totals cover every record
        let total: u64 = tallies.values().map(|t| t.total).sum();
        assert_eq!(total as usize, pairs.len());
        // binge counts never exceed group totals
        assert!(tallies.values().all(|t| t.binge <= t.total));
    }

    #[test]
    fn test_percentage_bounds() {
        let table = MemTable::new(&[
            ("A", true),
            ("B", true),
            ("B", false),
            ("C", true),
            ("C", false),
            ("C", false),
            ("C", false),
        ]);
        let rows = binge_patterns(&ctx(), &table).unwrap();
        for row in &rows {
            assert!(row.percentage > 0.0 && row.percentage <= 100.0);
            // rounded to exactly two decimals
            assert_eq!(round2(row.percentage), row.percentage);
        }
    }

    #[test]
    fn test_deterministic_across_thread_counts() {
        let rows: Vec<(&str, bool)> = (0..1000)
            .map(|i| {
                let key = match i % 4 {
                    0 => "Teen",
                    1 => "Adult",
                    2 => "Senior",
                    _ => "Child",
                };
                (key, i % 3 == 0)
            })
            .collect();
        let table = MemTable::new(&rows);

        let one = binge_patterns(&ExecutionContext::new(Some(1)).unwrap(), &table).unwrap();
        let many = binge_patterns(&ExecutionContext::new(Some(8)).unwrap(), &table).unwrap();
        assert_eq!(one, many);
    }
}
