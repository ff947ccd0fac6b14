use memchr::{memchr, memchr_iter};
use memmap2::Mmap;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use std::{fs::File, path::Path};
use tracing::debug;

use crate::report::{
    aggregator::BingeSource,
    column::Column,
    context::ExecutionContext,
    schema::{parse_bool, ColumnType, BINGE_FLAG_COLUMN, GROUP_KEY_COLUMN, RATINGS_SCHEMA},
    ReportError,
};

/// The loaded ratings dataset.
///
/// Columns follow [`RATINGS_SCHEMA`] order; string cells index into the
/// memory-mapped source, which the table keeps alive.
#[derive(Debug)]
pub struct RatingsTable {
    mmap: Mmap,
    columns: Vec<Column>,
    row_count: usize,
}

impl RatingsTable {
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column(&self, name: &str) -> Result<&Column, ReportError> {
        let pos = RATINGS_SCHEMA
            .iter()
            .position(|(n, _)| *n == name)
            .ok_or_else(|| ReportError::Malformed(format!("unknown column {name}")))?;
        Ok(&self.columns[pos])
    }

    /// Slice of the mapped source for a string cell's offsets.
    pub fn slice_bytes(&self, start: usize, end: usize) -> Result<&[u8], ReportError> {
        if end > self.mmap.len() || start > end {
            return Err(ReportError::Malformed("invalid byte range".into()));
        }
        Ok(&self.mmap[start..end])
    }
}

impl BingeSource for RatingsTable {
    fn keyed_flags(&self) -> Result<Vec<(&str, bool)>, ReportError> {
        let keys = self.column(GROUP_KEY_COLUMN)?;
        let flags = self.column(BINGE_FLAG_COLUMN)?;

        let mut out = Vec::with_capacity(self.row_count);
        for ((start, end), flag) in keys.iter_str().zip(flags.iter_bool()) {
            let bytes = self.slice_bytes(start, end)?;
            out.push((std::str::from_utf8(bytes)?, flag));
        }
        Ok(out)
    }
}

/// Loads the movie ratings CSV into a typed columnar table.
///
/// The first row is a header: its field count is validated against the
/// 13-column schema and it is otherwise skipped. Data lines are split at
/// newline boundaries into one chunk per worker and parsed in parallel on
/// the context's pool.
///
/// Coercion is fail-fast: the first field in file order that does not parse
/// under its declared type aborts the load. String fields must be valid
/// UTF-8; later stages read string cells straight from the mmap without
/// re-validating.
///
/// # Errors
/// - [`ReportError::SourceNotFound`] if `path` does not resolve
/// - [`ReportError::Malformed`] for a wrong header or field count
/// - [`ReportError::SchemaMismatch`] for a field that fails coercion
pub fn load_ratings(ctx: &ExecutionContext, path: &Path) -> Result<RatingsTable, ReportError> {
    if !path.exists() {
        return Err(ReportError::SourceNotFound {
            path: path.to_path_buf(),
        });
    }

    let file = File::open(path)?;
    let mmap = unsafe { Mmap::map(&file)? };
    let buf: &[u8] = &mmap[..];

    // Parse header
    let header_end = memchr(b'\n', buf).unwrap_or(buf.len());
    let header_line = trim_cr(&buf[..header_end]);
    let header_fields = header_line.split(|&b| b == b',').count();
    if header_fields != RATINGS_SCHEMA.len() {
        return Err(ReportError::Malformed(format!(
            "expected {} columns in header, got {}",
            RATINGS_SCHEMA.len(),
            header_fields
        )));
    }

    let data_start = (header_end + 1).min(buf.len());
    let data = &buf[data_start..];

    let num_threads = ctx.threads();
    let chunks = find_chunk_boundaries(data, num_threads);

    // Estimate rows per chunk for preallocation
    let estimated_rows_per_chunk = {
        let avg_line_len = memchr(b'\n', data).unwrap_or(data.len()) + 1;
        (data.len() / num_threads / avg_line_len) + 128
    };

    let results: Vec<Result<ChunkBatch, RowError>> = ctx.install(|| {
        chunks
            .par_iter()
            .map(|&(start, end)| {
                parse_chunk(
                    &data[start..end],
                    data_start + start, // absolute offset in file
                    estimated_rows_per_chunk,
                )
            })
            .collect()
    });

    // Merge batch results into chunked columns, in chunk order
    let mut columns: Vec<Column> = RATINGS_SCHEMA
        .iter()
        .map(|&(_, column_type)| Column::new_for(column_type))
        .collect();

    let mut total_rows = 0;
    let mut total_lines = 0;
    for result in results {
        let mut batch = match result {
            Ok(batch) => batch,
            // The first failing chunk in file order: every earlier chunk
            // parsed clean, so the running line total fixes the line number.
            Err(err) => return Err(err.into_report_error(total_lines)),
        };
        total_rows += batch.row_count;
        total_lines += batch.line_count;

        for (col_idx, column) in columns.iter_mut().enumerate() {
            match column {
                Column::Int64(chunks) => chunks.push(std::mem::take(&mut batch.int64[col_idx])),
                Column::Float64(chunks) => {
                    chunks.push(std::mem::take(&mut batch.float64[col_idx]))
                }
                Column::Bool(chunks) => chunks.push(std::mem::take(&mut batch.bools[col_idx])),
                Column::Str(chunks) => chunks.push(std::mem::take(&mut batch.strs[col_idx])),
            }
        }
    }

    debug!(rows = total_rows, chunks = chunks.len(), "parsed ratings CSV");

    Ok(RatingsTable {
        mmap,
        columns,
        row_count: total_rows,
    })
}

fn trim_cr(line: &[u8]) -> &[u8] {
    match line.last() {
        Some(&b'\r') => &line[..line.len() - 1],
        _ => line,
    }
}

fn find_chunk_boundaries(data: &[u8], num_chunks: usize) -> Vec<(usize, usize)> {
    if data.is_empty() {
        return vec![];
    }

    let chunk_size = data.len() / num_chunks;
    let mut boundaries = Vec::with_capacity(num_chunks);
    let mut start = 0;

    for i in 0..num_chunks - 1 {
        let mut end = (i + 1) * chunk_size;

        // Find next newline
        while end < data.len() && data[end] != b'\n' {
            end += 1;
        }

        if end < data.len() {
            end += 1; // Include the newline
        }

        if start < end {
            boundaries.push((start, end));
        }
        start = end;
    }

    // Last chunk gets everything remaining
    if start < data.len() {
        boundaries.push((start, data.len()));
    }

    boundaries
}

/// Parsed column data for one chunk; inner vecs are indexed by schema
/// position, with non-matching types left empty.
struct ChunkBatch {
    int64: Vec<Vec<i64>>,
    float64: Vec<Vec<f64>>,
    bools: Vec<Vec<bool>>,
    strs: Vec<Vec<(usize, usize)>>,
    row_count: usize,
    /// Physical lines consumed, blank lines included, so error line numbers
    /// in later chunks stay exact.
    line_count: usize,
}

enum RowErrorKind {
    FieldCount(usize),
    Coerce {
        column: &'static str,
        value: String,
        expected: &'static str,
    },
}

struct RowError {
    /// 0-based physical line within the chunk, blank lines included.
    local_line: usize,
    kind: RowErrorKind,
}

impl RowError {
    /// Converts to a [`ReportError`] with an absolute 1-based file line,
    /// given the physical lines parsed before this chunk (the header is
    /// line 1).
    fn into_report_error(self, lines_before: usize) -> ReportError {
        let line = lines_before + self.local_line + 2;
        match self.kind {
            RowErrorKind::FieldCount(got) => ReportError::Malformed(format!(
                "line {line}: expected {} fields, got {got}",
                RATINGS_SCHEMA.len()
            )),
            RowErrorKind::Coerce {
                column,
                value,
                expected,
            } => ReportError::SchemaMismatch {
                line,
                column: column.to_string(),
                value,
                expected,
            },
        }
    }
}

fn coerce_error(local_line: usize, column: &'static str, value: &[u8], t: ColumnType) -> RowError {
    RowError {
        local_line,
        kind: RowErrorKind::Coerce {
            column,
            value: String::from_utf8_lossy(value).to_string(),
            expected: t.name(),
        },
    }
}

// Pre-allocate only the vec that matches the column's type.
fn alloc_for<T>(matches: bool, estimated_rows: usize) -> Vec<T> {
    if matches {
        Vec::with_capacity(estimated_rows)
    } else {
        Vec::new()
    }
}

fn parse_chunk(
    chunk: &[u8],
    chunk_offset: usize, // absolute offset of this chunk in the file
    estimated_rows: usize,
) -> Result<ChunkBatch, RowError> {
    let num_cols = RATINGS_SCHEMA.len();

    let mut int64: Vec<Vec<i64>> = RATINGS_SCHEMA
        .iter()
        .map(|&(_, t)| alloc_for(t == ColumnType::Int64, estimated_rows))
        .collect();
    let mut float64: Vec<Vec<f64>> = RATINGS_SCHEMA
        .iter()
        .map(|&(_, t)| alloc_for(t == ColumnType::Float64, estimated_rows))
        .collect();
    let mut bools: Vec<Vec<bool>> = RATINGS_SCHEMA
        .iter()
        .map(|&(_, t)| alloc_for(t == ColumnType::Bool, estimated_rows))
        .collect();
    let mut strs: Vec<Vec<(usize, usize)>> = RATINGS_SCHEMA
        .iter()
        .map(|&(_, t)| alloc_for(t == ColumnType::Str, estimated_rows))
        .collect();

    let mut row_count = 0;
    let mut line_count = 0;
    let mut fields: Vec<&[u8]> = Vec::with_capacity(num_cols);

    // Iterate lines, including a final line without a trailing newline
    let mut pos = 0;
    while pos < chunk.len() {
        let line_end = memchr(b'\n', &chunk[pos..])
            .map(|i| pos + i)
            .unwrap_or(chunk.len());
        let line = trim_cr(&chunk[pos..line_end]);
        pos = line_end + 1;

        if line.is_empty() {
            // Blank lines carry no record but still occupy a file line
            line_count += 1;
            continue;
        }

        // Split line into fields
        fields.clear();
        let mut field_start = 0;
        for comma_pos in memchr_iter(b',', line) {
            fields.push(&line[field_start..comma_pos]);
            field_start = comma_pos + 1;
        }
        fields.push(&line[field_start..]);

        if fields.len() != num_cols {
            return Err(RowError {
                local_line: line_count,
                kind: RowErrorKind::FieldCount(fields.len()),
            });
        }

        // Coerce each field to its declared type
        for (col_idx, &(name, column_type)) in RATINGS_SCHEMA.iter().enumerate() {
            let field = fields[col_idx];
            match column_type {
                ColumnType::Int64 => match atoi_simd::parse::<i64>(field) {
                    Ok(value) => int64[col_idx].push(value),
                    Err(_) => return Err(coerce_error(line_count, name, field, column_type)),
                },
                ColumnType::Float64 => match fast_float::parse::<f64, _>(field) {
                    Ok(value) => float64[col_idx].push(value),
                    Err(_) => return Err(coerce_error(line_count, name, field, column_type)),
                },
                ColumnType::Bool => match parse_bool(field) {
                    Some(value) => bools[col_idx].push(value),
                    None => return Err(coerce_error(line_count, name, field, column_type)),
                },
                ColumnType::Str => {
                    if std::str::from_utf8(field).is_err() {
                        return Err(coerce_error(line_count, name, field, column_type));
                    }
                    // Store absolute offsets into the mmap
                    let field_offset = field.as_ptr() as usize - chunk.as_ptr() as usize;
                    let absolute_start = chunk_offset + field_offset;
                    strs[col_idx].push((absolute_start, absolute_start + field.len()));
                }
            }
        }

        row_count += 1;
        line_count += 1;
    }

    Ok(ChunkBatch {
        int64,
        float64,
        bools,
        strs,
        row_count,
        line_count,
    })
}
