//! Fixed 13-column schema of the movie ratings dataset.
//!
//! The input is positional: the header row is validated for field count and
//! skipped, and each data field is coerced to the declared type below. A
//! field that fails coercion fails the whole load.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int64,
    Float64,
    Bool,
    Str,
}

impl ColumnType {
    /// Human-readable type name for schema mismatch diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            ColumnType::Int64 => "integer",
            ColumnType::Float64 => "float",
            ColumnType::Bool => "boolean",
            ColumnType::Str => "string",
        }
    }
}

/// Column names and types, in file order.
pub const RATINGS_SCHEMA: [(&str, ColumnType); 13] = [
    ("UserID", ColumnType::Int64),
    ("MovieID", ColumnType::Int64),
    ("MovieTitle", ColumnType::Str),
    ("Genre", ColumnType::Str),
    ("Rating", ColumnType::Float64),
    ("ReviewCount", ColumnType::Int64),
    ("WatchedYear", ColumnType::Int64),
    ("UserLocation", ColumnType::Str),
    ("AgeGroup", ColumnType::Str),
    ("StreamingPlatform", ColumnType::Str),
    ("WatchTime", ColumnType::Int64),
    ("IsBingeWatched", ColumnType::Bool),
    ("SubscriptionStatus", ColumnType::Str),
];

/// The categorical key records are grouped by.
pub const GROUP_KEY_COLUMN: &str = "AgeGroup";

/// The positive-case predicate column.
pub const BINGE_FLAG_COLUMN: &str = "IsBingeWatched";

/// Boolean fields are the literal words `true`/`false`, case-insensitive.
/// Numeric 0/1 encodings are rejected as a schema mismatch.
pub fn parse_bool(field: &[u8]) -> Option<bool> {
    if field.eq_ignore_ascii_case(b"true") {
        Some(true)
    } else if field.eq_ignore_ascii_case(b"false") {
        Some(false)
    } else {
        None
    }
}
