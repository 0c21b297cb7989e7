// Column type inference: per-value classification plus left-to-right promotion.
use std::num::{ParseFloatError, ParseIntError};

use crate::core::format::ColumnType;

/// Parses an int cell; surrounding whitespace is ignored.
pub fn parse_int(value: &str) -> Result<i32, ParseIntError> {
    value.trim().parse()
}

/// Parses a float cell; surrounding whitespace is ignored.
pub fn parse_float(value: &str) -> Result<f64, ParseFloatError> {
    value.trim().parse()
}

/// Classifies a single raw text value.
///
/// Integers must fit the on-disk 32-bit width; wider integers fall through to
/// `Float` when they parse as a double.
pub fn classify(value: &str) -> ColumnType {
    if parse_int(value).is_ok() {
        ColumnType::Int
    } else if parse_float(value).is_ok() {
        ColumnType::Float
    } else {
        ColumnType::String
    }
}

/// Resolves the storage type for a whole column.
///
/// Scans left to right starting at `Int`; the first `String` value ends the
/// scan. A column with no values resolves to `String`.
pub fn resolve_type<S: AsRef<str>>(values: &[S]) -> ColumnType {
    if values.is_empty() {
        return ColumnType::String;
    }
    let mut resolved = ColumnType::Int;
    for value in values {
        match classify(value.as_ref()) {
            ColumnType::String => return ColumnType::String,
            ColumnType::Float => resolved = ColumnType::Float,
            ColumnType::Int => {}
        }
    }
    resolved
}
