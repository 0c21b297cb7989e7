//! Purpose: Centralize the on-disk format constants shared by writer and reader.
//! Exports: `MAGIC`, `FORMAT_VERSION`, `ColumnType`, `COLUMN_TYPES`, `format_version_error`.
//! Role: One definition of tags and widths shared by the encoder and decoder.
//! Invariants: Type tag values are part of the public format contract (1/2/3).
//! Invariants: Bump the version only for incompatible on-disk changes.

use serde::Serialize;

use crate::core::error::{Error, ErrorKind};

pub const MAGIC: [u8; 4] = *b"CCF1";
pub const FORMAT_VERSION: u8 = 1;
pub const SUPPORTED_FORMAT_VERSIONS: &[u8] = &[FORMAT_VERSION];

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Int,
    Float,
    String,
}

/// Every storable column type, in tag order.
pub const COLUMN_TYPES: [ColumnType; 3] = [ColumnType::Int, ColumnType::Float, ColumnType::String];

impl ColumnType {
    pub fn tag(self) -> u8 {
        match self {
            ColumnType::Int => 1,
            ColumnType::Float => 2,
            ColumnType::String => 3,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        COLUMN_TYPES.into_iter().find(|ty| ty.tag() == tag)
    }

    pub fn name(self) -> &'static str {
        match self {
            ColumnType::Int => "int",
            ColumnType::Float => "float",
            ColumnType::String => "string",
        }
    }

    /// Fixed per-value width for numeric columns; strings are variable.
    pub fn value_width(self) -> Option<usize> {
        match self {
            ColumnType::Int => Some(size_of::<i32>()),
            ColumnType::Float => Some(size_of::<f64>()),
            ColumnType::String => None,
        }
    }
}

pub fn format_version_error(detected: u8) -> Error {
    let supported = SUPPORTED_FORMAT_VERSIONS
        .iter()
        .map(|version| version.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    Error::new(ErrorKind::Format)
        .with_message(format!(
            "unsupported format version {detected} (supported: {supported})"
        ))
        .with_mismatch(FORMAT_VERSION, detected)
        .with_hint("Repack the source table with this version of ccf.")
}

#[cfg(test)]
mod tests {
    use super::{COLUMN_TYPES, ColumnType, format_version_error};
    use crate::core::error::ErrorKind;

    #[test]
    fn type_tags_match_format_contract() {
        assert_eq!(ColumnType::Int.tag(), 1);
        assert_eq!(ColumnType::Float.tag(), 2);
        assert_eq!(ColumnType::String.tag(), 3);
    }

    #[test]
    fn tags_resolve_back_to_types() {
        for ty in COLUMN_TYPES {
            assert_eq!(ColumnType::from_tag(ty.tag()), Some(ty));
        }
        assert_eq!(ColumnType::from_tag(0), None);
        assert_eq!(ColumnType::from_tag(4), None);
    }

    #[test]
    fn type_names_serialize_lowercase() {
        let value = serde_json::to_value(ColumnType::Float).expect("serialize");
        assert_eq!(value, serde_json::json!("float"));
        for ty in COLUMN_TYPES {
            assert_eq!(serde_json::to_value(ty).expect("serialize"), ty.name());
        }
    }

    #[test]
    fn version_error_reports_supported_set() {
        let err = format_version_error(9);
        assert_eq!(err.kind(), ErrorKind::Format);
        assert!(err.message().unwrap().contains("supported: 1"));
        assert_eq!(err.actual(), Some("9"));
    }
}
