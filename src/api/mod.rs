//! Purpose: Define the stable public Rust API boundary for ccf.
//! Exports: Writer/reader entry points, value types, errors, and validation reports.
//! Role: Public, additive-only surface used by the CLI and integration tests.
//! Invariants: Collaborators reach the format engine only through `Writer::write`
//! and `Reader::read_columns` (plus the read-only accessors on `Reader`).

mod validation;

pub use crate::core::codec::{DEFAULT_LEVEL, MAX_LEVEL};
pub use crate::core::column::ColumnValues;
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::format::{ColumnType, FORMAT_VERSION, MAGIC};
pub use crate::core::layout::{ColumnMeta, FileHeader, SchemaEntry};
pub use crate::core::reader::{ColumnSet, Reader};
pub use crate::core::resolve::resolve_type;
pub use crate::core::writer::{ColumnSummary, WriteOptions, WriteSummary, Writer};
pub use validation::{ValidationIssue, ValidationReport, ValidationStatus, validate_file};
