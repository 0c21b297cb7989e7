//! Purpose: Full-file integrity check producing a serializable report.
//! Exports: `validate_file`, `ValidationReport`, `ValidationStatus`, `ValidationIssue`.
//! Role: Backs `ccf verify`; decodes every column and collects issues instead of aborting.
//! Invariants: A report is `Ok` iff it carries no issues.
//! Invariants: I/O failures are returned as errors, never reported as corruption.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::error::{Error, ErrorKind};
use crate::core::layout;
use crate::core::reader::Reader;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValidationStatus {
    Ok,
    Corrupt,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ValidationIssue {
    pub code: String,
    pub message: String,
    pub column: Option<String>,
    pub offset: Option<u64>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ValidationReport {
    pub path: PathBuf,
    pub status: ValidationStatus,
    pub row_count: Option<u64>,
    pub columns_checked: usize,
    pub issues: Vec<ValidationIssue>,
    pub remediation_hints: Vec<String>,
}

impl ValidationReport {
    pub fn ok(path: PathBuf) -> Self {
        Self {
            path,
            status: ValidationStatus::Ok,
            row_count: None,
            columns_checked: 0,
            issues: Vec::new(),
            remediation_hints: Vec::new(),
        }
    }

    pub fn issue_count(&self) -> usize {
        self.issues.len()
    }

    fn push_issue(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
        self.status = ValidationStatus::Corrupt;
        if self.remediation_hints.is_empty() {
            self.remediation_hints
                .push("File appears corrupt. Repack it from the source table.".to_string());
        }
    }
}

pub fn validate_file(path: impl AsRef<Path>) -> Result<ValidationReport, Error> {
    let path = path.as_ref();
    let mut report = ValidationReport::ok(path.to_path_buf());

    let reader = match Reader::open(path) {
        Ok(reader) => reader,
        Err(err) if err.kind() == ErrorKind::Io => return Err(err),
        Err(err) => {
            report.push_issue(issue_from_error(&err));
            return Ok(report);
        }
    };
    report.row_count = Some(reader.row_count());

    for (index, entry) in reader.schema().iter().enumerate() {
        match reader.read_index(index) {
            Ok(values) => {
                debug!(column = %entry.name, rows = values.len(), "column verified");
            }
            Err(err) if err.kind() == ErrorKind::Io => return Err(err),
            Err(err) => report.push_issue(issue_from_error(&err)),
        }
        report.columns_checked += 1;
    }

    let data_end = reader
        .column_meta()
        .last()
        .and_then(|meta| meta.end())
        .unwrap_or_else(|| layout::data_start(reader.schema()));
    if data_end < reader.file_size() {
        report.push_issue(ValidationIssue {
            code: "trailing_bytes".to_string(),
            message: format!(
                "{} unexpected bytes after the last column block",
                reader.file_size() - data_end
            ),
            column: None,
            offset: Some(data_end),
        });
    }

    Ok(report)
}

fn issue_from_error(err: &Error) -> ValidationIssue {
    let code = match err.kind() {
        ErrorKind::Format => "format",
        ErrorKind::Schema => "schema",
        ErrorKind::Corrupt if err.column().is_some() => "column",
        ErrorKind::Corrupt => "layout",
        _ => "internal",
    };
    let message = match (err.message(), err.expected(), err.actual()) {
        (Some(message), Some(expected), Some(actual)) => {
            format!("{message} (expected {expected}, found {actual})")
        }
        (Some(message), _, _) => message.to_string(),
        (None, _, _) => format!("{:?}", err.kind()),
    };
    ValidationIssue {
        code: code.to_string(),
        message,
        column: err.column().map(str::to_string),
        offset: err.offset(),
    }
}
