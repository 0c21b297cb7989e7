//! Purpose: Delimited text-table I/O for the `pack` and `unpack` commands.
//! Exports: `TableOptions`, `TextTable`, `read_table`, `write_table`.
//! Role: CLI-side collaborator; the format engine never sees delimiters or quoting.
//! Invariants: The first record is the header row; every row must match its width.
//! Invariants: Output writes one record per stored row, columns in the given order.

use std::path::Path;

use ccf::api::{ColumnSet, Error, ErrorKind};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct TableOptions {
    pub delimiter: u8,
}

impl TableOptions {
    pub fn new() -> Self {
        Self { delimiter: b',' }
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Result<Self, Error> {
        if !delimiter.is_ascii() || delimiter == '"' || delimiter == '\n' || delimiter == '\r' {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("unsupported delimiter {delimiter:?}"))
                .with_hint("Use a single ASCII character such as ',' ';' '|' or a tab."));
        }
        self.delimiter = delimiter as u8;
        Ok(self)
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct TextTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Reads a delimited file; an input with no records yields an empty table.
pub(crate) fn read_table(path: &Path, options: TableOptions) -> Result<TextTable, Error> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(false)
        .from_path(path)
        .map_err(|err| csv_error(err, path))?;

    let mut records = reader.records();
    let headers = match records.next() {
        Some(record) => record
            .map_err(|err| csv_error(err, path))?
            .iter()
            .map(str::to_string)
            .collect(),
        None => return Ok(TextTable::default()),
    };
    let mut rows = Vec::new();
    for record in records {
        let record = record.map_err(|err| csv_error(err, path))?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(TextTable { headers, rows })
}

/// Writes `columns` as a delimited file and returns the number of data rows.
pub(crate) fn write_table(
    path: &Path,
    columns: &ColumnSet,
    row_count: u64,
    options: TableOptions,
) -> Result<u64, Error> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(options.delimiter)
        .from_path(path)
        .map_err(|err| csv_error(err, path))?;

    if !columns.is_empty() {
        writer
            .write_record(columns.names())
            .map_err(|err| csv_error(err, path))?;
    }
    let rows = usize::try_from(row_count).map_err(|_| {
        Error::new(ErrorKind::Corrupt).with_message("row count exceeds addressable memory")
    })?;
    if !columns.is_empty() {
        for row in 0..rows {
            let record = columns
                .iter()
                .map(|(_, values)| values.text_at(row).unwrap_or_default());
            writer
                .write_record(record)
                .map_err(|err| csv_error(err, path))?;
        }
    }
    writer.flush().map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to flush output table")
            .with_path(path)
            .with_source(err)
    })?;
    Ok(row_count)
}

fn csv_error(err: csv::Error, path: &Path) -> Error {
    let base = match err.kind() {
        csv::ErrorKind::Io(_) => Error::new(ErrorKind::Io),
        csv::ErrorKind::UnequalLengths {
            pos,
            expected_len,
            len,
        } => {
            let line = pos.as_ref().map(|pos| pos.line()).unwrap_or_default();
            Error::new(ErrorKind::Schema)
                .with_message(format!("line {line} has the wrong number of fields"))
                .with_mismatch(*expected_len, *len)
        }
        csv::ErrorKind::Utf8 { .. } => {
            Error::new(ErrorKind::Usage).with_message("input table is not valid utf-8")
        }
        _ => Error::new(ErrorKind::Usage).with_message("malformed input table"),
    };
    base.with_path(path).with_source(err)
}
