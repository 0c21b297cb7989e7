// File writer: turns headers + text rows into a CCF file on disk.
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::codec::{self, DEFAULT_LEVEL};
use crate::core::error::{Error, ErrorKind};
use crate::core::format::ColumnType;
use crate::core::layout::{ColumnMeta, FileHeader};
use crate::core::plan::plan_table;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WriteOptions {
    pub compression_level: u32,
}

impl WriteOptions {
    pub fn new() -> Self {
        Self {
            compression_level: DEFAULT_LEVEL,
        }
    }

    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level;
        self
    }

    fn validate(&self) -> Result<(), Error> {
        codec::check_level(self.compression_level)
    }
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ColumnSummary {
    pub name: String,
    pub column_type: ColumnType,
    pub meta: ColumnMeta,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WriteSummary {
    pub path: PathBuf,
    pub header: FileHeader,
    pub columns: Vec<ColumnSummary>,
    pub file_size: u64,
}

pub struct Writer {
    path: PathBuf,
    options: WriteOptions,
}

impl Writer {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            options: WriteOptions::default(),
        }
    }

    pub fn with_options(mut self, options: WriteOptions) -> Self {
        self.options = options;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `rows` under `headers`, creating or truncating the target file.
    ///
    /// The whole file is planned in memory first, so nothing touches disk
    /// until every column has been encoded. The write itself is not atomic:
    /// an interrupted process can leave a partial file behind.
    pub fn write<H, R, V>(&self, headers: &[H], rows: &[R]) -> Result<WriteSummary, Error>
    where
        H: AsRef<str>,
        R: AsRef<[V]>,
        V: AsRef<str>,
    {
        self.options.validate()?;
        let plan = plan_table(headers, rows, self.options.compression_level)
            .map_err(|err| err.or_path(&self.path))?;

        let file = File::create(&self.path)
            .map_err(|err| Error::new(ErrorKind::Io).with_path(&self.path).with_source(err))?;
        let mut writer = BufWriter::new(file);
        plan.write_to(&mut writer)
            .and_then(|()| writer.flush())
            .map_err(|err| Error::new(ErrorKind::Io).with_path(&self.path).with_source(err))?;

        let file_size = plan.file_len();
        debug!(
            path = %self.path.display(),
            columns = plan.header.column_count,
            rows = plan.header.row_count,
            bytes = file_size,
            "ccf file written"
        );

        Ok(WriteSummary {
            path: self.path.clone(),
            header: plan.header,
            columns: plan
                .columns
                .into_iter()
                .map(|column| ColumnSummary {
                    name: column.entry.name,
                    column_type: column.entry.column_type,
                    meta: column.meta,
                })
                .collect(),
            file_size,
        })
    }
}
