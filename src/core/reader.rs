//! Purpose: Open CCF files and serve arbitrary column subsets by direct seeks.
//! Exports: `Reader`, `ColumnSet`.
//! Role: Parses header, schema, and metadata once; each read opens its own handle.
//! Invariants: Requests are validated in full before any column byte is read.
//! Invariants: Only requested blocks are read, inflated, and decoded.
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::codec;
use crate::core::column::{self, ColumnValues};
use crate::core::error::{Error, ErrorKind};
use crate::core::layout::{self, ColumnMeta, FILE_HEADER_LEN, FileHeader, SchemaEntry};

/// Decoded columns in request order, addressable by name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ColumnSet {
    columns: Vec<(String, ColumnValues)>,
}

impl ColumnSet {
    pub fn get(&self, name: &str) -> Option<&ColumnValues> {
        self.columns
            .iter()
            .find(|(candidate, _)| candidate == name)
            .map(|(_, values)| values)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnValues)> {
        self.columns.iter().map(|(name, values)| (name.as_str(), values))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn into_vec(self) -> Vec<(String, ColumnValues)> {
        self.columns
    }
}

#[derive(Clone, Debug)]
pub struct Reader {
    path: PathBuf,
    header: FileHeader,
    schema: Vec<SchemaEntry>,
    meta: Vec<ColumnMeta>,
    index: HashMap<String, usize>,
    file_size: u64,
}

impl Reader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let file = open_file(&path)?;
        let file_size = file
            .metadata()
            .map(|meta| meta.len())
            .map_err(|err| Error::new(ErrorKind::Io).with_path(&path).with_source(err))?;
        let mut reader = BufReader::new(file);

        let mut prefix = Vec::with_capacity(FILE_HEADER_LEN);
        (&mut reader)
            .take(FILE_HEADER_LEN as u64)
            .read_to_end(&mut prefix)
            .map_err(|err| Error::new(ErrorKind::Io).with_path(&path).with_source(err))?;
        let header = FileHeader::decode(&prefix).map_err(|err| err.or_path(&path))?;

        // Column count comes from disk; cap pre-allocation until entries prove it.
        let expected = (header.column_count as usize).min(4096);
        let mut schema = Vec::with_capacity(expected);
        for _ in 0..header.column_count {
            schema.push(SchemaEntry::decode_from(&mut reader).map_err(|err| err.or_path(&path))?);
        }
        let mut meta = Vec::with_capacity(schema.len());
        for _ in 0..header.column_count {
            meta.push(ColumnMeta::decode_from(&mut reader).map_err(|err| err.or_path(&path))?);
        }
        check_block_layout(&schema, &meta, file_size).map_err(|err| err.or_path(&path))?;

        let mut index = HashMap::with_capacity(schema.len());
        for (position, entry) in schema.iter().enumerate() {
            index.entry(entry.name.clone()).or_insert(position);
        }

        debug!(
            path = %path.display(),
            version = header.version,
            columns = header.column_count,
            rows = header.row_count,
            "ccf file opened"
        );

        Ok(Self {
            path,
            header,
            schema,
            meta,
            index,
            file_size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> FileHeader {
        self.header
    }

    pub fn row_count(&self) -> u64 {
        self.header.row_count
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn schema(&self) -> &[SchemaEntry] {
        &self.schema
    }

    pub fn column_meta(&self) -> &[ColumnMeta] {
        &self.meta
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.schema.iter().map(|entry| entry.name.as_str())
    }

    /// Looks up a column by name; duplicate names resolve to the first entry.
    pub fn column(&self, name: &str) -> Option<(&SchemaEntry, ColumnMeta)> {
        self.index
            .get(name)
            .map(|&position| (&self.schema[position], self.meta[position]))
    }

    /// Reads every column in schema order.
    pub fn read_all(&self) -> Result<ColumnSet, Error> {
        let positions = (0..self.schema.len()).collect::<Vec<_>>();
        self.read_positions(&positions)
    }

    /// Reads the named columns, in the order given.
    ///
    /// Repeated names are read once. If any name is unknown the call fails
    /// with `ColumnNotFound` before the file is opened.
    pub fn read_columns<S: AsRef<str>>(&self, names: &[S]) -> Result<ColumnSet, Error> {
        let mut seen = HashSet::with_capacity(names.len());
        let mut positions = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            if !seen.insert(name) {
                continue;
            }
            let position = *self.index.get(name).ok_or_else(|| self.not_found(name))?;
            positions.push(position);
        }
        self.read_positions(&positions)
    }

    pub fn read_column(&self, name: &str) -> Result<ColumnValues, Error> {
        let position = *self.index.get(name).ok_or_else(|| self.not_found(name))?;
        self.read_index(position)
    }

    /// Reads the column at a schema position, bypassing name lookup.
    pub fn read_index(&self, index: usize) -> Result<ColumnValues, Error> {
        if index >= self.schema.len() {
            return Err(Error::new(ErrorKind::ColumnNotFound)
                .with_message(format!("no column at position {index}"))
                .with_mismatch(format!("< {}", self.schema.len()), index)
                .with_path(&self.path));
        }
        let mut set = self.read_positions(&[index])?;
        set.columns
            .pop()
            .map(|(_, values)| values)
            .ok_or_else(|| {
                Error::new(ErrorKind::Internal).with_message("column read returned nothing")
            })
    }

    fn not_found(&self, name: &str) -> Error {
        Error::new(ErrorKind::ColumnNotFound)
            .with_message(format!("no column named {name:?}"))
            .with_column(name)
            .with_path(&self.path)
            .with_hint("Run `ccf inspect <file>` to list available columns.")
    }

    fn read_positions(&self, positions: &[usize]) -> Result<ColumnSet, Error> {
        if positions.is_empty() {
            return Ok(ColumnSet::default());
        }
        let mut file = open_file(&self.path)?;
        let mut columns = Vec::with_capacity(positions.len());
        for &position in positions {
            let entry = &self.schema[position];
            let meta = self.meta[position];
            let values = self.read_block(&mut file, entry, meta).map_err(|err| {
                err.with_column(entry.name.clone())
                    .with_offset(meta.offset)
                    .or_path(&self.path)
            })?;
            columns.push((entry.name.clone(), values));
        }
        Ok(ColumnSet { columns })
    }

    fn read_block(
        &self,
        file: &mut File,
        entry: &SchemaEntry,
        meta: ColumnMeta,
    ) -> Result<ColumnValues, Error> {
        let len = usize::try_from(meta.compressed_size).map_err(|_| {
            Error::new(ErrorKind::Corrupt).with_message("column block exceeds addressable memory")
        })?;
        let mut block = vec![0u8; len];
        file.seek(SeekFrom::Start(meta.offset))
            .and_then(|_| file.read_exact(&mut block))
            .map_err(|err| {
                let message = if err.kind() == io::ErrorKind::UnexpectedEof {
                    "column block truncated"
                } else {
                    "column block read failed"
                };
                Error::new(ErrorKind::Io).with_message(message).with_source(err)
            })?;
        let raw = codec::decompress(&block, meta.uncompressed_size)?;
        let values = column::decode(entry.column_type, &raw, self.header.row_count)?;
        debug!(
            column = %entry.name,
            column_type = entry.column_type.name(),
            compressed_bytes = meta.compressed_size,
            raw_bytes = meta.uncompressed_size,
            "column decoded"
        );
        Ok(values)
    }
}

fn open_file(path: &Path) -> Result<File, Error> {
    File::open(path).map_err(|err| {
        let mut error = Error::new(ErrorKind::Io).with_path(path);
        if err.kind() == io::ErrorKind::NotFound {
            error = error.with_message("file not found");
        }
        error.with_source(err)
    })
}

/// Blocks must start right after the metadata table, follow each other with
/// no gaps or overlaps, and end inside the file.
fn check_block_layout(
    schema: &[SchemaEntry],
    meta: &[ColumnMeta],
    file_size: u64,
) -> Result<(), Error> {
    let mut expected = layout::data_start(schema);
    for (entry, meta) in schema.iter().zip(meta) {
        if meta.offset != expected {
            return Err(Error::new(ErrorKind::Corrupt)
                .with_message("column block offset out of sequence")
                .with_column(entry.name.clone())
                .with_mismatch(expected, meta.offset));
        }
        expected = meta.end().ok_or_else(|| {
            Error::new(ErrorKind::Corrupt)
                .with_message("column block size overflows")
                .with_column(entry.name.clone())
        })?;
    }
    if expected > file_size {
        return Err(Error::new(ErrorKind::Corrupt)
            .with_message("column blocks extend past end of file")
            .with_mismatch(expected, file_size));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::Reader;
    use crate::core::column::ColumnValues;
    use crate::core::error::ErrorKind;
    use crate::core::format::ColumnType;
    use crate::core::writer::Writer;
    use std::path::Path;

    fn write_sample(path: &Path) {
        let rows = [["Alice", "30", "95.5"], ["Bob", "25", "80.0"]];
        Writer::new(path)
            .write(&["name", "age", "score"], &rows)
            .expect("write");
    }

    #[test]
    fn open_parses_header_and_schema() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("t.ccf");
        write_sample(&path);

        let reader = Reader::open(&path).expect("open");
        assert_eq!(reader.row_count(), 2);
        assert_eq!(reader.header().column_count, 3);
        let names: Vec<_> = reader.column_names().collect();
        assert_eq!(names, ["name", "age", "score"]);
        let (entry, _) = reader.column("age").expect("age");
        assert_eq!(entry.column_type, ColumnType::Int);
        assert!(reader.column("missing").is_none());
    }

    #[test]
    fn read_columns_follows_request_order_and_dedupes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("t.ccf");
        write_sample(&path);

        let reader = Reader::open(&path).expect("open");
        let set = reader.read_columns(&["score", "name", "score"]).expect("read");
        let names: Vec<_> = set.names().collect();
        assert_eq!(names, ["score", "name"]);
        assert_eq!(set.get("score"), Some(&ColumnValues::Float(vec![95.5, 80.0])));
        assert!(!set.contains("age"));
    }

    #[test]
    fn empty_request_reads_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("t.ccf");
        write_sample(&path);

        let reader = Reader::open(&path).expect("open");
        std::fs::remove_file(&path).expect("remove");
        let names: [&str; 0] = [];
        assert!(reader.read_columns(&names).expect("read").is_empty());
    }

    #[test]
    fn unknown_column_fails_without_opening_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("t.ccf");
        write_sample(&path);

        let reader = Reader::open(&path).expect("open");
        std::fs::remove_file(&path).expect("remove");
        let err = reader.read_columns(&["name", "doesnotexist"]).expect_err("missing");
        assert_eq!(err.kind(), ErrorKind::ColumnNotFound);
        assert_eq!(err.column(), Some("doesnotexist"));

        let err = reader.read_column("nope").expect_err("missing");
        assert_eq!(err.kind(), ErrorKind::ColumnNotFound);
    }

    #[test]
    fn each_read_opens_its_own_handle() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("t.ccf");
        write_sample(&path);

        let reader = Reader::open(&path).expect("open");
        std::fs::remove_file(&path).expect("remove");
        let err = reader.read_column("age").expect_err("gone");
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(err.path(), Some(path.as_path()));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = Reader::open(dir.path().join("nope.ccf")).expect_err("missing");
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(err.message(), Some("file not found"));
    }

    #[test]
    fn bad_magic_is_format_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("t.ccf");
        std::fs::write(&path, b"PAR1 definitely not ccf").expect("write");
        let err = Reader::open(&path).expect_err("magic");
        assert_eq!(err.kind(), ErrorKind::Format);
        assert_eq!(err.path(), Some(path.as_path()));
    }

    #[test]
    fn truncated_schema_is_schema_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("t.ccf");
        write_sample(&path);
        let bytes = std::fs::read(&path).expect("read");
        std::fs::write(&path, &bytes[..22]).expect("truncate");

        let err = Reader::open(&path).expect_err("truncated");
        assert_eq!(err.kind(), ErrorKind::Schema);
    }

    #[test]
    fn truncated_blocks_are_corrupt() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("t.ccf");
        write_sample(&path);
        let bytes = std::fs::read(&path).expect("read");
        std::fs::write(&path, &bytes[..bytes.len() - 1]).expect("truncate");

        let err = Reader::open(&path).expect_err("short");
        assert_eq!(err.kind(), ErrorKind::Corrupt);
    }

    #[test]
    fn shifted_offset_is_corrupt() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("t.ccf");
        Writer::new(&path).write(&["a"], &[["1"]]).expect("write");
        let mut bytes = std::fs::read(&path).expect("read");
        // Metadata table starts at 17 + 4; bump the first offset.
        bytes[21] = bytes[21].wrapping_add(1);
        std::fs::write(&path, &bytes).expect("rewrite");

        let err = Reader::open(&path).expect_err("offset");
        assert_eq!(err.kind(), ErrorKind::Corrupt);
        assert_eq!(err.column(), Some("a"));
    }

    #[test]
    fn damaged_block_is_corrupt_on_read() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("t.ccf");
        write_sample(&path);
        let reader = Reader::open(&path).expect("open");
        let (_, meta) = reader.column("name").expect("name");

        let mut bytes = std::fs::read(&path).expect("read");
        for byte in &mut bytes[meta.offset as usize..meta.end().unwrap() as usize] {
            *byte = 0xFF;
        }
        std::fs::write(&path, &bytes).expect("rewrite");

        let err = reader.read_column("name").expect_err("corrupt");
        assert_eq!(err.kind(), ErrorKind::Corrupt);
        assert_eq!(err.column(), Some("name"));
        assert_eq!(err.offset(), Some(meta.offset));

        // Other columns stay readable.
        let age = reader.read_column("age").expect("age");
        assert_eq!(age, ColumnValues::Int(vec![30, 25]));
    }

    #[test]
    fn legacy_duplicate_names_resolve_to_first_column() {
        use crate::core::codec::{DEFAULT_LEVEL, compress};
        use crate::core::layout::{ColumnMeta, FileHeader, SchemaEntry, data_start};

        let schema = vec![
            SchemaEntry::new("x", ColumnType::Int),
            SchemaEntry::new("x", ColumnType::String),
        ];
        let first = compress(&5i32.to_le_bytes(), DEFAULT_LEVEL).expect("compress");
        let mut raw = 1u32.to_le_bytes().to_vec();
        raw.push(b'z');
        let second = compress(&raw, DEFAULT_LEVEL).expect("compress");

        let start = data_start(&schema);
        let metas = [
            ColumnMeta::new(start, first.len() as u64, 4),
            ColumnMeta::new(start + first.len() as u64, second.len() as u64, raw.len() as u64),
        ];
        let mut bytes = FileHeader::new(2, 1).encode().to_vec();
        for entry in &schema {
            entry.encode_into(&mut bytes).expect("entry");
        }
        for meta in &metas {
            bytes.extend_from_slice(&meta.encode());
        }
        bytes.extend_from_slice(&first);
        bytes.extend_from_slice(&second);

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("dup.ccf");
        std::fs::write(&path, &bytes).expect("write");

        let reader = Reader::open(&path).expect("open");
        assert_eq!(reader.read_column("x").expect("x"), ColumnValues::Int(vec![5]));
        let all = reader.read_all().expect("all");
        assert_eq!(all.len(), 2);
    }
}
