// On-disk records: file header, schema entries, and the column metadata table.
// All integers are little-endian. Decoders never trust a byte before the magic
// and version have been checked.
use std::io::{self, Read};

use crate::core::error::{Error, ErrorKind};
use crate::core::format::{
    ColumnType, FORMAT_VERSION, MAGIC, SUPPORTED_FORMAT_VERSIONS, format_version_error,
};

pub const FILE_HEADER_LEN: usize = 17;
pub const COLUMN_META_LEN: usize = 24;
pub const MAX_NAME_LEN: usize = u16::MAX as usize;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FileHeader {
    pub version: u8,
    pub column_count: u32,
    pub row_count: u64,
}

impl FileHeader {
    pub fn new(column_count: u32, row_count: u64) -> Self {
        Self {
            version: FORMAT_VERSION,
            column_count,
            row_count,
        }
    }

    pub fn encode(&self) -> [u8; FILE_HEADER_LEN] {
        let mut buf = [0u8; FILE_HEADER_LEN];
        buf[0..4].copy_from_slice(&MAGIC);
        buf[4] = self.version;
        write_u32(&mut buf, 5, self.column_count);
        write_u64(&mut buf, 9, self.row_count);
        buf
    }

    /// Decodes a header from a prefix of the file. `buf` may be shorter than
    /// the full header; magic and version are checked on whatever is present
    /// before truncation is reported.
    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() < MAGIC.len() || buf[0..4] != MAGIC {
            let found = &buf[..buf.len().min(MAGIC.len())];
            return Err(Error::new(ErrorKind::Format)
                .with_message("not a ccf file (bad magic)")
                .with_mismatch(escape_bytes(&MAGIC), escape_bytes(found)));
        }
        let Some(&version) = buf.get(4) else {
            return Err(Error::new(ErrorKind::Format).with_message("file header truncated"));
        };
        if !SUPPORTED_FORMAT_VERSIONS.contains(&version) {
            return Err(format_version_error(version));
        }
        if buf.len() < FILE_HEADER_LEN {
            return Err(Error::new(ErrorKind::Format)
                .with_message("file header truncated")
                .with_mismatch(FILE_HEADER_LEN, buf.len()));
        }
        Ok(Self {
            version,
            column_count: read_u32(buf, 5),
            row_count: read_u64(buf, 9),
        })
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SchemaEntry {
    pub name: String,
    pub column_type: ColumnType,
}

impl SchemaEntry {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }

    pub fn encoded_len(&self) -> usize {
        2 + self.name.len() + 1
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) -> Result<(), Error> {
        let name_len = u16::try_from(self.name.len()).map_err(|_| {
            Error::new(ErrorKind::Schema)
                .with_message(format!("column name longer than {MAX_NAME_LEN} bytes"))
                .with_column(truncate_name(&self.name))
        })?;
        out.extend_from_slice(&name_len.to_le_bytes());
        out.extend_from_slice(self.name.as_bytes());
        out.push(self.column_type.tag());
        Ok(())
    }

    pub fn decode_from<R: Read>(reader: &mut R) -> Result<Self, Error> {
        let mut len_buf = [0u8; 2];
        read_record(reader, &mut len_buf, "schema entry")?;
        let name_len = u16::from_le_bytes(len_buf) as usize;

        let mut name_buf = vec![0u8; name_len];
        read_record(reader, &mut name_buf, "schema entry")?;
        let name = String::from_utf8(name_buf).map_err(|err| {
            Error::new(ErrorKind::Schema)
                .with_message("column name is not valid utf-8")
                .with_source(err)
        })?;

        let mut tag = [0u8; 1];
        read_record(reader, &mut tag, "schema entry")?;
        let column_type = ColumnType::from_tag(tag[0]).ok_or_else(|| {
            Error::new(ErrorKind::Schema)
                .with_message(format!("unknown type tag {}", tag[0]))
                .with_column(name.clone())
        })?;

        Ok(Self { name, column_type })
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ColumnMeta {
    pub offset: u64,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
}

impl ColumnMeta {
    pub fn new(offset: u64, compressed_size: u64, uncompressed_size: u64) -> Self {
        Self {
            offset,
            compressed_size,
            uncompressed_size,
        }
    }

    /// First byte past this column's block, if it does not overflow.
    pub fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.compressed_size)
    }

    pub fn encode(&self) -> [u8; COLUMN_META_LEN] {
        let mut buf = [0u8; COLUMN_META_LEN];
        write_u64(&mut buf, 0, self.offset);
        write_u64(&mut buf, 8, self.compressed_size);
        write_u64(&mut buf, 16, self.uncompressed_size);
        buf
    }

    pub fn decode(buf: &[u8; COLUMN_META_LEN]) -> Self {
        Self {
            offset: read_u64(buf, 0),
            compressed_size: read_u64(buf, 8),
            uncompressed_size: read_u64(buf, 16),
        }
    }

    pub fn decode_from<R: Read>(reader: &mut R) -> Result<Self, Error> {
        let mut buf = [0u8; COLUMN_META_LEN];
        read_record(reader, &mut buf, "column metadata")?;
        Ok(Self::decode(&buf))
    }
}

/// Byte offset where the metadata table starts, given the decoded schema.
pub fn metadata_table_start(schema: &[SchemaEntry]) -> u64 {
    let schema_len: usize = schema.iter().map(SchemaEntry::encoded_len).sum();
    (FILE_HEADER_LEN + schema_len) as u64
}

/// Byte offset of the first column block.
pub fn data_start(schema: &[SchemaEntry]) -> u64 {
    metadata_table_start(schema) + (schema.len() * COLUMN_META_LEN) as u64
}

// Truncation inside the schema or metadata sections is a schema error; any
// other read failure stays an I/O error.
fn read_record<R: Read>(reader: &mut R, buf: &mut [u8], what: &str) -> Result<(), Error> {
    reader.read_exact(buf).map_err(|err| {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Error::new(ErrorKind::Schema)
                .with_message(format!("{what} truncated"))
                .with_source(err)
        } else {
            Error::new(ErrorKind::Io).with_source(err)
        }
    })
}

fn truncate_name(name: &str) -> String {
    name.chars().take(32).collect()
}

fn escape_bytes(bytes: &[u8]) -> String {
    bytes.escape_ascii().to_string()
}

fn read_u32(buf: &[u8], offset: usize) -> u32 {
    let mut out = [0u8; 4];
    out.copy_from_slice(&buf[offset..offset + 4]);
    u32::from_le_bytes(out)
}

fn read_u64(buf: &[u8], offset: usize) -> u64 {
    let mut out = [0u8; 8];
    out.copy_from_slice(&buf[offset..offset + 8]);
    u64::from_le_bytes(out)
}

fn write_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn write_u64(buf: &mut [u8], offset: usize, value: u64) {
    buf[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::{
        COLUMN_META_LEN, ColumnMeta, FILE_HEADER_LEN, FileHeader, SchemaEntry, data_start,
        metadata_table_start,
    };
    use crate::core::error::ErrorKind;
    use crate::core::format::ColumnType;
    use std::io::Cursor;

    #[test]
    fn header_layout_is_fixed() {
        let buf = FileHeader::new(3, 2).encode();
        assert_eq!(&buf[0..4], b"CCF1");
        assert_eq!(buf[4], 1);
        assert_eq!(&buf[5..9], &3u32.to_le_bytes());
        assert_eq!(&buf[9..17], &2u64.to_le_bytes());
        assert_eq!(FileHeader::decode(&buf).expect("decode"), FileHeader::new(3, 2));
    }

    #[test]
    fn header_rejects_bad_magic_before_anything_else() {
        let mut buf = FileHeader::new(1, 1).encode();
        buf[0] = b'X';
        buf[4] = 99;
        let err = FileHeader::decode(&buf).expect_err("bad magic");
        assert_eq!(err.kind(), ErrorKind::Format);
        assert!(err.message().unwrap().contains("magic"));
    }

    #[test]
    fn header_rejects_unknown_version() {
        let mut buf = FileHeader::new(1, 1).encode();
        buf[4] = 2;
        let err = FileHeader::decode(&buf).expect_err("version");
        assert_eq!(err.kind(), ErrorKind::Format);
        assert_eq!(err.actual(), Some("2"));
    }

    #[test]
    fn short_inputs_are_format_errors() {
        assert_eq!(FileHeader::decode(b"").unwrap_err().kind(), ErrorKind::Format);
        assert_eq!(FileHeader::decode(b"CC").unwrap_err().kind(), ErrorKind::Format);
        assert_eq!(FileHeader::decode(b"CCF1").unwrap_err().kind(), ErrorKind::Format);
        let buf = FileHeader::new(1, 1).encode();
        let err = FileHeader::decode(&buf[..FILE_HEADER_LEN - 1]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn schema_entry_layout() {
        let entry = SchemaEntry::new("年齢", ColumnType::Int);
        let mut out = Vec::new();
        entry.encode_into(&mut out).expect("encode");
        assert_eq!(out.len(), entry.encoded_len());
        assert_eq!(&out[0..2], &6u16.to_le_bytes());
        assert_eq!(&out[2..8], "年齢".as_bytes());
        assert_eq!(out[8], 1);

        let decoded = SchemaEntry::decode_from(&mut Cursor::new(out)).expect("decode");
        assert_eq!(decoded, entry);
    }

    #[test]
    fn oversized_name_is_schema_error() {
        let entry = SchemaEntry::new("n".repeat(70_000), ColumnType::String);
        let err = entry.encode_into(&mut Vec::new()).expect_err("too long");
        assert_eq!(err.kind(), ErrorKind::Schema);
    }

    #[test]
    fn truncated_schema_entry_is_schema_error() {
        let mut out = Vec::new();
        SchemaEntry::new("score", ColumnType::Float)
            .encode_into(&mut out)
            .expect("encode");
        out.pop();
        let err = SchemaEntry::decode_from(&mut Cursor::new(out)).expect_err("truncated");
        assert_eq!(err.kind(), ErrorKind::Schema);
    }

    #[test]
    fn unknown_type_tag_is_schema_error() {
        let bytes = [1u8, 0, b'a', 7];
        let err = SchemaEntry::decode_from(&mut Cursor::new(bytes)).expect_err("tag");
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert_eq!(err.column(), Some("a"));
    }

    #[test]
    fn column_meta_layout() {
        let meta = ColumnMeta::new(57, 11, 8);
        let buf = meta.encode();
        assert_eq!(buf.len(), COLUMN_META_LEN);
        assert_eq!(&buf[0..8], &57u64.to_le_bytes());
        assert_eq!(&buf[8..16], &11u64.to_le_bytes());
        assert_eq!(&buf[16..24], &8u64.to_le_bytes());
        assert_eq!(ColumnMeta::decode(&buf), meta);
        assert_eq!(meta.end(), Some(68));
        assert_eq!(ColumnMeta::new(u64::MAX, 1, 0).end(), None);
    }

    #[test]
    fn truncated_metadata_is_schema_error() {
        let err = ColumnMeta::decode_from(&mut Cursor::new([0u8; 10])).expect_err("short");
        assert_eq!(err.kind(), ErrorKind::Schema);
    }

    #[test]
    fn section_offsets_follow_schema() {
        let schema = vec![
            SchemaEntry::new("a", ColumnType::Int),
            SchemaEntry::new("bc", ColumnType::String),
        ];
        assert_eq!(metadata_table_start(&schema), 17 + 4 + 5);
        assert_eq!(data_start(&schema), 26 + 48);
    }
}
