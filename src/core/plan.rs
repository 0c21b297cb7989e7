//! Purpose: Plan a complete CCF file in memory without performing any I/O.
//! Exports: `plan_table`, `TablePlan`, `PlannedColumn`.
//! Role: Pure layout layer used by `writer`; resolves types, encodes and compresses blocks.
//! Invariants: Every offset in the metadata table is final before the first byte is written.
//! Invariants: Blocks are laid out in schema order with no gaps or overlaps.
use std::collections::HashSet;
use std::io::{self, Write};

use tracing::debug;

use crate::core::codec;
use crate::core::column::{self, ColumnValues};
use crate::core::error::{Error, ErrorKind};
use crate::core::layout::{self, ColumnMeta, FileHeader, SchemaEntry};
use crate::core::resolve::resolve_type;

#[derive(Clone, Debug)]
pub struct PlannedColumn {
    pub entry: SchemaEntry,
    pub meta: ColumnMeta,
    pub block: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct TablePlan {
    pub header: FileHeader,
    pub columns: Vec<PlannedColumn>,
    prefix: Vec<u8>,
}

impl TablePlan {
    /// Total byte length of the file this plan produces.
    pub fn file_len(&self) -> u64 {
        let blocks: u64 = self.columns.iter().map(|col| col.meta.compressed_size).sum();
        self.prefix.len() as u64 + blocks
    }

    /// Emits header, schema, metadata table, and blocks in one forward pass.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.prefix)?;
        for column in &self.columns {
            writer.write_all(&column.block)?;
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.file_len() as usize);
        out.extend_from_slice(&self.prefix);
        for column in &self.columns {
            out.extend_from_slice(&column.block);
        }
        out
    }
}

pub fn plan_table<H, R, V>(headers: &[H], rows: &[R], level: u32) -> Result<TablePlan, Error>
where
    H: AsRef<str>,
    R: AsRef<[V]>,
    V: AsRef<str>,
{
    let column_count = u32::try_from(headers.len()).map_err(|_| {
        Error::new(ErrorKind::Schema).with_message("too many columns for a ccf file")
    })?;
    check_unique(headers)?;

    let mut texts: Vec<Vec<&str>> = (0..headers.len())
        .map(|_| Vec::with_capacity(rows.len()))
        .collect();
    for (index, row) in rows.iter().enumerate() {
        let row = row.as_ref();
        if row.len() != headers.len() {
            return Err(Error::new(ErrorKind::Schema)
                .with_message(format!("row {index} has the wrong number of values"))
                .with_mismatch(headers.len(), row.len()));
        }
        for (column, value) in texts.iter_mut().zip(row) {
            column.push(value.as_ref());
        }
    }

    let schema = headers
        .iter()
        .zip(&texts)
        .map(|(name, values)| SchemaEntry::new(name.as_ref(), resolve_type(values)))
        .collect::<Vec<_>>();

    let header = FileHeader::new(column_count, rows.len() as u64);
    let mut prefix = Vec::with_capacity(layout::data_start(&schema) as usize);
    prefix.extend_from_slice(&header.encode());
    for entry in &schema {
        entry.encode_into(&mut prefix)?;
    }

    let mut offset = layout::data_start(&schema);
    let mut columns = Vec::with_capacity(schema.len());
    for (entry, values) in schema.into_iter().zip(&texts) {
        let typed = ColumnValues::from_text(entry.column_type, values)
            .map_err(|err| err.with_column(entry.name.clone()))?;
        let raw = column::encode(&typed).map_err(|err| err.with_column(entry.name.clone()))?;
        let block = codec::compress(&raw, level)?;
        let meta = ColumnMeta::new(offset, block.len() as u64, raw.len() as u64);
        debug!(
            column = %entry.name,
            column_type = entry.column_type.name(),
            offset = meta.offset,
            raw_bytes = meta.uncompressed_size,
            compressed_bytes = meta.compressed_size,
            "column encoded"
        );
        offset += meta.compressed_size;
        columns.push(PlannedColumn { entry, meta, block });
    }

    for column in &columns {
        prefix.extend_from_slice(&column.meta.encode());
    }

    Ok(TablePlan {
        header,
        columns,
        prefix,
    })
}

fn check_unique<H: AsRef<str>>(headers: &[H]) -> Result<(), Error> {
    let mut seen = HashSet::with_capacity(headers.len());
    for name in headers {
        if !seen.insert(name.as_ref()) {
            return Err(Error::new(ErrorKind::Schema)
                .with_message("duplicate column name")
                .with_column(name.as_ref())
                .with_hint("Rename the column so every header is unique."));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::plan_table;
    use crate::core::codec::DEFAULT_LEVEL;
    use crate::core::error::ErrorKind;
    use crate::core::format::ColumnType;
    use crate::core::layout::{self, FILE_HEADER_LEN};

    #[test]
    fn blocks_are_contiguous_in_schema_order() {
        let rows = [["Alice", "30", "95.5"], ["Bob", "25", "80.0"]];
        let plan = plan_table(&["name", "age", "score"], &rows, DEFAULT_LEVEL).expect("plan");

        let types: Vec<_> = plan.columns.iter().map(|c| c.entry.column_type).collect();
        assert_eq!(types, [ColumnType::String, ColumnType::Int, ColumnType::Float]);

        let schema: Vec<_> = plan.columns.iter().map(|c| c.entry.clone()).collect();
        let mut expected = layout::data_start(&schema);
        for column in &plan.columns {
            assert_eq!(column.meta.offset, expected);
            assert_eq!(column.meta.compressed_size, column.block.len() as u64);
            expected += column.meta.compressed_size;
        }
        assert_eq!(expected, plan.file_len());
        assert_eq!(plan.to_bytes().len() as u64, plan.file_len());
        assert_eq!(plan.columns[1].meta.uncompressed_size, 8);
        assert_eq!(plan.columns[2].meta.uncompressed_size, 16);
    }

    #[test]
    fn metadata_table_holds_final_offsets() {
        let rows = [["1", "x"]];
        let plan = plan_table(&["a", "b"], &rows, DEFAULT_LEVEL).expect("plan");
        let bytes = plan.to_bytes();
        let table_start = FILE_HEADER_LEN + (2 + 1 + 1) * 2;
        for (index, column) in plan.columns.iter().enumerate() {
            let start = table_start + index * 24;
            assert_eq!(&bytes[start..start + 24], &column.meta.encode());
        }
    }

    #[test]
    fn empty_rows_resolve_every_column_to_string() {
        let rows: Vec<Vec<String>> = Vec::new();
        let plan = plan_table(&["a", "b"], &rows, DEFAULT_LEVEL).expect("plan");
        assert_eq!(plan.header.row_count, 0);
        assert!(plan.columns.iter().all(|c| c.entry.column_type == ColumnType::String));
        assert!(plan.columns.iter().all(|c| c.meta.uncompressed_size == 0));
    }

    #[test]
    fn duplicate_headers_are_rejected() {
        let rows = [["1", "2"]];
        let err = plan_table(&["a", "a"], &rows, DEFAULT_LEVEL).expect_err("dup");
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert_eq!(err.column(), Some("a"));
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let rows = vec![vec!["1", "2"], vec!["3"]];
        let err = plan_table(&["a", "b"], &rows, DEFAULT_LEVEL).expect_err("ragged");
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert!(err.message().unwrap().contains("row 1"));
        assert_eq!(err.expected(), Some("2"));
        assert_eq!(err.actual(), Some("1"));
    }

    #[test]
    fn zero_columns_is_a_valid_table() {
        let rows: Vec<Vec<&str>> = Vec::new();
        let headers: [&str; 0] = [];
        let plan = plan_table(&headers, &rows, DEFAULT_LEVEL).expect("plan");
        assert_eq!(plan.file_len(), FILE_HEADER_LEN as u64);
    }
}
