//! Purpose: Scalar encoding of a single column's values to and from raw bytes.
//! Exports: `ColumnValues`, `ColumnValues::from_text`, `encode`, `decode`.
//! Role: Byte layout of one uncompressed column block; compression happens elsewhere.
//! Invariants: Int is 4-byte LE i32, Float is 8-byte LE f64 per row.
//! Invariants: String is N cumulative u32 end offsets followed by the UTF-8 blob.
use crate::core::error::{Error, ErrorKind};
use crate::core::format::ColumnType;
use crate::core::resolve::{parse_float, parse_int};

#[derive(Clone, Debug, PartialEq)]
pub enum ColumnValues {
    Int(Vec<i32>),
    Float(Vec<f64>),
    String(Vec<String>),
}

impl ColumnValues {
    /// Parses raw text into the resolved column type.
    ///
    /// The type resolver has already accepted every value, so a parse failure
    /// here is an internal error rather than bad input.
    pub fn from_text<S: AsRef<str>>(
        column_type: ColumnType,
        values: &[S],
    ) -> Result<Self, Error> {
        match column_type {
            ColumnType::Int => values
                .iter()
                .enumerate()
                .map(|(row, value)| {
                    parse_int(value.as_ref()).map_err(|err| {
                        unparsable(value.as_ref(), row, column_type).with_source(err)
                    })
                })
                .collect::<Result<Vec<_>, _>>()
                .map(ColumnValues::Int),
            ColumnType::Float => values
                .iter()
                .enumerate()
                .map(|(row, value)| {
                    parse_float(value.as_ref()).map_err(|err| {
                        unparsable(value.as_ref(), row, column_type).with_source(err)
                    })
                })
                .collect::<Result<Vec<_>, _>>()
                .map(ColumnValues::Float),
            ColumnType::String => Ok(ColumnValues::String(
                values.iter().map(|value| value.as_ref().to_string()).collect(),
            )),
        }
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            ColumnValues::Int(_) => ColumnType::Int,
            ColumnValues::Float(_) => ColumnType::Float,
            ColumnValues::String(_) => ColumnType::String,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Int(values) => values.len(),
            ColumnValues::Float(values) => values.len(),
            ColumnValues::String(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_ints(&self) -> Option<&[i32]> {
        match self {
            ColumnValues::Int(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_floats(&self) -> Option<&[f64]> {
        match self {
            ColumnValues::Float(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_strings(&self) -> Option<&[String]> {
        match self {
            ColumnValues::String(values) => Some(values),
            _ => None,
        }
    }

    /// Renders one value back to text. Floats use the shortest form that
    /// parses back to the same double and always keep a decimal point or
    /// exponent (`80.0`, not `80`).
    pub fn text_at(&self, row: usize) -> Option<String> {
        match self {
            ColumnValues::Int(values) => values.get(row).map(|value| value.to_string()),
            ColumnValues::Float(values) => values.get(row).map(|value| format!("{value:?}")),
            ColumnValues::String(values) => values.get(row).cloned(),
        }
    }
}

fn unparsable(value: &str, row: usize, column_type: ColumnType) -> Error {
    Error::new(ErrorKind::Internal)
        .with_message(format!(
            "row {row}: value {value:?} rejected while encoding a {} column",
            column_type.name()
        ))
        .with_hint("Type resolution and encoding disagree; this is a bug.")
}

/// Serializes values into the raw (uncompressed) column block.
pub fn encode(values: &ColumnValues) -> Result<Vec<u8>, Error> {
    let fixed_len = values.column_type().value_width().unwrap_or_default() * values.len();
    match values {
        ColumnValues::Int(values) => {
            let mut out = Vec::with_capacity(fixed_len);
            for value in values {
                out.extend_from_slice(&value.to_le_bytes());
            }
            Ok(out)
        }
        ColumnValues::Float(values) => {
            let mut out = Vec::with_capacity(fixed_len);
            for value in values {
                out.extend_from_slice(&value.to_le_bytes());
            }
            Ok(out)
        }
        ColumnValues::String(values) => encode_strings(values),
    }
}

fn encode_strings(values: &[String]) -> Result<Vec<u8>, Error> {
    let blob_len: usize = values.iter().map(String::len).sum();
    if u32::try_from(blob_len).is_err() {
        return Err(Error::new(ErrorKind::Schema)
            .with_message("string column exceeds 4 GiB of text")
            .with_mismatch(u32::MAX, blob_len));
    }
    let mut out = Vec::with_capacity(values.len() * 4 + blob_len);
    let mut end = 0u32;
    for value in values {
        // Fits: the total was checked above.
        end += value.len() as u32;
        out.extend_from_slice(&end.to_le_bytes());
    }
    for value in values {
        out.extend_from_slice(value.as_bytes());
    }
    Ok(out)
}

/// Decodes a raw column block holding `row_count` values of `column_type`.
pub fn decode(column_type: ColumnType, raw: &[u8], row_count: u64) -> Result<ColumnValues, Error> {
    let rows = usize::try_from(row_count).map_err(|_| {
        Error::new(ErrorKind::Corrupt).with_message("row count exceeds addressable memory")
    })?;
    match column_type {
        ColumnType::Int => {
            let width = check_fixed_len(raw, rows, column_type)?;
            Ok(ColumnValues::Int(
                raw.chunks_exact(width)
                    .map(|chunk| {
                        let mut bytes = [0u8; 4];
                        bytes.copy_from_slice(chunk);
                        i32::from_le_bytes(bytes)
                    })
                    .collect(),
            ))
        }
        ColumnType::Float => {
            let width = check_fixed_len(raw, rows, column_type)?;
            Ok(ColumnValues::Float(
                raw.chunks_exact(width)
                    .map(|chunk| {
                        let mut bytes = [0u8; 8];
                        bytes.copy_from_slice(chunk);
                        f64::from_le_bytes(bytes)
                    })
                    .collect(),
            ))
        }
        ColumnType::String => decode_strings(raw, rows).map(ColumnValues::String),
    }
}

/// Checks a numeric block holds exactly `rows` values and returns the value width.
fn check_fixed_len(raw: &[u8], rows: usize, column_type: ColumnType) -> Result<usize, Error> {
    let width = column_type.value_width().ok_or_else(|| {
        Error::new(ErrorKind::Internal)
            .with_message(format!("{} columns have no fixed width", column_type.name()))
    })?;
    let expected = rows.checked_mul(width).ok_or_else(|| {
        Error::new(ErrorKind::Corrupt).with_message("row count overflows column size")
    })?;
    if raw.len() != expected {
        return Err(Error::new(ErrorKind::Corrupt)
            .with_message("column size does not match row count")
            .with_mismatch(expected, raw.len()));
    }
    Ok(width)
}

fn decode_strings(raw: &[u8], rows: usize) -> Result<Vec<String>, Error> {
    let table_len = rows
        .checked_mul(4)
        .filter(|len| *len <= raw.len())
        .ok_or_else(|| {
            Error::new(ErrorKind::Corrupt)
                .with_message("string offset table exceeds column block")
                .with_mismatch(format!("{rows} offsets"), format!("{} bytes", raw.len()))
        })?;
    let (table, blob) = raw.split_at(table_len);

    let mut values = Vec::with_capacity(rows);
    let mut start = 0usize;
    for (row, chunk) in table.chunks_exact(4).enumerate() {
        let end = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as usize;
        if end < start || end > blob.len() {
            return Err(Error::new(ErrorKind::Corrupt)
                .with_message(format!("row {row}: string offset out of bounds"))
                .with_mismatch(format!("{start}..={}", blob.len()), end));
        }
        let text = std::str::from_utf8(&blob[start..end]).map_err(|err| {
            Error::new(ErrorKind::Corrupt)
                .with_message(format!("row {row}: string is not valid utf-8"))
                .with_source(err)
        })?;
        values.push(text.to_string());
        start = end;
    }
    if start != blob.len() {
        return Err(Error::new(ErrorKind::Corrupt)
            .with_message("trailing bytes after last string")
            .with_mismatch(start, blob.len()));
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::{ColumnValues, decode, encode};
    use crate::core::error::ErrorKind;
    use crate::core::format::ColumnType;

    #[test]
    fn int_layout_is_le_i32() {
        let values = ColumnValues::from_text(ColumnType::Int, &["1", "-2"]).expect("parse");
        let raw = encode(&values).expect("encode");
        assert_eq!(raw, [1, 0, 0, 0, 0xfe, 0xff, 0xff, 0xff]);
        assert_eq!(decode(ColumnType::Int, &raw, 2).expect("decode"), values);
    }

    #[test]
    fn float_layout_is_le_f64() {
        let values = ColumnValues::from_text(ColumnType::Float, &["1", "2.5"]).expect("parse");
        assert_eq!(values, ColumnValues::Float(vec![1.0, 2.5]));
        let raw = encode(&values).expect("encode");
        assert_eq!(&raw[8..16], &2.5f64.to_le_bytes());
        assert_eq!(decode(ColumnType::Float, &raw, 2).expect("decode"), values);
    }

    #[test]
    fn string_layout_is_offsets_then_blob() {
        let values = ColumnValues::from_text(ColumnType::String, &["ab", "", "ü"]).expect("parse");
        let raw = encode(&values).expect("encode");
        let mut expected = Vec::new();
        expected.extend_from_slice(&2u32.to_le_bytes());
        expected.extend_from_slice(&2u32.to_le_bytes());
        expected.extend_from_slice(&4u32.to_le_bytes());
        expected.extend_from_slice("abü".as_bytes());
        assert_eq!(raw, expected);
        assert_eq!(decode(ColumnType::String, &raw, 3).expect("decode"), values);
    }

    #[test]
    fn empty_columns_encode_to_nothing() {
        for ty in [ColumnType::Int, ColumnType::Float, ColumnType::String] {
            let values = ColumnValues::from_text::<&str>(ty, &[]).expect("parse");
            let raw = encode(&values).expect("encode");
            assert!(raw.is_empty());
            let decoded = decode(ty, &raw, 0).expect("decode");
            assert!(decoded.is_empty());
            assert_eq!(decoded.column_type(), ty);
        }
    }

    #[test]
    fn parse_disagreement_is_internal_error() {
        let err = ColumnValues::from_text(ColumnType::Int, &["1", "x"]).expect_err("bad int");
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(err.message().unwrap().contains("row 1"));

        let err = ColumnValues::from_text(ColumnType::Float, &["nope"]).expect_err("bad float");
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn encoded_size_follows_value_width() {
        for (ty, text) in [(ColumnType::Int, "7"), (ColumnType::Float, "7.5")] {
            let values = ColumnValues::from_text(ty, &[text, text, text]).expect("parse");
            let raw = encode(&values).expect("encode");
            assert_eq!(Some(raw.len()), ty.value_width().map(|width| width * 3));
        }
        assert_eq!(ColumnType::String.value_width(), None);
    }

    #[test]
    fn padded_numbers_parse_like_the_resolver() {
        let ints = ColumnValues::from_text(ColumnType::Int, &[" 30", "25 "]).expect("ints");
        assert_eq!(ints, ColumnValues::Int(vec![30, 25]));
        let floats =
            ColumnValues::from_text(ColumnType::Float, &[" 95.5", "80.0 "]).expect("floats");
        assert_eq!(floats, ColumnValues::Float(vec![95.5, 80.0]));
    }

    #[test]
    fn fixed_width_size_mismatch_is_corrupt() {
        let err = decode(ColumnType::Int, &[0u8; 7], 2).expect_err("short");
        assert_eq!(err.kind(), ErrorKind::Corrupt);
        assert_eq!(err.expected(), Some("8"));
        let err = decode(ColumnType::Float, &[0u8; 16], 1).expect_err("long");
        assert_eq!(err.kind(), ErrorKind::Corrupt);
    }

    #[test]
    fn decreasing_string_offset_is_corrupt() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&3u32.to_le_bytes());
        raw.extend_from_slice(&1u32.to_le_bytes());
        raw.extend_from_slice(b"abc");
        let err = decode(ColumnType::String, &raw, 2).expect_err("decreasing");
        assert_eq!(err.kind(), ErrorKind::Corrupt);
    }

    #[test]
    fn out_of_bounds_string_offset_is_corrupt() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&9u32.to_le_bytes());
        raw.extend_from_slice(b"abc");
        let err = decode(ColumnType::String, &raw, 1).expect_err("oob");
        assert_eq!(err.kind(), ErrorKind::Corrupt);

        let err = decode(ColumnType::String, &[0u8; 3], 1).expect_err("short table");
        assert_eq!(err.kind(), ErrorKind::Corrupt);
    }

    #[test]
    fn trailing_string_bytes_are_corrupt() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&1u32.to_le_bytes());
        raw.extend_from_slice(b"ab");
        let err = decode(ColumnType::String, &raw, 1).expect_err("trailing");
        assert_eq!(err.kind(), ErrorKind::Corrupt);
    }

    #[test]
    fn invalid_utf8_is_corrupt() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&2u32.to_le_bytes());
        raw.extend_from_slice(&[0xc3, 0x28]);
        let err = decode(ColumnType::String, &raw, 1).expect_err("utf8");
        assert_eq!(err.kind(), ErrorKind::Corrupt);
    }

    #[test]
    fn text_rendering_round_trips() {
        let floats = ColumnValues::Float(vec![80.0, 95.5, 1e21]);
        assert_eq!(floats.text_at(0).as_deref(), Some("80.0"));
        assert_eq!(floats.text_at(1).as_deref(), Some("95.5"));
        assert_eq!(floats.text_at(2).unwrap().parse::<f64>().unwrap(), 1e21);
        assert_eq!(floats.text_at(3), None);
        assert_eq!(ColumnValues::Int(vec![-4]).text_at(0).as_deref(), Some("-4"));
    }
}
