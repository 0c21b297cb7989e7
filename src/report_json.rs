//! Purpose: Shared JSON serializers for pack/inspect/verify output.
//! Exports: `write_summary_json`, `inspect_json`, `report_json`.
//! Role: Keep CLI envelope shapes consistent across commands.
//! Invariants: Stable key names/order; per-column entries follow schema order.

use ccf::api::{
    ColumnMeta, ColumnType, Reader, ValidationReport, ValidationStatus, WriteSummary,
};
use serde_json::{Map, Value, json};

pub(crate) fn write_summary_json(summary: &WriteSummary) -> Value {
    let columns = summary
        .columns
        .iter()
        .map(|column| column_json(&column.name, column.column_type, column.meta))
        .collect::<Vec<_>>();
    json!({
        "packed": {
            "path": summary.path.display().to_string(),
            "version": summary.header.version,
            "rows": summary.header.row_count,
            "column_count": summary.header.column_count,
            "file_size": summary.file_size,
            "columns": columns,
        }
    })
}

pub(crate) fn inspect_json(reader: &Reader) -> Value {
    let header = reader.header();
    let columns = reader
        .schema()
        .iter()
        .zip(reader.column_meta())
        .map(|(entry, meta)| column_json(&entry.name, entry.column_type, *meta))
        .collect::<Vec<_>>();
    let mut map = Map::new();
    map.insert(
        "path".to_string(),
        json!(reader.path().display().to_string()),
    );
    map.insert("version".to_string(), json!(header.version));
    map.insert("rows".to_string(), json!(header.row_count));
    map.insert("column_count".to_string(), json!(header.column_count));
    map.insert("file_size".to_string(), json!(reader.file_size()));
    map.insert("columns".to_string(), Value::Array(columns));
    Value::Object(map)
}

pub(crate) fn report_json(report: &ValidationReport) -> Value {
    let status = match report.status {
        ValidationStatus::Ok => "ok",
        ValidationStatus::Corrupt => "corrupt",
    };
    let issues = report
        .issues
        .iter()
        .map(|issue| {
            let mut map = Map::new();
            map.insert("code".to_string(), json!(issue.code));
            map.insert("message".to_string(), json!(issue.message));
            if let Some(column) = &issue.column {
                map.insert("column".to_string(), json!(column));
            }
            if let Some(offset) = issue.offset {
                map.insert("offset".to_string(), json!(offset));
            }
            Value::Object(map)
        })
        .collect::<Vec<_>>();

    let mut map = Map::new();
    map.insert(
        "path".to_string(),
        json!(report.path.display().to_string()),
    );
    map.insert("status".to_string(), json!(status));
    if let Some(rows) = report.row_count {
        map.insert("rows".to_string(), json!(rows));
    }
    map.insert("columns_checked".to_string(), json!(report.columns_checked));
    map.insert("issue_count".to_string(), json!(report.issue_count()));
    map.insert("issues".to_string(), Value::Array(issues));
    if !report.remediation_hints.is_empty() {
        map.insert(
            "remediation_hints".to_string(),
            json!(report.remediation_hints),
        );
    }
    Value::Object(map)
}

fn column_json(name: &str, column_type: ColumnType, meta: ColumnMeta) -> Value {
    json!({
        "name": name,
        "type": column_type,
        "offset": meta.offset,
        "compressed_size": meta.compressed_size,
        "uncompressed_size": meta.uncompressed_size,
    })
}

#[cfg(test)]
mod tests {
    use super::{inspect_json, report_json, write_summary_json};
    use ccf::api::{Reader, Writer, validate_file};

    #[test]
    fn summary_and_inspect_agree() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("t.ccf");
        let rows = [["Alice", "30"], ["Bob", "25"]];
        let summary = Writer::new(&path)
            .write(&["name", "age"], &rows)
            .expect("write");
        let reader = Reader::open(&path).expect("open");

        let packed = write_summary_json(&summary);
        let inspected = inspect_json(&reader);
        assert_eq!(packed["packed"]["columns"], inspected["columns"]);
        assert_eq!(inspected["rows"], 2);
        assert_eq!(inspected["columns"][0]["type"], "string");
        assert_eq!(inspected["columns"][1]["type"], "int");
        assert_eq!(inspected["file_size"], summary.file_size);
    }

    #[test]
    fn report_omits_hints_when_ok() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("t.ccf");
        Writer::new(&path).write(&["a"], &[["1"]]).expect("write");

        let value = report_json(&validate_file(&path).expect("validate"));
        assert_eq!(value["status"], "ok");
        assert_eq!(value["issue_count"], 0);
        assert!(value.get("remediation_hints").is_none());
    }
}
