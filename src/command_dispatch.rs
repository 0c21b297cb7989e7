//! Purpose: Hold top-level CLI command dispatch for `ccf`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Input files are checked here before the format engine is called.
//! Invariants: The engine is reached only through `Writer::write` and `Reader` reads.

use tracing::info;

use super::*;
use crate::report_json::{inspect_json, report_json, write_summary_json};
use crate::table::{TableOptions, read_table, write_table};
use ccf::api::{WriteOptions, Writer, validate_file};

pub(super) fn dispatch_command(
    command: Command,
    color_mode: ColorMode,
) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "ccf", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Version => {
            emit_version_output(color_mode);
            Ok(RunOutcome::ok())
        }
        Command::Pack {
            input,
            output,
            delimiter,
            level,
        } => {
            require_input(&input)?;
            let table_options = TableOptions::new().with_delimiter(delimiter)?;
            let table = read_table(&input, table_options)?;
            let summary = Writer::new(&output)
                .with_options(WriteOptions::new().with_compression_level(level))
                .write(&table.headers, &table.rows)?;
            info!(
                input = %input.display(),
                output = %output.display(),
                columns = summary.header.column_count,
                rows = summary.header.row_count,
                bytes = summary.file_size,
                "pack complete"
            );
            emit_json(write_summary_json(&summary), color_mode);
            Ok(RunOutcome::ok())
        }
        Command::Unpack {
            input,
            output,
            columns,
            delimiter,
        } => {
            require_input(&input)?;
            let table_options = TableOptions::new().with_delimiter(delimiter)?;
            let reader = Reader::open(&input)?;
            let set = match columns {
                Some(names) => reader.read_columns(&names)?,
                None => reader.read_all()?,
            };
            let rows = write_table(&output, &set, reader.row_count(), table_options)?;
            info!(
                input = %input.display(),
                output = %output.display(),
                columns = set.len(),
                rows,
                "unpack complete"
            );
            emit_json(
                json!({
                    "unpacked": {
                        "path": output.display().to_string(),
                        "columns": set.names().collect::<Vec<_>>(),
                        "rows": rows,
                    }
                }),
                color_mode,
            );
            Ok(RunOutcome::ok())
        }
        Command::Inspect { input, json } => {
            require_input(&input)?;
            let reader = Reader::open(&input)?;
            if json || !io::stdout().is_terminal() {
                emit_json(inspect_json(&reader), color_mode);
            } else {
                emit_inspect_human(&reader);
            }
            Ok(RunOutcome::ok())
        }
        Command::Verify { input, json } => {
            require_input(&input)?;
            let report = validate_file(&input)?;
            info!(
                input = %input.display(),
                columns = report.columns_checked,
                issues = report.issue_count(),
                "verify complete"
            );
            if json {
                emit_json(report_json(&report), color_mode);
            } else {
                emit_verify_human(&report);
            }
            if report.status == ValidationStatus::Corrupt {
                return Ok(RunOutcome::with_code(to_exit_code(ErrorKind::Corrupt)));
            }
            Ok(RunOutcome::ok())
        }
    }
}
