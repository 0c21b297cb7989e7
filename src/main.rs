//! Purpose: `ccf` CLI entry point.
//! Role: Binary crate root; parses args, runs commands, emits JSON on stdout.
//! Invariants: Commands emit stable stdout formats (human or JSON by command/flags).
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
//! Invariants: Diagnostics go through `tracing` to stderr; stdout stays machine-readable.
#![allow(clippy::result_large_err)]
use std::error::Error as StdError;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};

use clap::{
    CommandFactory, Parser, Subcommand, ValueEnum, ValueHint, error::ErrorKind as ClapErrorKind,
};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

mod command_dispatch;
mod report_json;
mod table;

use ccf::api::{
    DEFAULT_LEVEL, Error, ErrorKind, Reader, ValidationReport, ValidationStatus, to_exit_code,
};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(clap_error_summary(&err))
                        .with_hint(clap_error_hint(&err)),
                    ColorMode::Auto,
                ));
            }
        },
    };

    init_tracing();
    let color_mode = cli.color;

    command_dispatch::dispatch_command(cli.command, color_mode)
        .map_err(add_corrupt_hint)
        .map_err(add_io_hint)
        .map_err(add_internal_hint)
        .map_err(|err| (err, color_mode))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

#[derive(Parser)]
#[command(
    name = "ccf",
    version,
    about = "Compact columnar files for tabular data",
    long_about = None,
    before_help = r#"A .ccf file stores each column as its own compressed block,
so reading a few columns never touches the rest.

Mental model:
  - `pack` turns a delimited text table into a .ccf file
  - `unpack` turns a .ccf file (or some of its columns) back into a table
  - `inspect` shows the schema without decoding any column
"#,
    after_help = r#"EXAMPLES
  $ ccf pack people.csv people.ccf
  $ ccf inspect people.ccf
  $ ccf unpack people.ccf names.csv --columns name
  $ ccf verify people.ccf

LEARN MORE
  $ ccf <command> --help
  Set RUST_LOG=debug to trace per-column encode/decode on stderr."#
)]
struct Cli {
    #[arg(
        long,
        value_enum,
        default_value = "auto",
        global = true,
        help = "Colorize output (auto|always|never)"
    )]
    color: ColorMode,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(
        arg_required_else_help = true,
        about = "Pack a delimited text table into a .ccf file",
        long_about = r#"Read a delimited text table and write it as a .ccf file.

The first record is the header row. Each column is typed as int, float,
or string from its values, then compressed independently.
An input with no records produces a file with zero columns and zero rows."#,
        after_help = r#"EXAMPLES
  $ ccf pack people.csv people.ccf
  $ ccf pack people.tsv people.ccf --delimiter '\t'
  $ ccf pack big.csv big.ccf --level 9

NOTES
  - Existing output files are overwritten.
  - Header names must be unique."#
    )]
    Pack {
        #[arg(help = "Input text table", value_hint = ValueHint::FilePath)]
        input: PathBuf,
        #[arg(help = "Output .ccf file", value_hint = ValueHint::FilePath)]
        output: PathBuf,
        #[arg(
            long,
            default_value = ",",
            value_parser = parse_delimiter,
            help = "Field delimiter (one ASCII character, `\\t` for tab)"
        )]
        delimiter: char,
        #[arg(long, default_value_t = DEFAULT_LEVEL, help = "zlib compression level (0-9)")]
        level: u32,
    },
    #[command(
        arg_required_else_help = true,
        about = "Unpack a .ccf file into a delimited text table",
        long_about = r#"Decode a .ccf file back into a delimited text table.

With --columns, only the named columns are read from disk, and they
are written in the order given."#,
        after_help = r#"EXAMPLES
  $ ccf unpack people.ccf people.csv
  $ ccf unpack people.ccf subset.csv --columns score,name"#
    )]
    Unpack {
        #[arg(help = "Input .ccf file", value_hint = ValueHint::FilePath)]
        input: PathBuf,
        #[arg(help = "Output text table", value_hint = ValueHint::FilePath)]
        output: PathBuf,
        #[arg(long, value_delimiter = ',', help = "Columns to extract, comma-separated")]
        columns: Option<Vec<String>>,
        #[arg(
            long,
            default_value = ",",
            value_parser = parse_delimiter,
            help = "Field delimiter (one ASCII character, `\\t` for tab)"
        )]
        delimiter: char,
    },
    #[command(
        arg_required_else_help = true,
        about = "Show the schema and layout of a .ccf file",
        long_about = r#"Print version, row count, and per-column name, type, and sizes.

Only the header, schema, and metadata table are read."#,
        after_help = r#"EXAMPLES
  $ ccf inspect people.ccf
  $ ccf inspect people.ccf --json"#
    )]
    Inspect {
        #[arg(help = "Input .ccf file", value_hint = ValueHint::FilePath)]
        input: PathBuf,
        #[arg(long, help = "Emit JSON instead of a human-readable table")]
        json: bool,
    },
    #[command(
        arg_required_else_help = true,
        about = "Decode every column and report integrity issues",
        after_help = r#"EXAMPLES
  $ ccf verify people.ccf
  $ ccf verify people.ccf --json

NOTES
  - Exits nonzero when corruption is detected."#
    )]
    Verify {
        #[arg(help = "Input .ccf file", value_hint = ValueHint::FilePath)]
        input: PathBuf,
        #[arg(long, help = "Emit JSON instead of human-readable output")]
        json: bool,
    },
    #[command(
        about = "Print version info as JSON",
        after_help = r#"EXAMPLES
  $ ccf version"#
    )]
    Version,
    #[command(
        arg_required_else_help = true,
        about = "Generate shell completions",
        after_help = r#"EXAMPLES
  $ ccf completion bash > ~/.local/share/bash-completion/completions/ccf
  $ ccf completion zsh > ~/.zfunc/_ccf
  $ ccf completion fish > ~/.config/fish/completions/ccf.fish"#
    )]
    Completion {
        #[arg(help = "Shell to generate completions for")]
        shell: Shell,
    },
}

fn parse_delimiter(raw: &str) -> Result<char, String> {
    match raw {
        "\\t" | "tab" => return Ok('\t'),
        _ => {}
    }
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) if ch.is_ascii() => Ok(ch),
        _ => Err(format!("expected a single ASCII character, got {raw:?}")),
    }
}

/// Fails with an `Io` error before any format code runs if `path` is missing.
fn require_input(path: &Path) -> Result<(), Error> {
    if path.is_file() {
        return Ok(());
    }
    let message = if path.exists() {
        "input is not a regular file"
    } else {
        "input file not found"
    };
    Err(Error::new(ErrorKind::Io)
        .with_message(message)
        .with_path(path)
        .with_hint("Check the path and try again."))
}

fn add_io_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Io || err.hint().is_some() {
        return err;
    }
    err.with_hint("I/O error. Check the path, permissions, and disk space.")
}

fn add_corrupt_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Corrupt || err.hint().is_some() {
        return err;
    }
    err.with_hint(
        "File appears corrupt. Run `ccf verify` for details, or repack from the source table.",
    )
}

fn add_internal_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Internal || err.hint().is_some() {
        return err;
    }
    err.with_hint(
        "Unexpected internal failure. Retry with RUST_LOG=debug and report the input if it recurs.",
    )
}

fn emit_version_output(color_mode: ColorMode) {
    if io::stdout().is_terminal() {
        println!("ccf {}", env!("CARGO_PKG_VERSION"));
    } else {
        emit_json(
            json!({
                "name": "ccf",
                "version": env!("CARGO_PKG_VERSION"),
            }),
            color_mode,
        );
    }
}

fn emit_inspect_human(reader: &Reader) {
    let header = reader.header();
    println!("{}", reader.path().display());
    println!("  version:  {}", header.version);
    println!("  rows:     {}", header.row_count);
    println!("  columns:  {}", header.column_count);
    println!("  size:     {} bytes", reader.file_size());
    if reader.schema().is_empty() {
        return;
    }
    println!();
    let rows = reader
        .schema()
        .iter()
        .zip(reader.column_meta())
        .map(|(entry, meta)| {
            vec![
                entry.name.clone(),
                entry.column_type.name().to_string(),
                meta.compressed_size.to_string(),
                meta.uncompressed_size.to_string(),
            ]
        })
        .collect::<Vec<_>>();
    emit_table(&["NAME", "TYPE", "COMPRESSED", "RAW"], &rows);
}

fn emit_verify_human(report: &ValidationReport) {
    let label = report.path.display();
    if !io::stdout().is_terminal() {
        match report.status {
            ValidationStatus::Ok => println!("OK: {label}"),
            ValidationStatus::Corrupt => {
                let issue = report
                    .issues
                    .first()
                    .map(|issue| format!(" issue={}", issue.message))
                    .unwrap_or_default();
                println!("CORRUPT: {label}{issue}");
            }
        }
        return;
    }

    let rows = report
        .row_count
        .map(|rows| rows.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    match report.status {
        ValidationStatus::Ok => {
            println!("{label}: healthy");
            println!("  rows:     {rows}");
            println!("  checked:  {} columns, 0 issues", report.columns_checked);
        }
        ValidationStatus::Corrupt => {
            println!("{label}: corrupt");
            println!("  rows:     {rows}");
            println!(
                "  checked:  {} columns, {} issues",
                report.columns_checked,
                report.issue_count()
            );
            for issue in &report.issues {
                match &issue.column {
                    Some(column) => println!("  detail:   [{column}] {}", issue.message),
                    None => println!("  detail:   {}", issue.message),
                }
            }
        }
    }
}

fn emit_table(headers: &[&str], rows: &[Vec<String>]) {
    println!("{}", render_table(headers, rows));
}

fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    if headers.is_empty() {
        return String::new();
    }
    let mut widths = headers
        .iter()
        .map(|header| header.chars().count())
        .collect::<Vec<_>>();
    let sanitized_rows = rows
        .iter()
        .map(|row| {
            widths
                .iter_mut()
                .enumerate()
                .map(|(idx, width)| {
                    let cell = sanitize_table_cell(row.get(idx).map(String::as_str).unwrap_or(""));
                    *width = (*width).max(cell.chars().count());
                    cell
                })
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    let header_cells = headers.iter().map(|h| h.to_string()).collect::<Vec<_>>();
    let mut lines = Vec::with_capacity(sanitized_rows.len() + 1);
    lines.push(format_table_line(&header_cells, &widths));
    for row in &sanitized_rows {
        lines.push(format_table_line(row, &widths));
    }
    lines.join("\n")
}

fn sanitize_table_cell(value: &str) -> String {
    value.replace('\n', "\\n").replace('\r', "\\r")
}

fn format_table_line(cells: &[String], widths: &[usize]) -> String {
    let mut line = String::new();
    for (idx, width) in widths.iter().enumerate() {
        if idx > 0 {
            line.push_str("  ");
        }
        let cell = cells.get(idx).map(String::as_str).unwrap_or("");
        line.push_str(cell);
        let cell_len = cell.chars().count();
        if *width > cell_len && idx + 1 < widths.len() {
            line.push_str(&" ".repeat(*width - cell_len));
        }
    }
    line
}

fn emit_json(value: Value, color_mode: ColorMode) {
    let is_tty = io::stdout().is_terminal();
    let pretty = is_tty || color_mode.use_color(is_tty);
    let json = if pretty {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

#[derive(Copy, Clone, Debug)]
enum AnsiColor {
    Red,
    Yellow,
}

fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Yellow => "33",
    };
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let json = serde_json::to_string(&error_json(err)).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error",
        ErrorKind::Usage => "usage error",
        ErrorKind::ColumnNotFound => "column not found",
        ErrorKind::Format => "not a ccf file",
        ErrorKind::Schema => "invalid schema",
        ErrorKind::Corrupt => "corrupt data",
        ErrorKind::Io => "i/o error",
    }
    .to_string()
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    if let Some(column) = err.column() {
        inner.insert("column".to_string(), json!(column));
    }
    if let Some(offset) = err.offset() {
        inner.insert("offset".to_string(), json!(offset));
    }
    if let Some(expected) = err.expected() {
        inner.insert("expected".to_string(), json!(expected));
    }
    if let Some(actual) = err.actual() {
        inner.insert("actual".to_string(), json!(actual));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error, use_color: bool) -> String {
    let label = |name: &str| colorize_label(name, use_color, AnsiColor::Yellow);
    let mut lines = vec![format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        error_message(err)
    )];
    if let Some(hint) = err.hint() {
        lines.push(format!("{} {hint}", label("hint:")));
    }
    if let Some(path) = err.path() {
        lines.push(format!("{} {}", label("path:"), path.display()));
    }
    if let Some(column) = err.column() {
        lines.push(format!("{} {column}", label("column:")));
    }
    if let Some(offset) = err.offset() {
        lines.push(format!("{} {offset}", label("offset:")));
    }
    if let (Some(expected), Some(actual)) = (err.expected(), err.actual()) {
        lines.push(format!("{} {expected}, found {actual}", label("expected:")));
    }
    if let Some(cause) = error_causes(err).first() {
        lines.push(format!("{} {cause}", label("caused by:")));
    }
    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

fn clap_error_hint(err: &clap::Error) -> String {
    let usage = err
        .to_string()
        .lines()
        .find_map(|line| line.trim().strip_prefix("Usage: ").map(str::to_string));
    match usage {
        Some(usage) => format!("Usage: {}. Try `ccf --help`.", usage.trim()),
        None => "Try `ccf --help`.".to_string(),
    }
}
