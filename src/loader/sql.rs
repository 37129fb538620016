//! Fixed load targets and the Snowflake statements built around them.

use arrow_schema::{DataType, Schema};
use std::path::Path;

/// Table every load appends into.
pub const DESTINATION_TABLE: &str = "FRAUD_DATA";

/// Named stage used by the stage-and-copy path.
pub const STAGE: &str = "@FRAUD_STAGE";

/// Named CSV file format the staged COPY parses with.
pub const FILE_FORMAT: &str = "CSV_FORMAT";

/// Row-level error tolerance of the staged COPY: bad rows are skipped.
pub const ON_ERROR: &str = "CONTINUE";

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Snowflake column type for an inferred CSV column.
pub fn snowflake_type(data_type: &DataType) -> &'static str {
    match data_type {
        DataType::Boolean => "BOOLEAN",
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => "NUMBER(38,0)",
        DataType::Float16 | DataType::Float32 | DataType::Float64 => "FLOAT",
        DataType::Date32 | DataType::Date64 => "DATE",
        DataType::Timestamp(_, None) => "TIMESTAMP_NTZ",
        DataType::Timestamp(_, Some(_)) => "TIMESTAMP_TZ",
        _ => "VARCHAR",
    }
}

/// `CREATE TABLE IF NOT EXISTS` with one column per schema field. An
/// existing table is left as is, so repeated loads append.
pub fn create_table_if_absent(table: &str, schema: &Schema) -> String {
    let columns: Vec<String> = schema
        .fields()
        .iter()
        .map(|f| format!("{} {}", quote_ident(f.name()), snowflake_type(f.data_type())))
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        table,
        columns.join(", ")
    )
}

fn flag(value: bool) -> &'static str {
    if value {
        "TRUE"
    } else {
        "FALSE"
    }
}

/// Upload a local file to a stage location.
pub fn put_file(local: &Path, stage_location: &str, auto_compress: bool, overwrite: bool) -> String {
    let local = local.to_string_lossy().replace('\\', "/");
    format!(
        "PUT {} {} AUTO_COMPRESS = {} OVERWRITE = {}",
        quote_literal(&format!("file://{}", local)),
        stage_location,
        flag(auto_compress),
        flag(overwrite)
    )
}

/// The table's own internal stage.
pub fn table_stage(table: &str) -> String {
    format!("@%{}", table)
}

/// Append a staged Parquet file into `table`, matching columns by name and
/// removing the staged file afterwards. Any bad row aborts the statement.
pub fn copy_parquet_from_table_stage(table: &str, staged_file: &str) -> String {
    format!(
        "COPY INTO {} FROM {} FILES = ({}) FILE_FORMAT = (TYPE = PARQUET) \
         MATCH_BY_COLUMN_NAME = CASE_INSENSITIVE PURGE = TRUE",
        table,
        table_stage(table),
        quote_literal(staged_file)
    )
}

/// COPY a file from a named stage using a named file format. The stage path
/// is a quoted literal so any file name survives.
pub fn copy_staged_csv(table: &str, stage: &str, staged_file: &str, file_format: &str) -> String {
    format!(
        "COPY INTO {} FROM {} FILE_FORMAT = (FORMAT_NAME = {}) ON_ERROR = {}",
        table,
        quote_literal(&format!("{}/{}", stage, staged_file)),
        quote_literal(file_format),
        quote_literal(ON_ERROR)
    )
}
