//! Error types for canopy-io.

use std::path::PathBuf;

/// Errors raised while inferring a [`DataSpec`](crate::DataSpec) from CSV.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// Returned when the input file does not exist or is unreadable.
    #[error("cannot open {path}")]
    FileNotFound {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when the CSV parser encounters a malformed record.
    #[error("CSV parse error in {path} at byte offset {offset}")]
    CsvParse {
        /// Path to the CSV file.
        path: PathBuf,
        /// Byte offset where the error occurred.
        offset: u64,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// Returned when the file has no header row at all.
    #[error("empty CSV file {path}")]
    EmptyFile {
        /// Path to the CSV file.
        path: PathBuf,
    },

    /// Returned when the header row yields zero columns.
    #[error("no columns in header of {path}")]
    NoColumns {
        /// Path to the CSV file.
        path: PathBuf,
    },

    /// Returned when the file contains a header but zero data rows.
    #[error("no data rows in {path}")]
    NoDataRows {
        /// Path to the CSV file.
        path: PathBuf,
    },

    /// Returned when two header cells carry the same column name.
    #[error("duplicate column \"{name}\" in {path}: first at {first}, again at {second}")]
    DuplicateColumn {
        /// Path to the CSV file.
        path: PathBuf,
        /// The duplicated column name.
        name: String,
        /// Zero-based position of the first occurrence.
        first: usize,
        /// Zero-based position of the second occurrence.
        second: usize,
    },

    /// Returned when a data row has a different number of fields than the header.
    #[error("inconsistent row length in {path}: row {row_index} has {got} fields, expected {expected}")]
    InconsistentRowLength {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
        /// Expected number of fields (from header).
        expected: usize,
        /// Actual number of fields in this row.
        got: usize,
    },
}

/// Errors raised while encoding CSV rows into a [`Dataset`](crate::Dataset).
#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    /// Returned when the input file does not exist or is unreadable.
    #[error("cannot open {path}")]
    FileNotFound {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when the CSV parser encounters a malformed record.
    #[error("CSV parse error in {path} at byte offset {offset}")]
    CsvParse {
        /// Path to the CSV file.
        path: PathBuf,
        /// Byte offset where the error occurred.
        offset: u64,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// Returned when the CSV header does not list the data spec's columns in order.
    #[error("header of {path} does not match the data spec at column {column_index}: expected \"{expected}\", found \"{found}\"")]
    HeaderMismatch {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based position of the first mismatching column.
        column_index: usize,
        /// Column name recorded in the data spec.
        expected: String,
        /// Column name found in the CSV header (empty when missing).
        found: String,
    },

    /// Returned when a row width disagrees with the data spec width.
    #[error("row {row_index} of {path} has {got} fields, data spec has {expected} columns")]
    RowWidthMismatch {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
        /// Number of columns in the data spec.
        expected: usize,
        /// Actual number of fields in this row.
        got: usize,
    },

    /// Returned when a single record handed to a [`RowEncoder`](crate::RowEncoder) has the wrong width.
    #[error("record has {got} fields, data spec has {expected} columns")]
    RecordWidthMismatch {
        /// Number of columns in the data spec.
        expected: usize,
        /// Actual number of fields in the record.
        got: usize,
    },

    /// Returned when encoded columns disagree with their data spec.
    #[error("column count or lengths disagree with the data spec: {reason}")]
    MalformedColumns {
        /// Human-readable description of the mismatch.
        reason: String,
    },
}
