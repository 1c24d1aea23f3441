//! Shared CSV plumbing for schema inference and encoding.

use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use crate::error::{EncodingError, SchemaError};

/// Cell values treated as missing (compared after trimming).
const MISSING_TOKENS: &[&str] = &["", "NA", "N/A", "na", "n/a", "nan", "NaN", "?"];

/// Return `true` when `raw` denotes a missing value.
pub(crate) fn is_missing_token(raw: &str) -> bool {
    MISSING_TOKENS.contains(&raw)
}

/// Failure opening a CSV source or reading a record, before it is tagged
/// with the caller's error family.
#[derive(Debug)]
pub(crate) enum SourceError {
    Open(std::io::Error),
    Csv(csv::Error),
    Empty,
}

impl SourceError {
    pub(crate) fn into_schema(self, path: &Path) -> SchemaError {
        match self {
            SourceError::Open(source) => SchemaError::FileNotFound {
                path: path.to_path_buf(),
                source,
            },
            SourceError::Csv(source) => SchemaError::CsvParse {
                path: path.to_path_buf(),
                offset: source.position().map_or(0, |p| p.byte()),
                source,
            },
            SourceError::Empty => SchemaError::EmptyFile {
                path: path.to_path_buf(),
            },
        }
    }

    pub(crate) fn into_encoding(self, path: &Path, expected_first: &str) -> EncodingError {
        match self {
            SourceError::Open(source) => EncodingError::FileNotFound {
                path: path.to_path_buf(),
                source,
            },
            SourceError::Csv(source) => EncodingError::CsvParse {
                path: path.to_path_buf(),
                offset: source.position().map_or(0, |p| p.byte()),
                source,
            },
            SourceError::Empty => EncodingError::HeaderMismatch {
                path: path.to_path_buf(),
                column_index: 0,
                expected: expected_first.to_string(),
                found: String::new(),
            },
        }
    }
}

/// An opened CSV file whose header has already been read.
pub(crate) struct CsvSource {
    path: PathBuf,
    reader: csv::Reader<File>,
    header: Vec<String>,
}

impl CsvSource {
    /// Open `path` and read its header row.
    pub(crate) fn open(path: &Path) -> Result<Self, SourceError> {
        let file = File::open(path).map_err(SourceError::Open)?;
        let is_empty = file.metadata().map_err(SourceError::Open)?.len() == 0;
        if is_empty {
            return Err(SourceError::Empty);
        }

        // flexible(true) lets rows of the wrong width through, so the callers'
        // own width checks report them instead of a generic parse error.
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let header: Vec<String> = reader
            .headers()
            .map_err(SourceError::Csv)?
            .iter()
            .map(String::from)
            .collect();
        debug!(n_columns = header.len(), "read CSV header");

        Ok(Self {
            path: path.to_path_buf(),
            reader,
            header,
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn header(&self) -> &[String] {
        &self.header
    }

    /// Iterate the data records, numbered from zero.
    pub(crate) fn records(
        &mut self,
    ) -> impl Iterator<Item = (usize, Result<csv::StringRecord, SourceError>)> + '_ {
        self.reader
            .records()
            .map(|r| r.map_err(SourceError::Csv))
            .enumerate()
    }
}

/// Read only the header row of a CSV file.
///
/// Used to resolve column names (e.g. the label) before any data row is scanned.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`SchemaError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`SchemaError::EmptyFile`] | File is empty |
/// | [`SchemaError::CsvParse`] | Malformed header record |
/// | [`SchemaError::NoColumns`] | Header has zero columns |
#[instrument(skip_all, fields(path = %path.display()))]
pub fn read_header(path: &Path) -> Result<Vec<String>, SchemaError> {
    let source = CsvSource::open(path).map_err(|e| e.into_schema(path))?;
    if source.header().is_empty() {
        return Err(SchemaError::NoColumns {
            path: path.to_path_buf(),
        });
    }
    Ok(source.header().to_vec())
}
