//! Encoding of raw CSV cells into a columnar [`Dataset`].

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info, instrument};

use crate::dataset::{ColumnData, Dataset, Value};
use crate::error::EncodingError;
use crate::inference::{parse_bool_literal, parse_number};
use crate::source::{CsvSource, is_missing_token};
use crate::spec::{ColumnKind, DataSpec};

/// Encodes raw records cell by cell according to a [`DataSpec`].
///
/// Unparseable and missing cells become [`Value::Missing`]; categorical
/// values absent from the dictionary (out of vocabulary) are missing too.
#[derive(Debug)]
pub struct RowEncoder<'a> {
    spec: &'a DataSpec,
    lookups: Vec<Option<HashMap<&'a str, u32>>>,
}

impl<'a> RowEncoder<'a> {
    /// Prepare dictionary lookups for every categorical column of `spec`.
    #[must_use]
    pub fn new(spec: &'a DataSpec) -> Self {
        let lookups = spec
            .columns()
            .iter()
            .map(|col| col.dictionary().map(|d| d.lookup()))
            .collect();
        Self { spec, lookups }
    }

    /// Encode one cell of `column`.
    ///
    /// # Panics
    ///
    /// Panics if `column` is out of range for the data spec.
    #[must_use]
    pub fn encode_cell(&self, column: usize, raw: &str) -> Value {
        let raw = raw.trim();
        if is_missing_token(raw) {
            return Value::Missing;
        }
        match self.spec.columns()[column].kind() {
            ColumnKind::Numerical => parse_number(raw).map_or(Value::Missing, Value::Numerical),
            ColumnKind::Boolean => {
                let parsed = parse_bool_literal(raw).or(match raw {
                    "1" => Some(true),
                    "0" => Some(false),
                    _ => None,
                });
                parsed.map_or(Value::Missing, Value::Boolean)
            }
            ColumnKind::Categorical => self.lookups[column]
                .as_ref()
                .and_then(|lookup| lookup.get(raw))
                .map_or(Value::Missing, |&code| Value::Categorical(code)),
        }
    }

    /// Encode a full record into an example.
    ///
    /// # Errors
    ///
    /// Returns [`EncodingError::RecordWidthMismatch`] when the record width
    /// differs from the data spec width.
    pub fn encode<'r, I>(&self, record: I) -> Result<Vec<Value>, EncodingError>
    where
        I: IntoIterator<Item = &'r str>,
    {
        let cells: Vec<&str> = record.into_iter().collect();
        if cells.len() != self.spec.n_columns() {
            return Err(EncodingError::RecordWidthMismatch {
                expected: self.spec.n_columns(),
                got: cells.len(),
            });
        }
        Ok(cells
            .iter()
            .enumerate()
            .map(|(column, raw)| self.encode_cell(column, raw))
            .collect())
    }
}

/// Reads a CSV file and encodes it column by column into a [`Dataset`].
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`EncodingError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`EncodingError::CsvParse`] | Malformed CSV record |
/// | [`EncodingError::HeaderMismatch`] | Header differs from the data spec columns |
/// | [`EncodingError::RowWidthMismatch`] | Row width differs from the data spec width |
pub struct ColumnEncoder<'a> {
    spec: &'a DataSpec,
}

impl<'a> ColumnEncoder<'a> {
    /// Create an encoder for `spec`.
    #[must_use]
    pub fn new(spec: &'a DataSpec) -> Self {
        Self { spec }
    }

    /// Read and encode the CSV file at `path`.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn encode(&self, path: &Path) -> Result<Dataset, EncodingError> {
        let first_name = self.spec.column(0).map_or("", |c| c.name());
        let mut source =
            CsvSource::open(path).map_err(|e| e.into_encoding(path, first_name))?;

        let expected = self.spec.n_columns();
        for column_index in 0..expected.max(source.header().len()) {
            let wanted = self.spec.column(column_index).map(|c| c.name());
            let found = source.header().get(column_index).map(String::as_str);
            if wanted != found {
                return Err(EncodingError::HeaderMismatch {
                    path: path.to_path_buf(),
                    column_index,
                    expected: wanted.unwrap_or_default().to_string(),
                    found: found.unwrap_or_default().to_string(),
                });
            }
        }

        let row_encoder = RowEncoder::new(self.spec);
        let mut columns: Vec<ColumnData> = self
            .spec
            .columns()
            .iter()
            .map(|col| match col.kind() {
                ColumnKind::Numerical => ColumnData::Numerical(Vec::new()),
                ColumnKind::Boolean => ColumnData::Boolean(Vec::new()),
                ColumnKind::Categorical => ColumnData::Categorical(Vec::new()),
            })
            .collect();

        let owned_path = path.to_path_buf();
        let mut n_missing = 0usize;
        for (row_index, record) in source.records() {
            let record = record.map_err(|e| e.into_encoding(&owned_path, first_name))?;
            if record.len() != expected {
                return Err(EncodingError::RowWidthMismatch {
                    path: owned_path,
                    row_index,
                    expected,
                    got: record.len(),
                });
            }
            for (column, (data, raw)) in columns.iter_mut().zip(record.iter()).enumerate() {
                let value = row_encoder.encode_cell(column, raw);
                if value == Value::Missing {
                    n_missing += 1;
                }
                data.push(value);
            }
        }

        let dataset = Dataset::new(self.spec.clone(), columns)?;
        debug!(n_missing, "missing cells encoded as sentinels");
        info!(
            n_rows = dataset.n_rows(),
            n_columns = dataset.n_columns(),
            "dataset encoded"
        );
        Ok(dataset)
    }
}
