//! Data spec inference: scan CSV rows and derive a typed column schema.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info, instrument};

use crate::error::SchemaError;
use crate::source::{CsvSource, is_missing_token};
use crate::spec::{
    BooleanStats, ColumnKind, ColumnSpec, ColumnStats, DataSpec, Dictionary, NumericalStats,
    OOV_CODE,
};

/// Options controlling [`SchemaInference`].
///
/// # Defaults
///
/// | Parameter          | Default     |
/// |--------------------|-------------|
/// | `max_num_values`   | unlimited   |
/// | `max_scanned_rows` | unlimited   |
/// | forced kinds       | none        |
#[derive(Debug, Clone, Default)]
pub struct InferenceOptions {
    max_num_values: Option<usize>,
    max_scanned_rows: Option<usize>,
    forced_kinds: Vec<(String, ColumnKind)>,
}

impl InferenceOptions {
    /// Create options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the number of values (excluding the OOV entry) in each categorical
    /// dictionary. Values first seen after the cap is reached map to the OOV code.
    #[must_use]
    pub fn with_max_num_values(mut self, max_num_values: Option<usize>) -> Self {
        self.max_num_values = max_num_values;
        self
    }

    /// Cap the number of data rows used for type guessing and statistics.
    ///
    /// Rows past the cap are still checked for a consistent width.
    #[must_use]
    pub fn with_max_scanned_rows(mut self, max_scanned_rows: Option<usize>) -> Self {
        self.max_scanned_rows = max_scanned_rows;
        self
    }

    /// Force the kind of the column called `name`, bypassing type guessing.
    #[must_use]
    pub fn with_column_kind(mut self, name: impl Into<String>, kind: ColumnKind) -> Self {
        let name = name.into();
        self.forced_kinds.retain(|(n, _)| *n != name);
        self.forced_kinds.push((name, kind));
        self
    }

    /// Return the dictionary cap, if any.
    #[must_use]
    pub fn max_num_values(&self) -> Option<usize> {
        self.max_num_values
    }

    /// Return the row sampling cap, if any.
    #[must_use]
    pub fn max_scanned_rows(&self) -> Option<usize> {
        self.max_scanned_rows
    }

    /// Return the forced kind of `name`, if any.
    #[must_use]
    pub fn forced_kind(&self, name: &str) -> Option<ColumnKind> {
        self.forced_kinds
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, kind)| *kind)
    }
}

/// Parse a finite number.
pub(crate) fn parse_number(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a boolean literal (`true`/`false`, case-insensitive).
pub(crate) fn parse_bool_literal(raw: &str) -> Option<bool> {
    if raw.eq_ignore_ascii_case("true") {
        Some(true)
    } else if raw.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Whether a column's categorical dictionary is being collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DictionaryState {
    /// The column may still be numerical or boolean.
    Deferred,
    /// Every non-missing cell so far has been recorded.
    Building,
    /// The column turned categorical after earlier cells were skipped; the
    /// scanned rows must be read again.
    NeedsReplay,
    /// The kind is forced to something other than categorical.
    Unused,
}

/// Running per-column state while scanning rows.
struct ColumnAccumulator {
    forced: Option<ColumnKind>,
    n_missing: u64,
    n_present: u64,
    // Welford running moments over values that parse as numbers.
    n_numeric: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
    all_numeric: bool,
    all_boolean: bool,
    count_true: u64,
    count_false: u64,
    dictionary_state: DictionaryState,
    dictionary: Dictionary,
    lookup: HashMap<String, u32>,
}

impl ColumnAccumulator {
    fn new(forced: Option<ColumnKind>) -> Self {
        let dictionary_state = match forced {
            None => DictionaryState::Deferred,
            Some(ColumnKind::Categorical) => DictionaryState::Building,
            Some(_) => DictionaryState::Unused,
        };
        Self {
            forced,
            n_missing: 0,
            n_present: 0,
            n_numeric: 0,
            mean: 0.0,
            m2: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            all_numeric: true,
            all_boolean: true,
            count_true: 0,
            count_false: 0,
            dictionary_state,
            dictionary: Dictionary::new(),
            lookup: HashMap::new(),
        }
    }

    fn observe(&mut self, raw: &str, max_num_values: Option<usize>) {
        if is_missing_token(raw) {
            self.n_missing += 1;
            return;
        }
        self.n_present += 1;

        match parse_number(raw) {
            Some(x) => {
                self.n_numeric += 1;
                let delta = x - self.mean;
                self.mean += delta / self.n_numeric as f64;
                self.m2 += delta * (x - self.mean);
                self.min = self.min.min(x);
                self.max = self.max.max(x);
            }
            None => self.all_numeric = false,
        }

        match parse_bool_literal(raw) {
            Some(true) => self.count_true += 1,
            Some(false) => self.count_false += 1,
            // 0/1 only count as booleans when the kind is forced; when guessing
            // they make the column numerical.
            None if self.forced == Some(ColumnKind::Boolean) && raw == "1" => {
                self.count_true += 1;
            }
            None if self.forced == Some(ColumnKind::Boolean) && raw == "0" => {
                self.count_false += 1;
            }
            None => self.all_boolean = false,
        }

        if self.dictionary_state == DictionaryState::Deferred
            && !self.all_numeric
            && !self.all_boolean
        {
            self.dictionary_state = if self.n_present == 1 {
                DictionaryState::Building
            } else {
                DictionaryState::NeedsReplay
            };
        }
        if self.dictionary_state == DictionaryState::Building {
            self.observe_category(raw, max_num_values);
        }
    }

    /// Record a non-missing cell of a categorical column.
    fn observe_category(&mut self, raw: &str, max_num_values: Option<usize>) {
        if let Some(&code) = self.lookup.get(raw) {
            self.dictionary.record(code);
            return;
        }
        let full = max_num_values.is_some_and(|cap| self.lookup.len() >= cap);
        if full {
            self.dictionary.record(OOV_CODE);
        } else {
            let code = self.dictionary.push(raw.to_string());
            self.dictionary.record(code);
            self.lookup.insert(raw.to_string(), code);
        }
    }

    fn kind(&self) -> ColumnKind {
        if let Some(kind) = self.forced {
            return kind;
        }
        if self.all_numeric {
            ColumnKind::Numerical
        } else if self.all_boolean {
            ColumnKind::Boolean
        } else {
            ColumnKind::Categorical
        }
    }

    fn finish(self, name: &str, n_rows: u64) -> ColumnSpec {
        let kind = self.kind();
        match kind {
            ColumnKind::Numerical => {
                let stats = if self.n_numeric == 0 {
                    NumericalStats {
                        mean: 0.0,
                        stddev: 0.0,
                        min: 0.0,
                        max: 0.0,
                    }
                } else {
                    NumericalStats {
                        mean: self.mean,
                        stddev: (self.m2 / self.n_numeric as f64).sqrt(),
                        min: self.min,
                        max: self.max,
                    }
                };
                // Unparseable cells in a forced numerical column count as missing.
                ColumnSpec::new(
                    name,
                    ColumnStats::Numerical(stats),
                    n_rows - self.n_numeric,
                )
            }
            ColumnKind::Boolean => {
                let stats = BooleanStats {
                    count_true: self.count_true,
                    count_false: self.count_false,
                };
                ColumnSpec::new(
                    name,
                    ColumnStats::Boolean(stats),
                    n_rows - self.count_true - self.count_false,
                )
            }
            ColumnKind::Categorical => ColumnSpec::new(
                name,
                ColumnStats::Categorical(self.dictionary),
                self.n_missing,
            ),
        }
    }
}

/// Derives a [`DataSpec`] from a CSV file.
///
/// Type guessing per column, over the non-missing cells of the scanned rows:
/// - every cell parses as a finite number: `NUMERICAL` (so `0`/`1` columns are numerical),
/// - else every cell is `true`/`false`: `BOOLEAN`,
/// - else `CATEGORICAL`, with an insertion-ordered dictionary.
///
/// A column without any non-missing cell is `NUMERICAL`.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`SchemaError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`SchemaError::EmptyFile`] | File is empty |
/// | [`SchemaError::CsvParse`] | Malformed CSV record |
/// | [`SchemaError::NoColumns`] | Header has zero columns |
/// | [`SchemaError::DuplicateColumn`] | Two columns share a name |
/// | [`SchemaError::InconsistentRowLength`] | Row width differs from header width |
/// | [`SchemaError::NoDataRows`] | Zero data rows after the header |
#[derive(Debug, Clone, Default)]
pub struct SchemaInference {
    options: InferenceOptions,
}

impl SchemaInference {
    /// Create an inferencer with the given options.
    #[must_use]
    pub fn new(options: InferenceOptions) -> Self {
        Self { options }
    }

    /// Scan the CSV file at `path` and return its data spec.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn infer(&self, path: &Path) -> Result<DataSpec, SchemaError> {
        let mut source = CsvSource::open(path).map_err(|e| e.into_schema(path))?;
        let header = source.header().to_vec();
        if header.is_empty() {
            return Err(SchemaError::NoColumns {
                path: path.to_path_buf(),
            });
        }

        let mut seen: HashMap<&str, usize> = HashMap::new();
        for (i, name) in header.iter().enumerate() {
            if let Some(&first) = seen.get(name.as_str()) {
                return Err(SchemaError::DuplicateColumn {
                    path: path.to_path_buf(),
                    name: name.clone(),
                    first,
                    second: i,
                });
            }
            seen.insert(name, i);
        }

        let mut accumulators: Vec<ColumnAccumulator> = header
            .iter()
            .map(|name| ColumnAccumulator::new(self.options.forced_kind(name)))
            .collect();
        let max_num_values = self.options.max_num_values;
        let max_rows = self.options.max_scanned_rows.unwrap_or(usize::MAX);
        let expected = header.len();
        let mut n_scanned = 0u64;
        let mut n_rows = 0usize;

        let owned_path = source.path().to_path_buf();
        for (row_index, record) in source.records() {
            let record = record.map_err(|e| e.into_schema(&owned_path))?;
            if record.len() != expected {
                return Err(SchemaError::InconsistentRowLength {
                    path: owned_path,
                    row_index,
                    expected,
                    got: record.len(),
                });
            }
            n_rows += 1;
            if row_index >= max_rows {
                continue;
            }
            n_scanned += 1;
            for (acc, raw) in accumulators.iter_mut().zip(record.iter()) {
                acc.observe(raw, max_num_values);
            }
        }

        if n_rows == 0 {
            return Err(SchemaError::NoDataRows {
                path: path.to_path_buf(),
            });
        }
        self.replay_categories(path, &mut accumulators, max_rows)?;

        let columns: Vec<ColumnSpec> = accumulators
            .into_iter()
            .zip(&header)
            .map(|(acc, name)| {
                let col = acc.finish(name, n_scanned);
                debug!(
                    column = %name,
                    kind = %col.kind(),
                    num_missing = col.num_missing(),
                    "column inferred"
                );
                col
            })
            .collect();

        info!(
            n_columns = columns.len(),
            n_rows,
            n_scanned,
            "data spec inferred"
        );

        Ok(DataSpec::new(columns, n_scanned))
    }

    /// Build the dictionaries of columns that turned categorical mid-scan by
    /// reading the scanned rows a second time. Row widths were already checked.
    fn replay_categories(
        &self,
        path: &Path,
        accumulators: &mut [ColumnAccumulator],
        max_rows: usize,
    ) -> Result<(), SchemaError> {
        let replayed: Vec<usize> = accumulators
            .iter()
            .enumerate()
            .filter(|(_, acc)| acc.dictionary_state == DictionaryState::NeedsReplay)
            .map(|(i, _)| i)
            .collect();
        if replayed.is_empty() {
            return Ok(());
        }
        debug!(n_columns = replayed.len(), "re-reading rows for late categorical columns");

        let mut source = CsvSource::open(path).map_err(|e| e.into_schema(path))?;
        for (row_index, record) in source.records() {
            if row_index >= max_rows {
                break;
            }
            let record = record.map_err(|e| e.into_schema(path))?;
            for &column in &replayed {
                let raw = &record[column];
                if !is_missing_token(raw) {
                    accumulators[column].observe_category(raw, self.options.max_num_values);
                }
            }
        }
        for &column in &replayed {
            accumulators[column].dictionary_state = DictionaryState::Building;
        }
        Ok(())
    }
}
