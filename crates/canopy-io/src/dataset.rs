//! Column-major encoded dataset.

use crate::error::EncodingError;
use crate::spec::{DataSpec, OOV_CODE};

/// A single encoded cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// Empty, unparseable or missing cell.
    Missing,
    /// Value of a numerical column.
    Numerical(f64),
    /// Value of a boolean column.
    Boolean(bool),
    /// Dictionary code of a categorical column; never [`OOV_CODE`].
    Categorical(u32),
}

/// Encoded values of one column.
///
/// Missing values use a per-kind sentinel: `NaN` for numerical and boolean
/// columns, [`OOV_CODE`] for categorical columns.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    /// Numerical values, `NaN` when missing.
    Numerical(Vec<f64>),
    /// Boolean values as 0.0/1.0, `NaN` when missing.
    Boolean(Vec<f64>),
    /// Dictionary codes, [`OOV_CODE`] when missing or out of vocabulary.
    Categorical(Vec<u32>),
}

impl ColumnData {
    /// Number of rows in the column.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Numerical(v) | ColumnData::Boolean(v) => v.len(),
            ColumnData::Categorical(v) => v.len(),
        }
    }

    /// Return `true` when the column holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decode the cell at `row` into a [`Value`].
    ///
    /// # Panics
    ///
    /// Panics if `row` is out of bounds.
    #[must_use]
    pub fn value(&self, row: usize) -> Value {
        match self {
            ColumnData::Numerical(v) => {
                let x = v[row];
                if x.is_nan() {
                    Value::Missing
                } else {
                    Value::Numerical(x)
                }
            }
            ColumnData::Boolean(v) => {
                let x = v[row];
                if x.is_nan() {
                    Value::Missing
                } else {
                    Value::Boolean(x > 0.5)
                }
            }
            ColumnData::Categorical(v) => {
                let code = v[row];
                if code == OOV_CODE {
                    Value::Missing
                } else {
                    Value::Categorical(code)
                }
            }
        }
    }

    /// Return `true` when the cell at `row` holds the missing sentinel.
    #[must_use]
    pub fn is_missing(&self, row: usize) -> bool {
        matches!(self.value(row), Value::Missing)
    }

    pub(crate) fn push(&mut self, value: Value) {
        match (self, value) {
            (ColumnData::Numerical(v), Value::Numerical(x)) => v.push(x),
            (ColumnData::Boolean(v), Value::Boolean(b)) => v.push(if b { 1.0 } else { 0.0 }),
            (ColumnData::Categorical(v), Value::Categorical(code)) => v.push(code),
            (ColumnData::Numerical(v) | ColumnData::Boolean(v), _) => v.push(f64::NAN),
            (ColumnData::Categorical(v), _) => v.push(OOV_CODE),
        }
    }
}

/// Random access to the encoded values of one example.
///
/// Implemented for encoded rows (`[Value]`) and for rows of a [`Dataset`],
/// so trees can be evaluated without materializing dataset rows.
pub trait Example {
    /// Number of columns in the example.
    fn width(&self) -> usize;

    /// Encoded value of `column`.
    fn value(&self, column: usize) -> Value;
}

impl Example for [Value] {
    fn width(&self) -> usize {
        self.len()
    }

    fn value(&self, column: usize) -> Value {
        self[column]
    }
}

impl Example for Vec<Value> {
    fn width(&self) -> usize {
        self.len()
    }

    fn value(&self, column: usize) -> Value {
        self[column]
    }
}

/// Borrowed view of one row of a [`Dataset`].
#[derive(Debug, Clone, Copy)]
pub struct DatasetRow<'a> {
    dataset: &'a Dataset,
    row: usize,
}

impl Example for DatasetRow<'_> {
    fn width(&self) -> usize {
        self.dataset.n_columns()
    }

    fn value(&self, column: usize) -> Value {
        self.dataset.columns[column].value(self.row)
    }
}

/// Column-major encoded dataset, produced by [`ColumnEncoder`](crate::ColumnEncoder).
///
/// Every column has exactly [`Dataset::n_rows`] values. The dataset owns the
/// [`DataSpec`] it was encoded with and is read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    spec: DataSpec,
    columns: Vec<ColumnData>,
    n_rows: usize,
}

impl Dataset {
    /// Assemble a dataset from encoded columns.
    ///
    /// # Errors
    ///
    /// Returns [`EncodingError::MalformedColumns`] if the number or lengths of
    /// the columns disagree with `spec`.
    pub fn new(spec: DataSpec, columns: Vec<ColumnData>) -> Result<Self, EncodingError> {
        if spec.n_columns() != columns.len() {
            return Err(EncodingError::MalformedColumns {
                reason: format!(
                    "data spec has {} columns, got {}",
                    spec.n_columns(),
                    columns.len()
                ),
            });
        }
        let n_rows = columns.first().map_or(0, ColumnData::len);
        let ragged = columns.iter().enumerate().find(|(_, c)| c.len() != n_rows);
        if let Some((index, column)) = ragged {
            return Err(EncodingError::MalformedColumns {
                reason: format!(
                    "column {index} has {} rows, column 0 has {n_rows}",
                    column.len()
                ),
            });
        }
        Ok(Self {
            spec,
            columns,
            n_rows,
        })
    }

    /// The schema the dataset was encoded with.
    #[must_use]
    pub fn spec(&self) -> &DataSpec {
        &self.spec
    }

    /// Number of rows.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of columns.
    #[must_use]
    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Encoded values of the column at `index`.
    #[must_use]
    pub fn column(&self, index: usize) -> &ColumnData {
        &self.columns[index]
    }

    /// Borrowed view of `row`.
    #[must_use]
    pub fn row(&self, row: usize) -> DatasetRow<'_> {
        DatasetRow { dataset: self, row }
    }

    /// Materialize `row` as an owned encoded example.
    #[must_use]
    pub fn example(&self, row: usize) -> Vec<Value> {
        self.columns.iter().map(|c| c.value(row)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{ColumnSpec, ColumnStats, Dictionary, NumericalStats};

    fn tiny() -> Dataset {
        let spec = DataSpec::new(
            vec![
                ColumnSpec::new(
                    "a",
                    ColumnStats::Numerical(NumericalStats {
                        mean: 1.5,
                        stddev: 0.5,
                        min: 1.0,
                        max: 2.0,
                    }),
                    1,
                ),
                ColumnSpec::new(
                    "b",
                    ColumnStats::Categorical(Dictionary::from_values(["x"])),
                    1,
                ),
            ],
            3,
        );
        Dataset::new(
            spec,
            vec![
                ColumnData::Numerical(vec![1.0, f64::NAN, 2.0]),
                ColumnData::Categorical(vec![1, 1, OOV_CODE]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn values_decode_sentinels() {
        let ds = tiny();
        assert_eq!(ds.n_rows(), 3);
        assert_eq!(ds.column(0).value(0), Value::Numerical(1.0));
        assert_eq!(ds.column(0).value(1), Value::Missing);
        assert_eq!(ds.column(1).value(2), Value::Missing);
        assert!(ds.column(1).is_missing(2));
    }

    #[test]
    fn row_view_matches_example() {
        let ds = tiny();
        let owned = ds.example(0);
        let view = ds.row(0);
        assert_eq!(view.width(), owned.width());
        for c in 0..ds.n_columns() {
            assert_eq!(view.value(c), owned.value(c));
        }
    }

    #[test]
    fn push_mismatched_value_stores_sentinel() {
        let mut col = ColumnData::Categorical(Vec::new());
        col.push(Value::Numerical(3.0));
        col.push(Value::Categorical(2));
        assert_eq!(col, ColumnData::Categorical(vec![OOV_CODE, 2]));

        let mut col = ColumnData::Boolean(Vec::new());
        col.push(Value::Boolean(true));
        col.push(Value::Missing);
        assert_eq!(col.value(0), Value::Boolean(true));
        assert_eq!(col.value(1), Value::Missing);
    }

    #[test]
    fn ragged_columns_rejected() {
        let ds = tiny();
        let err = Dataset::new(
            ds.spec().clone(),
            vec![
                ColumnData::Numerical(vec![1.0]),
                ColumnData::Categorical(vec![1, 1]),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, EncodingError::MalformedColumns { .. }));
        assert!(err.to_string().contains("column 1 has 2 rows"), "{err}");
    }

    #[test]
    fn column_count_must_match_spec() {
        let ds = tiny();
        let err = Dataset::new(ds.spec().clone(), vec![ColumnData::Numerical(vec![1.0])])
            .unwrap_err();
        assert!(matches!(err, EncodingError::MalformedColumns { .. }));
    }
}
