//! Typed column schema ([`DataSpec`]) inferred from CSV.

use std::collections::HashMap;
use std::fmt;

/// Code reserved in every [`Dictionary`] for missing and out-of-vocabulary values.
pub const OOV_CODE: u32 = 0;

/// Display value stored at [`OOV_CODE`].
pub const OOV_ITEM: &str = "<OOV>";

/// Semantic type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ColumnKind {
    /// Real-valued column; split with thresholds.
    Numerical,
    /// Finite set of string values, encoded through a [`Dictionary`].
    Categorical,
    /// `true`/`false` column; encoded as 1.0/0.0.
    Boolean,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnKind::Numerical => "NUMERICAL",
            ColumnKind::Categorical => "CATEGORICAL",
            ColumnKind::Boolean => "BOOLEAN",
        };
        f.write_str(name)
    }
}

/// One entry of a categorical [`Dictionary`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DictionaryItem {
    /// Raw string value as found in the CSV.
    pub value: String,
    /// Number of scanned cells holding this value.
    pub count: u64,
}

/// Insertion-ordered mapping from categorical values to integer codes.
///
/// Code `i` is the item at position `i`. Position 0 always holds the
/// [`OOV_ITEM`] placeholder, so real values are numbered `1..len()`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Dictionary {
    items: Vec<DictionaryItem>,
}

impl Dictionary {
    /// Create a dictionary holding only the reserved OOV entry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: vec![DictionaryItem {
                value: OOV_ITEM.to_string(),
                count: 0,
            }],
        }
    }

    /// Build a dictionary from values in code order (codes `1..=values.len()`).
    #[must_use]
    pub fn from_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut dict = Self::new();
        for value in values {
            dict.items.push(DictionaryItem {
                value: value.into(),
                count: 0,
            });
        }
        dict
    }

    /// Number of codes, including the reserved OOV code.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Return `true` when no real value has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.len() <= 1
    }

    /// Return the value stored at `code`.
    #[must_use]
    pub fn value(&self, code: u32) -> Option<&str> {
        self.items.get(code as usize).map(|item| item.value.as_str())
    }

    /// Return the code of `value`, or [`OOV_CODE`] when it is not in the dictionary.
    #[must_use]
    pub fn code(&self, value: &str) -> u32 {
        self.items
            .iter()
            .skip(1)
            .position(|item| item.value == value)
            .map_or(OOV_CODE, |pos| pos as u32 + 1)
    }

    /// Return the occurrence count recorded for `code`.
    #[must_use]
    pub fn count(&self, code: u32) -> Option<u64> {
        self.items.get(code as usize).map(|item| item.count)
    }

    /// Return the most frequent real value (earliest code on ties).
    #[must_use]
    pub fn most_frequent(&self) -> Option<&str> {
        self.items
            .iter()
            .skip(1)
            .fold(None::<&DictionaryItem>, |best, item| match best {
                Some(b) if b.count >= item.count => Some(b),
                _ => Some(item),
            })
            .map(|item| item.value.as_str())
    }

    /// Iterate `(code, value)` pairs of real values in code order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.items
            .iter()
            .enumerate()
            .skip(1)
            .map(|(code, item)| (code as u32, item.value.as_str()))
    }

    /// Build a hash lookup from value to code.
    #[must_use]
    pub fn lookup(&self) -> HashMap<&str, u32> {
        self.iter().map(|(code, value)| (value, code)).collect()
    }

    pub(crate) fn push(&mut self, value: String) -> u32 {
        let code = self.items.len() as u32;
        self.items.push(DictionaryItem { value, count: 0 });
        code
    }

    pub(crate) fn record(&mut self, code: u32) {
        if let Some(item) = self.items.get_mut(code as usize) {
            item.count += 1;
        }
    }
}

impl Default for Dictionary {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary statistics of a numerical column.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NumericalStats {
    /// Mean of the non-missing values.
    pub mean: f64,
    /// Population standard deviation of the non-missing values.
    pub stddev: f64,
    /// Smallest non-missing value (0.0 when the column is empty).
    pub min: f64,
    /// Largest non-missing value (0.0 when the column is empty).
    pub max: f64,
}

/// Summary statistics of a boolean column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BooleanStats {
    /// Number of `true` cells.
    pub count_true: u64,
    /// Number of `false` cells.
    pub count_false: u64,
}

/// Kind-specific payload of a [`ColumnSpec`].
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ColumnStats {
    /// Numerical column with running statistics.
    Numerical(NumericalStats),
    /// Categorical column with its dictionary.
    Categorical(Dictionary),
    /// Boolean column with value counts.
    Boolean(BooleanStats),
}

/// Descriptor of one CSV column.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ColumnSpec {
    name: String,
    stats: ColumnStats,
    num_missing: u64,
}

impl ColumnSpec {
    /// Create a column descriptor.
    #[must_use]
    pub fn new(name: impl Into<String>, stats: ColumnStats, num_missing: u64) -> Self {
        Self {
            name: name.into(),
            stats,
            num_missing,
        }
    }

    /// Column name from the CSV header.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Semantic type of the column.
    #[must_use]
    pub fn kind(&self) -> ColumnKind {
        match self.stats {
            ColumnStats::Numerical(_) => ColumnKind::Numerical,
            ColumnStats::Categorical(_) => ColumnKind::Categorical,
            ColumnStats::Boolean(_) => ColumnKind::Boolean,
        }
    }

    /// Kind-specific statistics.
    #[must_use]
    pub fn stats(&self) -> &ColumnStats {
        &self.stats
    }

    /// Dictionary of a categorical column.
    #[must_use]
    pub fn dictionary(&self) -> Option<&Dictionary> {
        match &self.stats {
            ColumnStats::Categorical(dict) => Some(dict),
            _ => None,
        }
    }

    /// Statistics of a numerical column.
    #[must_use]
    pub fn numerical(&self) -> Option<&NumericalStats> {
        match &self.stats {
            ColumnStats::Numerical(stats) => Some(stats),
            _ => None,
        }
    }

    /// Number of scanned cells that were missing.
    #[must_use]
    pub fn num_missing(&self) -> u64 {
        self.num_missing
    }
}

/// Ordered column schema of a dataset.
///
/// Column order matches the CSV header and is never changed after inference.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DataSpec {
    columns: Vec<ColumnSpec>,
    num_rows: u64,
}

impl DataSpec {
    /// Create a data spec from column descriptors and the number of scanned rows.
    #[must_use]
    pub fn new(columns: Vec<ColumnSpec>, num_rows: u64) -> Self {
        Self { columns, num_rows }
    }

    /// All column descriptors in header order.
    #[must_use]
    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// Column descriptor at `index`.
    #[must_use]
    pub fn column(&self, index: usize) -> Option<&ColumnSpec> {
        self.columns.get(index)
    }

    /// Number of columns.
    #[must_use]
    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Position of the column called `name`.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Number of data rows scanned during inference.
    #[must_use]
    pub fn num_rows(&self) -> u64 {
        self.num_rows
    }

    /// Multi-line human readable summary, one line per column.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut out = format!(
            "{} columns, {} rows scanned\n",
            self.columns.len(),
            self.num_rows
        );
        for (i, col) in self.columns.iter().enumerate() {
            let detail = match &col.stats {
                ColumnStats::Numerical(s) => format!(
                    "mean={:.4} sd={:.4} min={} max={}",
                    s.mean, s.stddev, s.min, s.max
                ),
                ColumnStats::Categorical(d) => format!(
                    "{} unique values, most frequent={}",
                    d.len() - 1,
                    d.most_frequent().unwrap_or("-")
                ),
                ColumnStats::Boolean(b) => {
                    format!("true={} false={}", b.count_true, b.count_false)
                }
            };
            out.push_str(&format!(
                "  {i}: \"{}\" {} {detail} missing={}\n",
                col.name,
                col.kind(),
                col.num_missing
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dictionary_reserves_code_zero() {
        let dict = Dictionary::from_values(["x", "y"]);
        assert_eq!(dict.len(), 3);
        assert_eq!(dict.value(OOV_CODE), Some(OOV_ITEM));
        assert_eq!(dict.code("x"), 1);
        assert_eq!(dict.code("y"), 2);
        assert_eq!(dict.code("z"), OOV_CODE);
    }

    #[test]
    fn dictionary_codes_are_unique() {
        let dict = Dictionary::from_values(["a", "b", "c"]);
        let lookup = dict.lookup();
        assert_eq!(lookup.len(), 3);
        let mut codes: Vec<u32> = lookup.values().copied().collect();
        codes.sort_unstable();
        assert_eq!(codes, vec![1, 2, 3]);
    }

    #[test]
    fn most_frequent_prefers_earliest_on_tie() {
        let mut dict = Dictionary::new();
        let a = dict.push("a".into());
        let b = dict.push("b".into());
        dict.record(a);
        dict.record(b);
        assert_eq!(dict.most_frequent(), Some("a"));
        dict.record(b);
        assert_eq!(dict.most_frequent(), Some("b"));
    }

    #[test]
    fn empty_dictionary_has_no_most_frequent() {
        assert!(Dictionary::new().is_empty());
        assert_eq!(Dictionary::new().most_frequent(), None);
    }

    #[test]
    fn column_kind_follows_stats() {
        let col = ColumnSpec::new("b", ColumnStats::Categorical(Dictionary::new()), 0);
        assert_eq!(col.kind(), ColumnKind::Categorical);
        assert!(col.dictionary().is_some());
        assert!(col.numerical().is_none());
    }

    #[test]
    fn column_index_lookup() {
        let spec = DataSpec::new(
            vec![
                ColumnSpec::new(
                    "a",
                    ColumnStats::Numerical(NumericalStats {
                        mean: 0.0,
                        stddev: 0.0,
                        min: 0.0,
                        max: 0.0,
                    }),
                    0,
                ),
                ColumnSpec::new(
                    "flag",
                    ColumnStats::Boolean(BooleanStats {
                        count_true: 1,
                        count_false: 2,
                    }),
                    0,
                ),
            ],
            3,
        );
        assert_eq!(spec.column_index("flag"), Some(1));
        assert_eq!(spec.column_index("nope"), None);
        assert!(spec.describe().contains("BOOLEAN"));
    }
}
