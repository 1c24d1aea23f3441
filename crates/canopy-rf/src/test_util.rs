//! In-memory dataset fixtures for unit tests.

use canopy_io::{
    BooleanStats, ColumnData, ColumnSpec, ColumnStats, DataSpec, Dataset, Dictionary,
    NumericalStats,
};

/// A column fixture: name plus encoded values.
pub(crate) enum Col {
    Num(&'static str, Vec<f64>),
    Bool(&'static str, Vec<f64>),
    /// Dictionary values in code order, then codes (0 = missing).
    Cat(&'static str, Vec<&'static str>, Vec<u32>),
}

/// Build a dataset from column fixtures, with placeholder statistics.
pub(crate) fn dataset(cols: Vec<Col>) -> Dataset {
    let mut specs = Vec::new();
    let mut data = Vec::new();
    for col in cols {
        match col {
            Col::Num(name, values) => {
                specs.push(ColumnSpec::new(
                    name,
                    ColumnStats::Numerical(NumericalStats {
                        mean: 0.0,
                        stddev: 0.0,
                        min: 0.0,
                        max: 0.0,
                    }),
                    0,
                ));
                data.push(ColumnData::Numerical(values));
            }
            Col::Bool(name, values) => {
                specs.push(ColumnSpec::new(
                    name,
                    ColumnStats::Boolean(BooleanStats {
                        count_true: 0,
                        count_false: 0,
                    }),
                    0,
                ));
                data.push(ColumnData::Boolean(values));
            }
            Col::Cat(name, dict, codes) => {
                specs.push(ColumnSpec::new(
                    name,
                    ColumnStats::Categorical(Dictionary::from_values(dict)),
                    0,
                ));
                data.push(ColumnData::Categorical(codes));
            }
        }
    }
    let n_rows = data.first().map_or(0, ColumnData::len) as u64;
    Dataset::new(DataSpec::new(specs, n_rows), data).unwrap()
}

/// Two well-separated classes on `x`, noise on `z`, label last.
pub(crate) fn separable_classification(n_per_class: usize) -> Dataset {
    let mut x = Vec::new();
    let mut z = Vec::new();
    let mut label = Vec::new();
    for i in 0..n_per_class {
        x.push(i as f64 * 0.1);
        z.push((i % 7) as f64);
        label.push(1);
    }
    for i in 0..n_per_class {
        x.push(10.0 + i as f64 * 0.1);
        z.push((i % 5) as f64);
        label.push(2);
    }
    dataset(vec![
        Col::Num("x", x),
        Col::Num("z", z),
        Col::Cat("label", vec!["lo", "hi"], label),
    ])
}

/// Step function `y = 1` for `x < 5`, `y = 3` otherwise, label last.
pub(crate) fn step_regression(n: usize) -> Dataset {
    let x: Vec<f64> = (0..n).map(|i| i as f64 * 10.0 / n as f64).collect();
    let y: Vec<f64> = x.iter().map(|&v| if v < 5.0 { 1.0 } else { 3.0 }).collect();
    dataset(vec![Col::Num("x", x), Col::Num("y", y)])
}
