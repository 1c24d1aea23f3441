//! Ensemble prediction.

use canopy_io::{Dataset, Example};
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::{debug, instrument};

use crate::config::Task;
use crate::error::RfError;
use crate::forest::Model;
use crate::node::LeafValue;

/// Output of the forest for one example.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Prediction {
    /// Majority vote over the trees.
    Class {
        /// Winning label code.
        code: u32,
        /// Number of trees voting for each label code.
        votes: Vec<usize>,
    },
    /// Mean of the trees' leaf means.
    Value(f64),
}

impl Prediction {
    /// Winning label code, for classification.
    #[must_use]
    pub fn class(&self) -> Option<u32> {
        match self {
            Prediction::Class { code, .. } => Some(*code),
            Prediction::Value(_) => None,
        }
    }

    /// Predicted value, for regression.
    #[must_use]
    pub fn value(&self) -> Option<f64> {
        match self {
            Prediction::Value(v) => Some(*v),
            Prediction::Class { .. } => None,
        }
    }
}

/// Index of the largest vote; lowest code on ties.
pub(crate) fn majority(votes: &[usize]) -> u32 {
    let mut best = 0usize;
    for (code, &v) in votes.iter().enumerate() {
        if v > votes[best] {
            best = code;
        }
    }
    best as u32
}

impl Model {
    fn check_width<E: Example + ?Sized>(&self, example: &E) -> Result<(), RfError> {
        let expected = self.data_spec.n_columns();
        if example.width() != expected {
            return Err(RfError::ExampleWidthMismatch {
                expected,
                got: example.width(),
            });
        }
        Ok(())
    }

    fn predict_unchecked<E: Example + ?Sized>(&self, example: &E) -> Prediction {
        match self.task {
            Task::Classification => {
                let mut votes = vec![0usize; self.n_classes()];
                for tree in &self.trees {
                    if let Some(class) = tree.leaf(example).top_class() {
                        if let Some(v) = votes.get_mut(class as usize) {
                            *v += 1;
                        }
                    }
                }
                Prediction::Class {
                    code: majority(&votes),
                    votes,
                }
            }
            Task::Regression => {
                let sum: f64 = self
                    .trees
                    .iter()
                    .map(|tree| match tree.leaf(example) {
                        LeafValue::Regression { mean } => *mean,
                        LeafValue::Classification { .. } => 0.0,
                    })
                    .sum();
                Prediction::Value(sum / self.trees.len() as f64)
            }
        }
    }

    /// Predict one encoded example.
    ///
    /// The example holds one value per data spec column, the label column
    /// included (its value is ignored). Classification takes the majority
    /// vote of each tree's top class, ties going to the lowest code.
    /// Regression averages the leaf means.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::ExampleWidthMismatch`] when the example width
    /// differs from the data spec width.
    pub fn predict<E: Example + ?Sized>(&self, example: &E) -> Result<Prediction, RfError> {
        self.check_width(example)?;
        Ok(self.predict_unchecked(example))
    }

    /// Mean of the trees' normalized leaf distributions, indexed by label code.
    ///
    /// Empty for regression models.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::ExampleWidthMismatch`] when the example width
    /// differs from the data spec width.
    pub fn predict_proba<E: Example + ?Sized>(&self, example: &E) -> Result<Vec<f64>, RfError> {
        self.check_width(example)?;
        if self.task == Task::Regression {
            return Ok(Vec::new());
        }
        let mut proba = vec![0.0f64; self.n_classes()];
        for tree in &self.trees {
            for (p, d) in proba.iter_mut().zip(tree.leaf(example).distribution()) {
                *p += d;
            }
        }
        let n = self.trees.len() as f64;
        proba.iter_mut().for_each(|p| *p /= n);
        Ok(proba)
    }

    /// Predict every row of `dataset` in parallel, in row order.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::ExampleWidthMismatch`] when the dataset width
    /// differs from the data spec width.
    #[instrument(skip_all, fields(n_rows = dataset.n_rows()))]
    pub fn predict_dataset(&self, dataset: &Dataset) -> Result<Vec<Prediction>, RfError> {
        let expected = self.data_spec.n_columns();
        if dataset.n_columns() != expected {
            return Err(RfError::ExampleWidthMismatch {
                expected,
                got: dataset.n_columns(),
            });
        }
        let predictions: Vec<Prediction> = (0..dataset.n_rows())
            .into_par_iter()
            .map(|row| self.predict_unchecked(&dataset.row(row)))
            .collect();
        debug!(n_predictions = predictions.len(), "dataset predicted");
        Ok(predictions)
    }

    /// Label value of class `code`.
    #[must_use]
    pub fn class_name(&self, code: u32) -> Option<&str> {
        self.data_spec
            .column(self.label_column)
            .and_then(|c| c.dictionary())
            .and_then(|d| d.value(code))
    }
}

#[cfg(test)]
mod tests {
    use canopy_io::Value;

    use super::*;
    use crate::config::TrainingConfig;
    use crate::test_util::{separable_classification, step_regression};

    fn classifier() -> Model {
        let ds = separable_classification(20);
        TrainingConfig::new(Task::Classification)
            .with_num_trees(15)
            .with_label_column(2)
            .with_num_threads(2)
            .fit(&ds)
            .unwrap()
            .into_model()
    }

    #[test]
    fn majority_prefers_lowest_code_on_ties() {
        assert_eq!(majority(&[0, 2, 2, 1]), 1);
        assert_eq!(majority(&[0, 0, 3]), 2);
        assert_eq!(majority(&[]), 0);
    }

    #[test]
    fn classifies_both_sides() {
        let model = classifier();
        let lo = model
            .predict(&vec![Value::Numerical(0.5), Value::Numerical(1.0), Value::Missing])
            .unwrap();
        let hi = model
            .predict(&vec![Value::Numerical(11.0), Value::Numerical(1.0), Value::Missing])
            .unwrap();
        assert_eq!(model.class_name(lo.class().unwrap()), Some("lo"));
        assert_eq!(model.class_name(hi.class().unwrap()), Some("hi"));
        let Prediction::Class { votes, .. } = hi else {
            panic!("class prediction expected");
        };
        assert_eq!(votes.iter().sum::<usize>(), 15);
    }

    #[test]
    fn proba_sums_to_one() {
        let model = classifier();
        let proba = model
            .predict_proba(&vec![Value::Numerical(5.0), Value::Missing, Value::Missing])
            .unwrap();
        assert_eq!(proba.len(), 3);
        assert!((proba.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(proba[0].abs() < f64::EPSILON);
    }

    #[test]
    fn width_mismatch() {
        let model = classifier();
        let err = model.predict(&vec![Value::Numerical(1.0)]).unwrap_err();
        assert!(matches!(
            err,
            RfError::ExampleWidthMismatch {
                expected: 3,
                got: 1
            }
        ));
    }

    #[test]
    fn regression_averages_leaf_means() {
        let ds = step_regression(40);
        let model = TrainingConfig::new(Task::Regression)
            .with_num_trees(5)
            .with_label_column(1)
            .with_bootstrap(false)
            .with_num_threads(1)
            .fit(&ds)
            .unwrap()
            .into_model();
        let p = model
            .predict(&vec![Value::Numerical(1.0), Value::Missing])
            .unwrap();
        assert!((p.value().unwrap() - 1.0).abs() < 1e-12);
        assert!(model
            .predict_proba(&vec![Value::Numerical(1.0), Value::Missing])
            .unwrap()
            .is_empty());
    }

    #[test]
    fn dataset_predictions_match_single_predictions() {
        let ds = separable_classification(10);
        let model = classifier();
        let batch = model.predict_dataset(&ds).unwrap();
        assert_eq!(batch.len(), ds.n_rows());
        for (row, p) in batch.iter().enumerate() {
            assert_eq!(p, &model.predict(&ds.example(row)).unwrap());
        }
    }
}
