//! Out-of-bag (OOB) evaluation.

use canopy_io::Dataset;
use tracing::debug;

use crate::confusion::{ClassMetrics, ConfusionMatrix};
use crate::error::RfError;
use crate::node::LeafValue;
use crate::predict::majority;
use crate::split::Target;
use crate::tree::DecisionTree;

/// Out-of-bag evaluation result.
#[derive(Debug, Clone)]
pub enum OobEvaluation {
    /// Classification forest.
    Classification {
        /// Fraction of correctly predicted OOB rows.
        accuracy: f64,
        /// OOB confusion matrix over label codes.
        confusion: ConfusionMatrix,
        /// Number of rows that had at least one OOB tree.
        n_oob_rows: usize,
    },
    /// Regression forest.
    Regression {
        /// Root mean squared error over the OOB rows.
        rmse: f64,
        /// Number of rows that had at least one OOB tree.
        n_oob_rows: usize,
    },
}

impl OobEvaluation {
    /// OOB accuracy, for classification.
    #[must_use]
    pub fn accuracy(&self) -> Option<f64> {
        match self {
            OobEvaluation::Classification { accuracy, .. } => Some(*accuracy),
            OobEvaluation::Regression { .. } => None,
        }
    }

    /// OOB RMSE, for regression.
    #[must_use]
    pub fn rmse(&self) -> Option<f64> {
        match self {
            OobEvaluation::Regression { rmse, .. } => Some(*rmse),
            OobEvaluation::Classification { .. } => None,
        }
    }

    /// Per-class OOB precision, recall and F1, for classification.
    #[must_use]
    pub fn class_metrics(&self) -> Option<Vec<ClassMetrics>> {
        match self {
            OobEvaluation::Classification { confusion, .. } => Some(confusion.class_metrics()),
            OobEvaluation::Regression { .. } => None,
        }
    }

    /// Number of rows evaluated.
    #[must_use]
    pub fn n_oob_rows(&self) -> usize {
        match self {
            OobEvaluation::Classification { n_oob_rows, .. }
            | OobEvaluation::Regression { n_oob_rows, .. } => *n_oob_rows,
        }
    }
}

/// Compute out-of-bag predictions and their quality.
///
/// For each row, only trees whose bootstrap sample did NOT contain it vote.
/// Rows with no OOB tree are skipped.
pub(crate) fn compute_oob(
    trees: &[DecisionTree],
    dataset: &Dataset,
    target: Target<'_>,
    oob_indices_per_tree: &[Vec<usize>],
) -> Result<OobEvaluation, RfError> {
    let n_rows = dataset.n_rows();
    let no_oob = || RfError::OobEvaluationFailed {
        reason: "no row has any OOB tree".to_string(),
    };

    match target {
        Target::Classification { codes, n_classes } => {
            let mut votes: Vec<Vec<usize>> = vec![Vec::new(); n_rows];
            for (tree, oob) in trees.iter().zip(oob_indices_per_tree) {
                for &row in oob {
                    let Some(class) = tree.leaf(&dataset.row(row)).top_class() else {
                        continue;
                    };
                    let row_votes = &mut votes[row];
                    if row_votes.is_empty() {
                        row_votes.resize(n_classes, 0);
                    }
                    if let Some(v) = row_votes.get_mut(class as usize) {
                        *v += 1;
                    }
                }
            }
            let pairs: Vec<(u32, u32)> = votes
                .iter()
                .enumerate()
                .filter(|(_, v)| !v.is_empty())
                .map(|(row, v)| (codes[row], majority(v)))
                .collect();
            if pairs.is_empty() {
                return Err(no_oob());
            }
            let n_oob_rows = pairs.len();
            let confusion = ConfusionMatrix::from_pairs(pairs, n_classes);
            let accuracy = confusion.accuracy();
            debug!(n_oob_rows, accuracy, "OOB evaluation complete");
            Ok(OobEvaluation::Classification {
                accuracy,
                confusion,
                n_oob_rows,
            })
        }
        Target::Regression { values } => {
            let mut sums = vec![0.0f64; n_rows];
            let mut counts = vec![0usize; n_rows];
            for (tree, oob) in trees.iter().zip(oob_indices_per_tree) {
                for &row in oob {
                    if let LeafValue::Regression { mean } = tree.leaf(&dataset.row(row)) {
                        sums[row] += mean;
                        counts[row] += 1;
                    }
                }
            }
            let mut sq_err = 0.0f64;
            let mut n_oob_rows = 0usize;
            for row in 0..n_rows {
                if counts[row] == 0 {
                    continue;
                }
                let err = sums[row] / counts[row] as f64 - values[row];
                sq_err += err * err;
                n_oob_rows += 1;
            }
            if n_oob_rows == 0 {
                return Err(no_oob());
            }
            let rmse = (sq_err / n_oob_rows as f64).sqrt();
            debug!(n_oob_rows, rmse, "OOB evaluation complete");
            Ok(OobEvaluation::Regression { rmse, n_oob_rows })
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{OobMode, Task, TrainingConfig};
    use crate::error::RfError;
    use crate::test_util::{separable_classification, step_regression};

    #[test]
    fn regression_oob_rmse_is_small_on_step() {
        let ds = step_regression(60);
        let result = TrainingConfig::new(Task::Regression)
            .with_num_trees(40)
            .with_label_column(1)
            .with_num_threads(2)
            .with_oob_mode(OobMode::Enabled)
            .fit(&ds)
            .unwrap();
        let oob = result.oob().unwrap();
        assert!(oob.rmse().unwrap() < 0.5, "rmse {:?}", oob.rmse());
        assert!(oob.accuracy().is_none());
        assert!(oob.class_metrics().is_none());
        assert!(oob.n_oob_rows() > 0);
    }

    #[test]
    fn classification_oob_has_confusion_matrix() {
        let ds = separable_classification(30);
        let result = TrainingConfig::new(Task::Classification)
            .with_num_trees(20)
            .with_label_column(2)
            .with_num_threads(2)
            .with_oob_mode(OobMode::Enabled)
            .fit(&ds)
            .unwrap();
        let oob = result.oob().unwrap();
        let super::OobEvaluation::Classification { confusion, .. } = oob else {
            panic!("classification evaluation expected");
        };
        assert_eq!(confusion.total(), oob.n_oob_rows());
        assert_eq!(confusion.n_classes(), 3);

        let metrics = oob.class_metrics().unwrap();
        let classes: Vec<u32> = metrics.iter().map(|m| m.class).collect();
        assert_eq!(classes, vec![1, 2]);
        assert_eq!(
            metrics.iter().map(|m| m.support).sum::<usize>(),
            oob.n_oob_rows()
        );
        assert!(metrics.iter().all(|m| (0.0..=1.0).contains(&m.f1)));
    }

    #[test]
    fn no_bootstrap_leaves_no_oob_rows() {
        let ds = separable_classification(10);
        let err = TrainingConfig::new(Task::Classification)
            .with_num_trees(3)
            .with_label_column(2)
            .with_bootstrap(false)
            .with_oob_mode(OobMode::Enabled)
            .fit(&ds)
            .unwrap_err();
        assert!(matches!(err, RfError::OobEvaluationFailed { .. }));
    }
}
