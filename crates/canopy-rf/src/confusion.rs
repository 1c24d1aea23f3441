//! Confusion matrix and per-class classification metrics.

use std::fmt;

/// A confusion matrix over label codes.
///
/// Entry `matrix[true_code][predicted_code]` counts how many examples with
/// true label `true_code` were predicted as `predicted_code`. Code 0 is the
/// reserved missing code and never appears as a true label.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfusionMatrix {
    matrix: Vec<Vec<usize>>,
    n_classes: usize,
}

/// Per-class precision, recall, and F1 score.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ClassMetrics {
    /// The label code.
    pub class: u32,
    /// Precision: TP / (TP + FP). 0.0 if no predictions for this class.
    pub precision: f64,
    /// Recall: TP / (TP + FN). 0.0 if no true examples for this class.
    pub recall: f64,
    /// F1: 2 * precision * recall / (precision + recall). 0.0 if both are zero.
    pub f1: f64,
    /// Number of true examples in this class.
    pub support: usize,
}

impl ConfusionMatrix {
    /// Build a confusion matrix from `(true, predicted)` code pairs.
    ///
    /// Codes at or past `n_classes` are ignored.
    #[must_use]
    pub fn from_pairs(pairs: impl IntoIterator<Item = (u32, u32)>, n_classes: usize) -> Self {
        let mut matrix = vec![vec![0usize; n_classes]; n_classes];
        for (t, p) in pairs {
            if let Some(cell) = matrix
                .get_mut(t as usize)
                .and_then(|row| row.get_mut(p as usize))
            {
                *cell += 1;
            }
        }
        Self { matrix, n_classes }
    }

    /// Overall accuracy: proportion of correct predictions.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        let correct: usize = (0..self.n_classes).map(|i| self.matrix[i][i]).sum();
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            correct as f64 / total as f64
        }
    }

    /// Number of examples counted.
    #[must_use]
    pub fn total(&self) -> usize {
        self.matrix.iter().flat_map(|row| row.iter()).sum()
    }

    /// Per-class precision, recall, F1, and support, for codes `1..n_classes`.
    #[must_use]
    pub fn class_metrics(&self) -> Vec<ClassMetrics> {
        (1..self.n_classes)
            .map(|c| {
                let tp = self.matrix[c][c];
                let fp: usize = (0..self.n_classes)
                    .filter(|&i| i != c)
                    .map(|i| self.matrix[i][c])
                    .sum();
                let fn_: usize = (0..self.n_classes)
                    .filter(|&j| j != c)
                    .map(|j| self.matrix[c][j])
                    .sum();
                let support = tp + fn_;
                let precision = if tp + fp == 0 {
                    0.0
                } else {
                    tp as f64 / (tp + fp) as f64
                };
                let recall = if support == 0 {
                    0.0
                } else {
                    tp as f64 / support as f64
                };
                let f1 = if precision + recall == 0.0 {
                    0.0
                } else {
                    2.0 * precision * recall / (precision + recall)
                };
                ClassMetrics {
                    class: c as u32,
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect()
    }

    /// Return the number of label codes, the reserved code included.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>8}", "")?;
        for j in 1..self.n_classes {
            write!(f, " pred_{j:>3}")?;
        }
        writeln!(f)?;

        for (i, row) in self.matrix.iter().enumerate().skip(1) {
            write!(f, "true_{i:>3}")?;
            for val in row.iter().skip(1) {
                write!(f, " {val:>8}")?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}
