//! Configuration builder for random forest training.

use std::fmt;

use canopy_io::Dataset;

use crate::error::RfError;
use crate::result::TrainingResult;

/// Learning task, which fixes the label kind, the impurity and the leaf value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Task {
    /// Categorical label, Gini impurity, majority vote.
    Classification,
    /// Numerical label, variance impurity, mean of leaf means.
    Regression,
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::Classification => f.write_str("classification"),
            Task::Regression => f.write_str("regression"),
        }
    }
}

/// Whether to compute out-of-bag evaluation during training.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OobMode {
    /// Compute OOB accuracy and confusion matrix (classification) or RMSE (regression).
    Enabled,
    /// Skip OOB evaluation.
    Disabled,
}

/// Configuration for random forest training.
///
/// Largest accepted `bootstrap_ratio`.
pub const MAX_BOOTSTRAP_RATIO: f64 = 1000.0;

/// Construct via [`TrainingConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter                  | Default                         |
/// |----------------------------|---------------------------------|
/// | `label_column`             | 0                               |
/// | `num_trees`                | 1000                            |
/// | `max_depth`                | `None`                          |
/// | `bootstrap`                | `true`                          |
/// | `bootstrap_ratio`          | 1.0                             |
/// | `min_examples_per_leaf`    | 1                               |
/// | `num_candidate_attributes` | `None` (⌈√F⌉ or ⌈F/3⌉)          |
/// | `seed`                     | 42                              |
/// | `num_threads`              | available parallelism           |
/// | `oob_mode`                 | `Disabled`                      |
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    pub(crate) task: Task,
    pub(crate) label_column: usize,
    pub(crate) num_trees: usize,
    pub(crate) max_depth: Option<usize>,
    pub(crate) bootstrap: bool,
    pub(crate) bootstrap_ratio: f64,
    pub(crate) min_examples_per_leaf: usize,
    pub(crate) num_candidate_attributes: Option<usize>,
    pub(crate) seed: u64,
    pub(crate) num_threads: usize,
    pub(crate) oob_mode: OobMode,
}

impl TrainingConfig {
    /// Create a new config for `task` with default parameters.
    #[must_use]
    pub fn new(task: Task) -> Self {
        Self {
            task,
            label_column: 0,
            num_trees: 1000,
            max_depth: None,
            bootstrap: true,
            bootstrap_ratio: 1.0,
            min_examples_per_leaf: 1,
            num_candidate_attributes: None,
            seed: 42,
            num_threads: std::thread::available_parallelism().map_or(1, |n| n.get()),
            oob_mode: OobMode::Disabled,
        }
    }

    // --- Setters ---

    /// Set the index of the label column in the data spec.
    #[must_use]
    pub fn with_label_column(mut self, label_column: usize) -> Self {
        self.label_column = label_column;
        self
    }

    /// Set the number of trees.
    #[must_use]
    pub fn with_num_trees(mut self, num_trees: usize) -> Self {
        self.num_trees = num_trees;
        self
    }

    /// Set the maximum tree depth. `None` means unlimited; `Some(0)` grows
    /// single-leaf trees.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Enable or disable bootstrap sampling. Without it every tree sees all
    /// labelled rows.
    #[must_use]
    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    /// Set the bootstrap ratio (draws per tree as a multiple of the labelled row count).
    #[must_use]
    pub fn with_bootstrap_ratio(mut self, bootstrap_ratio: f64) -> Self {
        self.bootstrap_ratio = bootstrap_ratio;
        self
    }

    /// Set the minimum number of examples in each leaf after a split.
    #[must_use]
    pub fn with_min_examples_per_leaf(mut self, min_examples_per_leaf: usize) -> Self {
        self.min_examples_per_leaf = min_examples_per_leaf;
        self
    }

    /// Set the number of feature columns drawn at each node. `None` selects
    /// the task default.
    #[must_use]
    pub fn with_num_candidate_attributes(mut self, num: Option<usize>) -> Self {
        self.num_candidate_attributes = num;
        self
    }

    /// Set the random seed for reproducibility.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the number of worker threads.
    #[must_use]
    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    /// Set the OOB evaluation mode.
    #[must_use]
    pub fn with_oob_mode(mut self, oob_mode: OobMode) -> Self {
        self.oob_mode = oob_mode;
        self
    }

    // --- Getters ---

    /// Return the learning task.
    #[must_use]
    pub fn task(&self) -> Task {
        self.task
    }

    /// Return the label column index.
    #[must_use]
    pub fn label_column(&self) -> usize {
        self.label_column
    }

    /// Return the number of trees.
    #[must_use]
    pub fn num_trees(&self) -> usize {
        self.num_trees
    }

    /// Return the maximum depth limit, if any.
    #[must_use]
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    /// Return whether bootstrap sampling is enabled.
    #[must_use]
    pub fn bootstrap(&self) -> bool {
        self.bootstrap
    }

    /// Return the bootstrap ratio.
    #[must_use]
    pub fn bootstrap_ratio(&self) -> f64 {
        self.bootstrap_ratio
    }

    /// Return the minimum examples required in each leaf.
    #[must_use]
    pub fn min_examples_per_leaf(&self) -> usize {
        self.min_examples_per_leaf
    }

    /// Return the configured number of candidate attributes, if set.
    #[must_use]
    pub fn num_candidate_attributes(&self) -> Option<usize> {
        self.num_candidate_attributes
    }

    /// Return the random seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Return the number of worker threads.
    #[must_use]
    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Return the OOB evaluation mode.
    #[must_use]
    pub fn oob_mode(&self) -> OobMode {
        self.oob_mode
    }

    /// Check the parameters that do not depend on the data.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`RfError::InvalidTreeCount`] | `num_trees` is zero |
    /// | [`RfError::InvalidBootstrapRatio`] | `bootstrap_ratio` is not in `(0, MAX_BOOTSTRAP_RATIO]` |
    /// | [`RfError::InvalidMinExamplesPerLeaf`] | `min_examples_per_leaf` is zero |
    /// | [`RfError::InvalidCandidateAttributes`] | `num_candidate_attributes` is `Some(0)` |
    /// | [`RfError::InvalidThreadCount`] | `num_threads` is zero |
    pub fn validate(&self) -> Result<(), RfError> {
        if self.num_trees == 0 {
            return Err(RfError::InvalidTreeCount {
                num_trees: self.num_trees,
            });
        }
        if !(self.bootstrap_ratio > 0.0 && self.bootstrap_ratio <= MAX_BOOTSTRAP_RATIO) {
            return Err(RfError::InvalidBootstrapRatio {
                ratio: self.bootstrap_ratio,
            });
        }
        if self.min_examples_per_leaf == 0 {
            return Err(RfError::InvalidMinExamplesPerLeaf {
                min_examples: self.min_examples_per_leaf,
            });
        }
        if self.num_candidate_attributes == Some(0) {
            return Err(RfError::InvalidCandidateAttributes {
                requested: 0,
                n_features: 0,
            });
        }
        if self.num_threads == 0 {
            return Err(RfError::InvalidThreadCount {
                num_threads: self.num_threads,
            });
        }
        Ok(())
    }

    /// Train a random forest on `dataset`.
    ///
    /// The label is read from column [`label_column`](Self::label_column);
    /// every other column is a feature. Rows with a missing label are ignored.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | any of [`validate`](Self::validate) | invalid parameter |
    /// | [`RfError::LabelColumnOutOfRange`] | label column past the last column |
    /// | [`RfError::LabelKindMismatch`] | label kind does not fit the task |
    /// | [`RfError::ZeroFeatures`] | no column besides the label |
    /// | [`RfError::NoLabelledRows`] | every label is missing |
    /// | [`RfError::InvalidCandidateAttributes`] | more candidates than features |
    /// | [`RfError::EmptyBootstrap`] | `round(n_labelled * bootstrap_ratio)` is zero |
    /// | [`RfError::ThreadPool`] | worker pool cannot be created |
    /// | [`RfError::EmptyNode`] | a node received no example |
    /// | [`RfError::OobEvaluationFailed`] | OOB enabled but no row has any OOB tree |
    pub fn fit(&self, dataset: &Dataset) -> Result<TrainingResult, RfError> {
        crate::forest::train(self, dataset)
    }
}
