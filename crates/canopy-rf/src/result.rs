//! Training result types.

use crate::config::Task;
use crate::forest::Model;
use crate::oob::OobEvaluation;

/// Metadata about the training run.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TrainingMetadata {
    /// Learning task.
    pub task: Task,
    /// Number of trees trained.
    pub num_trees: usize,
    /// Number of feature columns (every column but the label).
    pub n_features: usize,
    /// Number of label codes including the reserved code 0; zero for regression.
    pub n_classes: usize,
    /// Number of rows with a label value.
    pub n_labelled_rows: usize,
    /// Resolved number of candidate attributes per node.
    pub num_candidate_attributes: usize,
    /// Rows drawn for each tree.
    pub draws_per_tree: usize,
}

/// Result of random forest training.
///
/// Contains the fitted model, optional OOB evaluation, per-tree OOB row
/// indices, and training metadata.
#[derive(Debug)]
pub struct TrainingResult {
    model: Model,
    oob: Option<OobEvaluation>,
    oob_indices_per_tree: Vec<Vec<usize>>,
    metadata: TrainingMetadata,
}

impl TrainingResult {
    /// Create a new training result.
    pub(crate) fn new(
        model: Model,
        oob: Option<OobEvaluation>,
        oob_indices_per_tree: Vec<Vec<usize>>,
        metadata: TrainingMetadata,
    ) -> Self {
        Self {
            model,
            oob,
            oob_indices_per_tree,
            metadata,
        }
    }

    /// Borrow the fitted model.
    #[must_use]
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Consume the result and return the fitted model.
    #[must_use]
    pub fn into_model(self) -> Model {
        self.model
    }

    /// Return the OOB evaluation, if computed.
    #[must_use]
    pub fn oob(&self) -> Option<&OobEvaluation> {
        self.oob.as_ref()
    }

    /// Return training metadata.
    #[must_use]
    pub fn metadata(&self) -> &TrainingMetadata {
        &self.metadata
    }

    /// Return the per-tree OOB row indices (empty without bootstrap).
    #[must_use]
    pub fn oob_indices_per_tree(&self) -> &[Vec<usize>] {
        &self.oob_indices_per_tree
    }
}
