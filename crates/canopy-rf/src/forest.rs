//! Random forest training with parallel tree construction.

use canopy_io::{ColumnData, ColumnKind, DataSpec, Dataset};
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::{debug, info, instrument};

use crate::config::{OobMode, Task, TrainingConfig};
use crate::error::RfError;
use crate::oob::compute_oob;
use crate::result::{TrainingMetadata, TrainingResult};
use crate::sampler::{bootstrap_sample, draw_count, full_sample, tree_rng};
use crate::split::Target;
use crate::tree::{DecisionTree, GrowthParams, TreeBuilder};

/// A fitted random forest.
///
/// Owns the data spec it was trained with; immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub(crate) data_spec: DataSpec,
    pub(crate) task: Task,
    pub(crate) label_column: usize,
    pub(crate) trees: Vec<DecisionTree>,
}

impl Model {
    /// The schema examples must follow.
    #[must_use]
    pub fn data_spec(&self) -> &DataSpec {
        &self.data_spec
    }

    /// The learning task.
    #[must_use]
    pub fn task(&self) -> Task {
        self.task
    }

    /// Index of the label column in the data spec.
    #[must_use]
    pub fn label_column(&self) -> usize {
        self.label_column
    }

    /// Name of the label column.
    #[must_use]
    pub fn label_name(&self) -> &str {
        self.data_spec
            .column(self.label_column)
            .map_or("", |c| c.name())
    }

    /// Trees in training order.
    #[must_use]
    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Number of trees.
    #[must_use]
    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    /// Number of label codes, including the reserved code 0; zero for regression.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        match self.task {
            Task::Classification => self
                .data_spec
                .column(self.label_column)
                .and_then(|c| c.dictionary())
                .map_or(0, |d| d.len()),
            Task::Regression => 0,
        }
    }
}

/// Resolve the number of candidate attributes per node.
///
/// `None` selects ⌈√F⌉ for classification and ⌈F/3⌉ for regression.
pub(crate) fn resolve_candidate_attributes(
    requested: Option<usize>,
    task: Task,
    n_features: usize,
) -> Result<usize, RfError> {
    let resolved = requested.unwrap_or(match task {
        Task::Classification => (n_features as f64).sqrt().ceil() as usize,
        Task::Regression => n_features.div_ceil(3),
    });
    if resolved == 0 || resolved > n_features {
        return Err(RfError::InvalidCandidateAttributes {
            requested: resolved,
            n_features,
        });
    }
    Ok(resolved)
}

/// Required label kind for `task`.
pub(crate) fn label_kind(task: Task) -> ColumnKind {
    match task {
        Task::Classification => ColumnKind::Categorical,
        Task::Regression => ColumnKind::Numerical,
    }
}

/// View the label column of `dataset` as a training target.
fn label_target(dataset: &Dataset, task: Task, label_column: usize) -> Result<Target<'_>, RfError> {
    let spec = dataset.spec();
    let Some(column) = spec.column(label_column) else {
        return Err(RfError::LabelColumnOutOfRange {
            label_column,
            n_columns: spec.n_columns(),
        });
    };
    match (task, dataset.column(label_column), column.dictionary()) {
        (Task::Classification, ColumnData::Categorical(codes), Some(dictionary)) => {
            Ok(Target::Classification {
                codes,
                n_classes: dictionary.len(),
            })
        }
        (Task::Regression, ColumnData::Numerical(values), _) => Ok(Target::Regression { values }),
        _ => Err(RfError::LabelKindMismatch {
            column: column.name().to_string(),
            kind: column.kind(),
            task,
        }),
    }
}

/// Train the random forest ensemble.
#[instrument(skip_all, fields(task = %config.task, num_trees = config.num_trees, n_rows = dataset.n_rows()))]
pub(crate) fn train(config: &TrainingConfig, dataset: &Dataset) -> Result<TrainingResult, RfError> {
    // --- Validate config against the data ---
    config.validate()?;
    let label_column = config.label_column;
    let target = label_target(dataset, config.task, label_column)?;

    let features: Vec<usize> = (0..dataset.n_columns())
        .filter(|&c| c != label_column)
        .collect();
    if features.is_empty() {
        return Err(RfError::ZeroFeatures);
    }

    let labelled: Vec<usize> = (0..dataset.n_rows())
        .filter(|&row| target.is_labelled(row))
        .collect();
    if labelled.is_empty() {
        return Err(RfError::NoLabelledRows);
    }

    let num_candidates =
        resolve_candidate_attributes(config.num_candidate_attributes, config.task, features.len())?;

    let draws = if config.bootstrap {
        draw_count(labelled.len(), config.bootstrap_ratio)
    } else {
        labelled.len()
    };
    if draws == 0 {
        return Err(RfError::EmptyBootstrap {
            n_rows: labelled.len(),
            ratio: config.bootstrap_ratio,
        });
    }

    let n_classes = match target {
        Target::Classification { n_classes, .. } => n_classes,
        Target::Regression { .. } => 0,
    };

    info!(
        num_trees = config.num_trees,
        n_labelled = labelled.len(),
        n_features = features.len(),
        n_classes,
        num_candidates,
        draws,
        num_threads = config.num_threads,
        "training random forest"
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.num_threads)
        .build()
        .map_err(|source| RfError::ThreadPool { source })?;

    let params = GrowthParams {
        max_depth: config.max_depth,
        min_examples_per_leaf: config.min_examples_per_leaf,
        num_candidate_attributes: num_candidates,
    };
    let seed = config.seed;
    let bootstrap = config.bootstrap;

    // Parallel tree training; collect keeps tree order and stops on the first error.
    let grown: Vec<(DecisionTree, Vec<usize>)> = pool.install(|| {
        (0..config.num_trees)
            .into_par_iter()
            .map(|tree_index| {
                let mut rng = tree_rng(seed, tree_index);
                let sample = if bootstrap {
                    bootstrap_sample(&labelled, draws, &mut rng)
                } else {
                    full_sample(&labelled)
                };
                let tree = TreeBuilder::new(dataset, target, &features, params, tree_index)
                    .grow(sample.in_bag, &mut rng)?;
                Ok((tree, sample.out_of_bag))
            })
            .collect::<Result<Vec<_>, RfError>>()
    })?;

    let mut trees = Vec::with_capacity(config.num_trees);
    let mut oob_indices_per_tree = Vec::with_capacity(config.num_trees);
    for (tree, oob) in grown {
        trees.push(tree);
        oob_indices_per_tree.push(oob);
    }
    debug!(
        n_trees_trained = trees.len(),
        n_nodes = trees.iter().map(DecisionTree::n_nodes).sum::<usize>(),
        "tree training complete"
    );

    let oob = if config.oob_mode == OobMode::Enabled {
        Some(compute_oob(&trees, dataset, target, &oob_indices_per_tree)?)
    } else {
        None
    };

    let model = Model {
        data_spec: dataset.spec().clone(),
        task: config.task,
        label_column,
        trees,
    };

    let metadata = TrainingMetadata {
        task: config.task,
        num_trees: config.num_trees,
        n_features: features.len(),
        n_classes,
        n_labelled_rows: labelled.len(),
        num_candidate_attributes: num_candidates,
        draws_per_tree: draws,
    };

    info!(
        oob_accuracy = oob.as_ref().and_then(|o| o.accuracy()),
        oob_rmse = oob.as_ref().and_then(|o| o.rmse()),
        "random forest training complete"
    );

    Ok(TrainingResult::new(model, oob, oob_indices_per_tree, metadata))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use crate::node::Node;
    use crate::test_util::{Col, dataset, separable_classification, step_regression};

    fn small(task: Task) -> TrainingConfig {
        TrainingConfig::new(task)
            .with_num_trees(10)
            .with_num_threads(2)
    }

    #[test]
    fn candidate_defaults() {
        assert_eq!(
            resolve_candidate_attributes(None, Task::Classification, 10).unwrap(),
            4
        );
        assert_eq!(
            resolve_candidate_attributes(None, Task::Regression, 10).unwrap(),
            4
        );
        assert_eq!(
            resolve_candidate_attributes(None, Task::Regression, 1).unwrap(),
            1
        );
        assert_eq!(
            resolve_candidate_attributes(Some(3), Task::Regression, 3).unwrap(),
            3
        );
        assert!(matches!(
            resolve_candidate_attributes(Some(4), Task::Classification, 3),
            Err(RfError::InvalidCandidateAttributes {
                requested: 4,
                n_features: 3
            })
        ));
    }

    #[test]
    fn trains_requested_tree_count() {
        let ds = separable_classification(20);
        let result = small(Task::Classification)
            .with_label_column(2)
            .fit(&ds)
            .unwrap();
        assert_eq!(result.model().num_trees(), 10);
        assert_eq!(result.oob_indices_per_tree().len(), 10);
        assert_eq!(result.metadata().n_features, 2);
        assert_eq!(result.metadata().n_classes, 3);
        assert_eq!(result.metadata().num_candidate_attributes, 2);
        assert!(result.oob().is_none());
    }

    #[test]
    fn same_seed_same_forest_regardless_of_threads() {
        let ds = separable_classification(25);
        let a = small(Task::Classification)
            .with_label_column(2)
            .with_num_threads(1)
            .fit(&ds)
            .unwrap();
        let b = small(Task::Classification)
            .with_label_column(2)
            .with_num_threads(4)
            .fit(&ds)
            .unwrap();
        assert_eq!(a.model(), b.model());
        let c = small(Task::Classification)
            .with_label_column(2)
            .with_seed(7)
            .fit(&ds)
            .unwrap();
        assert_eq!(c.model().num_trees(), 10);
    }

    #[test]
    fn zero_max_depth_roots_are_leaves() {
        let ds = step_regression(30);
        let result = small(Task::Regression)
            .with_label_column(1)
            .with_max_depth(Some(0))
            .fit(&ds)
            .unwrap();
        for tree in result.model().trees() {
            assert_eq!(tree.n_nodes(), 1);
            assert!(tree.nodes()[0].is_leaf());
        }
    }

    #[test]
    fn rows_without_label_are_ignored() {
        let ds = dataset(vec![
            Col::Num("x", vec![1.0, 2.0, 3.0, 4.0]),
            Col::Num("y", vec![1.0, f64::NAN, 1.0, f64::NAN]),
        ]);
        let result = small(Task::Regression)
            .with_label_column(1)
            .with_bootstrap(false)
            .fit(&ds)
            .unwrap();
        assert_eq!(result.metadata().n_labelled_rows, 2);
        for tree in result.model().trees() {
            assert_eq!(tree.nodes()[0].n_examples(), 2);
        }
    }

    #[test]
    fn no_bootstrap_uses_every_row_once() {
        let ds = separable_classification(10);
        let result = small(Task::Classification)
            .with_label_column(2)
            .with_bootstrap(false)
            .fit(&ds)
            .unwrap();
        for tree in result.model().trees() {
            assert_eq!(tree.nodes()[0].n_examples(), 20);
        }
        assert!(result.oob_indices_per_tree().iter().all(Vec::is_empty));
    }

    #[test]
    fn label_out_of_range() {
        let ds = separable_classification(5);
        let err = small(Task::Classification)
            .with_label_column(3)
            .fit(&ds)
            .unwrap_err();
        assert!(matches!(
            err,
            RfError::LabelColumnOutOfRange {
                label_column: 3,
                n_columns: 3
            }
        ));
    }

    #[test]
    fn label_kind_must_match_task() {
        let ds = separable_classification(5);
        let err = small(Task::Regression)
            .with_label_column(2)
            .fit(&ds)
            .unwrap_err();
        assert!(matches!(err, RfError::LabelKindMismatch { .. }));
        let err = small(Task::Classification)
            .with_label_column(0)
            .fit(&ds)
            .unwrap_err();
        assert!(matches!(err, RfError::LabelKindMismatch { .. }));
    }

    #[test]
    fn label_only_dataset_has_no_features() {
        let ds = dataset(vec![Col::Num("y", vec![1.0, 2.0])]);
        let err = small(Task::Regression).fit(&ds).unwrap_err();
        assert!(matches!(err, RfError::ZeroFeatures));
    }

    #[test]
    fn all_labels_missing() {
        let ds = dataset(vec![
            Col::Num("x", vec![1.0, 2.0]),
            Col::Cat("y", vec!["a"], vec![0, 0]),
        ]);
        let err = small(Task::Classification)
            .with_label_column(1)
            .fit(&ds)
            .unwrap_err();
        assert!(matches!(err, RfError::NoLabelledRows));
    }

    #[test]
    fn tiny_ratio_is_empty_bootstrap() {
        let ds = step_regression(4);
        let err = small(Task::Regression)
            .with_label_column(1)
            .with_bootstrap_ratio(0.1)
            .fit(&ds)
            .unwrap_err();
        assert!(matches!(err, RfError::EmptyBootstrap { n_rows: 4, .. }));
    }

    #[test]
    fn huge_ratio_is_rejected_before_sampling() {
        let ds = step_regression(4);
        let err = small(Task::Regression)
            .with_label_column(1)
            .with_bootstrap_ratio(1e30)
            .fit(&ds)
            .unwrap_err();
        assert!(matches!(err, RfError::InvalidBootstrapRatio { .. }));
        assert_eq!(err.category(), ErrorCategory::Config);
    }

    #[test]
    fn oob_evaluation_on_separable_data() {
        let ds = separable_classification(30);
        let result = small(Task::Classification)
            .with_num_trees(30)
            .with_label_column(2)
            .with_oob_mode(OobMode::Enabled)
            .fit(&ds)
            .unwrap();
        let oob = result.oob().unwrap();
        assert!(oob.accuracy().unwrap() > 0.9);
    }

    #[test]
    fn single_label_value_gives_pure_roots() {
        let ds = dataset(vec![
            Col::Num("x", vec![1.0, 2.0, 3.0, 4.0]),
            Col::Cat("y", vec!["only"], vec![1, 1, 1, 1]),
        ]);
        let result = small(Task::Classification)
            .with_label_column(1)
            .fit(&ds)
            .unwrap();
        for tree in result.model().trees() {
            match &tree.nodes()[0] {
                Node::Leaf { impurity, .. } => assert!(impurity.value().abs() < f64::EPSILON),
                Node::Internal { .. } => panic!("root should be a leaf"),
            }
        }
    }
}
