use canopy_io::{Dataset, Example};
use rand::Rng;
use tracing::{debug, instrument};

use crate::{
    RfError,
    node::{LeafValue, Node, NodeIndex},
    split::{LabelStats, SplitSearch, Target, sample_columns},
};

/// Per-tree growth parameters, resolved once per fit.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GrowthParams {
    pub(crate) max_depth: Option<usize>,
    pub(crate) min_examples_per_leaf: usize,
    pub(crate) num_candidate_attributes: usize,
}

/// A node still to be grown.
struct Frame {
    rows: Vec<usize>,
    depth: usize,
    /// Internal node whose right child this frame becomes.
    right_of: Option<usize>,
}

/// Grows one decision tree over a bootstrap sample.
pub(crate) struct TreeBuilder<'a> {
    dataset: &'a Dataset,
    target: Target<'a>,
    features: &'a [usize],
    params: GrowthParams,
    tree_index: usize,
}

impl<'a> TreeBuilder<'a> {
    pub(crate) fn new(
        dataset: &'a Dataset,
        target: Target<'a>,
        features: &'a [usize],
        params: GrowthParams,
        tree_index: usize,
    ) -> Self {
        Self {
            dataset,
            target,
            features,
            params,
            tree_index,
        }
    }

    /// Grow a tree over `rows` (row indices into the dataset, repeats allowed).
    ///
    /// Nodes are emitted in pre-order from an explicit stack, so the left
    /// child of an internal node is always the next node in the arena and
    /// the depth is not bounded by the call stack.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::EmptyNode`] when a node receives no row.
    #[instrument(skip_all, fields(tree_index = self.tree_index, n_rows = rows.len()))]
    pub(crate) fn grow(&self, rows: Vec<usize>, rng: &mut impl Rng) -> Result<DecisionTree, RfError> {
        let search = SplitSearch::new(self.dataset, self.target, self.params.min_examples_per_leaf);
        let mut nodes: Vec<Node> = Vec::new();
        let mut stack = vec![Frame {
            rows,
            depth: 0,
            right_of: None,
        }];

        while let Some(frame) = stack.pop() {
            let index = nodes.len();
            if let Some(parent) = frame.right_of {
                if let Node::Internal { right, .. } = &mut nodes[parent] {
                    *right = NodeIndex::new(index);
                }
            }
            if frame.rows.is_empty() {
                return Err(RfError::EmptyNode {
                    tree_index: self.tree_index,
                    depth: frame.depth,
                });
            }

            let stats = LabelStats::from_rows(self.target, frame.rows.iter().copied());
            let impurity = stats.impurity();
            let n_examples = frame.rows.len();

            let depth_reached = self.params.max_depth.is_some_and(|d| frame.depth >= d);
            let too_few = n_examples < 2 * self.params.min_examples_per_leaf;
            let split = if depth_reached || too_few || self.target.is_pure(&frame.rows) {
                None
            } else {
                let columns =
                    sample_columns(self.features, self.params.num_candidate_attributes, rng);
                search.best_split(&frame.rows, &stats, &columns)
            };

            let Some(split) = split else {
                nodes.push(Node::Leaf {
                    value: stats.leaf_value(),
                    impurity,
                    n_examples,
                });
                continue;
            };

            let column = self.dataset.column(split.condition.column.index());
            let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = frame
                .rows
                .into_iter()
                .partition(|&row| split.condition.goes_left(column.value(row)));

            // The right index is patched once the right frame is popped.
            nodes.push(Node::Internal {
                condition: split.condition,
                left: NodeIndex::new(index + 1),
                right: NodeIndex::new(index),
                impurity,
                n_examples,
                gain: split.gain,
            });
            stack.push(Frame {
                rows: right_rows,
                depth: frame.depth + 1,
                right_of: Some(index),
            });
            stack.push(Frame {
                rows: left_rows,
                depth: frame.depth + 1,
                right_of: None,
            });
        }

        let tree = DecisionTree { nodes };
        debug!(
            n_nodes = tree.n_nodes(),
            depth = tree.depth(),
            "tree grown"
        );
        Ok(tree)
    }
}

/// A fitted decision tree.
///
/// Stored as a pre-order `Vec<Node>` arena with index references for
/// cache-friendly traversal and trivial serialization. The root is node 0.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DecisionTree {
    pub(crate) nodes: Vec<Node>,
}

impl DecisionTree {
    pub(crate) fn from_nodes(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    /// Nodes in pre-order.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Route `example` from the root and return the leaf value it reaches.
    ///
    /// Goes left at an internal node when its condition holds for the
    /// example's value of the split column; missing values follow the
    /// branch recorded at training time.
    pub fn leaf<E: Example + ?Sized>(&self, example: &E) -> &LeafValue {
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value, .. } => return value,
                Node::Internal {
                    condition,
                    left,
                    right,
                    ..
                } => {
                    idx = if condition.goes_left(example.value(condition.column.index())) {
                        left.index()
                    } else {
                        right.index()
                    };
                }
            }
        }
    }

    /// Return the total number of nodes in the tree (both splits and leaves).
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Return the number of leaf nodes.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Return the maximum depth of the tree.
    ///
    /// A single-node tree (just a root leaf) has depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        if self.nodes.is_empty() {
            return 0;
        }
        let mut max_depth = 0usize;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((node_idx, d)) = stack.pop() {
            match &self.nodes[node_idx] {
                Node::Leaf { .. } => max_depth = max_depth.max(d),
                Node::Internal { left, right, .. } => {
                    stack.push((left.index(), d + 1));
                    stack.push((right.index(), d + 1));
                }
            }
        }
        max_depth
    }
}

#[cfg(test)]
mod tests {
    use canopy_io::{ColumnData, Value};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::node::Test;
    use crate::test_util::{Col, dataset, separable_classification, step_regression};

    fn classification_target(ds: &Dataset, label: usize) -> Target<'_> {
        let ColumnData::Categorical(codes) = ds.column(label) else {
            panic!("categorical label expected");
        };
        Target::Classification {
            codes,
            n_classes: ds.spec().columns()[label].dictionary().map_or(1, |d| d.len()),
        }
    }

    fn regression_target(ds: &Dataset, label: usize) -> Target<'_> {
        let ColumnData::Numerical(values) = ds.column(label) else {
            panic!("numerical label expected");
        };
        Target::Regression { values }
    }

    fn params(max_depth: Option<usize>, min: usize, k: usize) -> GrowthParams {
        GrowthParams {
            max_depth,
            min_examples_per_leaf: min,
            num_candidate_attributes: k,
        }
    }

    fn grow(
        ds: &Dataset,
        target: Target<'_>,
        features: &[usize],
        p: GrowthParams,
    ) -> DecisionTree {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        TreeBuilder::new(ds, target, features, p, 0)
            .grow((0..ds.n_rows()).collect(), &mut rng)
            .unwrap()
    }

    fn assert_preorder(tree: &DecisionTree) {
        for (i, node) in tree.nodes().iter().enumerate() {
            if let Node::Internal { left, right, .. } = node {
                assert_eq!(left.index(), i + 1);
                assert!(right.index() > left.index());
                assert!(right.index() < tree.n_nodes());
            }
        }
    }

    #[test]
    fn separable_data_splits_on_x() {
        let ds = separable_classification(20);
        let tree = grow(&ds, classification_target(&ds, 2), &[0, 1], params(None, 1, 2));
        match &tree.nodes()[0] {
            Node::Internal { condition, .. } => {
                assert_eq!(condition.column.index(), 0);
                let Test::Threshold(t) = condition.test else {
                    panic!("threshold expected");
                };
                assert!(t > 1.9 && t < 10.0, "threshold {t}");
            }
            Node::Leaf { .. } => panic!("root should split"),
        }
        assert_eq!(tree.depth(), 1);
        assert_preorder(&tree);
    }

    #[test]
    fn zero_max_depth_gives_root_leaf() {
        let ds = separable_classification(10);
        let tree = grow(&ds, classification_target(&ds, 2), &[0, 1], params(Some(0), 1, 2));
        assert_eq!(tree.n_nodes(), 1);
        assert_eq!(
            tree.nodes()[0],
            Node::Leaf {
                value: LeafValue::Classification {
                    counts: vec![0, 10, 10]
                },
                impurity: crate::node::Impurity::new(0.5),
                n_examples: 20,
            }
        );
    }

    #[test]
    fn pure_labels_give_zero_impurity_leaf() {
        let ds = dataset(vec![
            Col::Num("x", vec![1.0, 2.0, 3.0]),
            Col::Cat("y", vec!["only"], vec![1, 1, 1]),
        ]);
        let tree = grow(&ds, classification_target(&ds, 1), &[0], params(None, 1, 1));
        assert_eq!(tree.n_nodes(), 1);
        assert!(tree.nodes()[0].impurity().value().abs() < f64::EPSILON);
    }

    #[test]
    fn leaf_counts_sum_to_subset_size() {
        let ds = separable_classification(15);
        let tree = grow(&ds, classification_target(&ds, 2), &[0, 1], params(None, 1, 1));
        for node in tree.nodes() {
            if let Node::Leaf {
                value: LeafValue::Classification { counts },
                n_examples,
                ..
            } = node
            {
                assert_eq!(counts.iter().sum::<usize>(), *n_examples);
            }
        }
    }

    #[test]
    fn regression_leaves_hold_subset_means() {
        let ds = step_regression(40);
        let tree = grow(&ds, regression_target(&ds, 1), &[0], params(None, 1, 1));
        assert_eq!(tree.n_leaves(), 2);
        for x in [0.5, 2.0, 4.8] {
            let leaf = tree.leaf(&vec![Value::Numerical(x), Value::Missing]);
            assert_eq!(leaf, &LeafValue::Regression { mean: 1.0 });
        }
        let leaf = tree.leaf(&vec![Value::Numerical(9.0), Value::Missing]);
        assert_eq!(leaf, &LeafValue::Regression { mean: 3.0 });
    }

    #[test]
    fn min_examples_per_leaf_bounds_leaf_size() {
        let ds = separable_classification(12);
        let tree = grow(&ds, classification_target(&ds, 2), &[0, 1], params(None, 5, 2));
        for node in tree.nodes() {
            assert!(node.n_examples() >= 5);
        }
    }

    #[test]
    fn missing_value_follows_recorded_branch() {
        let ds = dataset(vec![
            Col::Num("x", vec![1.0, 2.0, 3.0, 8.0, 9.0, f64::NAN]),
            Col::Cat("y", vec!["a", "b"], vec![1, 1, 1, 2, 2, 1]),
        ]);
        let tree = grow(&ds, classification_target(&ds, 1), &[0], params(None, 1, 1));
        let leaf = tree.leaf(&vec![Value::Missing, Value::Missing]);
        assert_eq!(leaf.top_class(), Some(1));
        assert_preorder(&tree);
    }

    #[test]
    fn grows_until_every_leaf_is_pure() {
        let n = 2000;
        let x: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let ds = dataset(vec![Col::Num("x", x.clone()), Col::Num("y", x)]);
        let tree = grow(&ds, regression_target(&ds, 1), &[0], params(None, 1, 1));
        assert_eq!(tree.n_leaves(), n);
        assert_preorder(&tree);
    }

    #[test]
    fn empty_rows_error() {
        let ds = separable_classification(2);
        let target = classification_target(&ds, 2);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let err = TreeBuilder::new(&ds, target, &[0, 1], params(None, 1, 2), 7)
            .grow(Vec::new(), &mut rng)
            .unwrap_err();
        assert!(matches!(
            err,
            RfError::EmptyNode {
                tree_index: 7,
                depth: 0
            }
        ));
    }
}
