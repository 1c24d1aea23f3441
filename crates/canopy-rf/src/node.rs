use std::fmt;

use canopy_io::Value;

/// Zero-based column index into the model's data spec.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    serde::Serialize, serde::Deserialize,
)]
pub struct ColumnIndex(usize);

impl ColumnIndex {
    /// Create a column index from a zero-based data spec position.
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Return the zero-based column index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ColumnIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index into a `Vec<Node>` arena, identifying a specific node in a decision tree.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    serde::Serialize, serde::Deserialize,
)]
pub struct NodeIndex(usize);

impl NodeIndex {
    /// Create a new node index from a zero-based arena position.
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Return the zero-based arena index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Task-agnostic impurity value (Gini or variance).
#[derive(
    Debug, Clone, Copy, PartialEq, PartialOrd,
    serde::Serialize, serde::Deserialize,
)]
pub struct Impurity(f64);

impl Impurity {
    /// Create a new impurity value.
    pub(crate) fn new(value: f64) -> Self {
        Self(value)
    }

    /// Return the raw impurity value.
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Impurity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.0)
    }
}

/// Compact bitset of categorical codes.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CategorySet {
    words: Vec<u64>,
}

impl CategorySet {
    /// Build a set from a list of codes.
    pub fn from_codes(codes: impl IntoIterator<Item = u32>) -> Self {
        let mut set = Self::default();
        for code in codes {
            set.insert(code);
        }
        set
    }

    /// Insert `code` into the set.
    pub fn insert(&mut self, code: u32) {
        let word = (code / 64) as usize;
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1u64 << (code % 64);
    }

    /// Check whether `code` is in the set.
    #[inline]
    #[must_use]
    pub fn contains(&self, code: u32) -> bool {
        self.words
            .get((code / 64) as usize)
            .is_some_and(|&w| (w >> (code % 64)) & 1 != 0)
    }

    /// Number of codes in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Return `true` when the set holds no code.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Iterate the codes in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.words.iter().enumerate().flat_map(|(i, &w)| {
            (0..64u32)
                .filter(move |bit| (w >> bit) & 1 != 0)
                .map(move |bit| i as u32 * 64 + bit)
        })
    }

    /// Largest code in the set.
    #[must_use]
    pub fn max_code(&self) -> Option<u32> {
        self.iter().last()
    }
}

/// The test applied by a split node.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Test {
    /// Numerical or boolean column: `value <= threshold` goes left.
    Threshold(f64),
    /// Categorical column: codes in the set go left.
    InSet(CategorySet),
}

/// Routing rule of an internal node.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SplitCondition {
    /// Column tested by the split.
    pub column: ColumnIndex,
    /// Test applied to non-missing values.
    pub test: Test,
    /// Branch taken by missing values: chosen at training time as the branch
    /// that received more non-missing examples (left on ties).
    pub missing_left: bool,
}

impl SplitCondition {
    /// Return `true` when `value` is routed to the left child.
    ///
    /// A value whose kind does not match the test is routed like a missing value.
    #[must_use]
    pub fn goes_left(&self, value: Value) -> bool {
        match (value, &self.test) {
            (Value::Numerical(x), Test::Threshold(t)) => x <= *t,
            (Value::Boolean(b), Test::Threshold(t)) => f64::from(u8::from(b)) <= *t,
            (Value::Categorical(code), Test::InSet(set)) => set.contains(code),
            _ => self.missing_left,
        }
    }
}

/// Prediction stored in a leaf.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum LeafValue {
    /// Number of training examples per label code; sums to the leaf's example count.
    Classification {
        /// Example counts indexed by label code.
        counts: Vec<usize>,
    },
    /// Mean label of the training examples in the leaf.
    Regression {
        /// Arithmetic mean of the labels.
        mean: f64,
    },
}

impl LeafValue {
    /// Most represented class (lowest code on ties); `None` for regression leaves.
    #[must_use]
    pub fn top_class(&self) -> Option<u32> {
        match self {
            LeafValue::Classification { counts } => {
                let mut best: Option<(usize, usize)> = None;
                for (code, &c) in counts.iter().enumerate() {
                    if best.is_none_or(|(_, bc)| c > bc) {
                        best = Some((code, c));
                    }
                }
                best.map(|(code, _)| code as u32)
            }
            LeafValue::Regression { .. } => None,
        }
    }

    /// Normalized class distribution; empty for regression leaves.
    #[must_use]
    pub fn distribution(&self) -> Vec<f64> {
        match self {
            LeafValue::Classification { counts } => {
                let total: usize = counts.iter().sum();
                if total == 0 {
                    return vec![0.0; counts.len()];
                }
                counts.iter().map(|&c| c as f64 / total as f64).collect()
            }
            LeafValue::Regression { .. } => Vec::new(),
        }
    }
}

/// A node in a decision tree arena.
///
/// Trees are stored as `Vec<Node>` in pre-order, where children are
/// referenced by [`NodeIndex`] rather than pointers: the left child of an
/// internal node always immediately follows it.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Node {
    /// An interior split node.
    Internal {
        /// Routing rule.
        condition: SplitCondition,
        /// Index of the left child node.
        left: NodeIndex,
        /// Index of the right child node.
        right: NodeIndex,
        /// Impurity at this node before splitting.
        impurity: Impurity,
        /// Number of training examples that reached this node.
        n_examples: usize,
        /// Weighted impurity decrease achieved by the split.
        gain: f64,
    },
    /// A terminal leaf node.
    Leaf {
        /// Prediction of the leaf.
        value: LeafValue,
        /// Impurity at this leaf.
        impurity: Impurity,
        /// Number of training examples in this leaf.
        n_examples: usize,
    },
}

impl Node {
    /// Return the impurity at this node (before splitting for internal nodes).
    #[must_use]
    pub fn impurity(&self) -> Impurity {
        match self {
            Node::Internal { impurity, .. } | Node::Leaf { impurity, .. } => *impurity,
        }
    }

    /// Return the number of training examples that reached this node.
    #[must_use]
    pub fn n_examples(&self) -> usize {
        match self {
            Node::Internal { n_examples, .. } | Node::Leaf { n_examples, .. } => *n_examples,
        }
    }

    /// Return `true` if this node is a leaf.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }
}
