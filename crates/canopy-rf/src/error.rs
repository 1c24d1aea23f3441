use std::path::PathBuf;

use canopy_io::{ColumnKind, EncodingError, SchemaError};

use crate::config::Task;

/// Coarse error family, used by callers that branch on the kind of failure
/// rather than on individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The CSV could not be read or its schema could not be inferred.
    Schema,
    /// A CSV row could not be encoded against a data spec.
    Encoding,
    /// Training parameters are invalid or inconsistent with the data.
    Config,
    /// Tree growth or a worker pool failed.
    Training,
    /// A persisted model is malformed or from another format version.
    CorruptModel,
    /// A model file could not be read or written.
    Io,
    /// An example could not be evaluated.
    Prediction,
}

/// Errors from random forest training, prediction and model persistence.
#[derive(Debug, thiserror::Error)]
pub enum RfError {
    /// Schema inference failed.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Dataset encoding failed.
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// Returned when num_trees is zero.
    #[error("num_trees must be at least 1, got {num_trees}")]
    InvalidTreeCount {
        /// The invalid num_trees value provided.
        num_trees: usize,
    },

    /// Returned when bootstrap_ratio is not in `(0, MAX_BOOTSTRAP_RATIO]`.
    #[error("bootstrap_ratio must be in (0, {max}], got {ratio}", max = crate::config::MAX_BOOTSTRAP_RATIO)]
    InvalidBootstrapRatio {
        /// The invalid bootstrap_ratio value provided.
        ratio: f64,
    },

    /// Returned when `round(n_rows * bootstrap_ratio)` is zero.
    #[error("bootstrap sample would be empty: {n_rows} labelled rows at ratio {ratio}")]
    EmptyBootstrap {
        /// Number of labelled rows.
        n_rows: usize,
        /// The configured bootstrap ratio.
        ratio: f64,
    },

    /// Returned when min_examples_per_leaf is zero.
    #[error("min_examples_per_leaf must be at least 1, got {min_examples}")]
    InvalidMinExamplesPerLeaf {
        /// The invalid min_examples_per_leaf value provided.
        min_examples: usize,
    },

    /// Returned when num_candidate_attributes is outside `[1, n_features]`.
    #[error("num_candidate_attributes is {requested}, but must be in [1, {n_features}]")]
    InvalidCandidateAttributes {
        /// The requested number of candidate attributes.
        requested: usize,
        /// The number of feature columns in the dataset.
        n_features: usize,
    },

    /// Returned when num_threads is zero.
    #[error("num_threads must be at least 1, got {num_threads}")]
    InvalidThreadCount {
        /// The invalid num_threads value provided.
        num_threads: usize,
    },

    /// Returned when the label column name is absent from the CSV header.
    #[error("label column {name:?} not found in header")]
    UnknownLabelColumn {
        /// The requested label column name.
        name: String,
    },

    /// Returned when the label column index is past the last column.
    #[error("label column {label_column} is out of range for {n_columns} columns")]
    LabelColumnOutOfRange {
        /// The configured label column index.
        label_column: usize,
        /// Number of columns in the data spec.
        n_columns: usize,
    },

    /// Returned when the label column kind does not fit the task.
    #[error("label column {column:?} is {kind}, which cannot be used for {task}")]
    LabelKindMismatch {
        /// Name of the label column.
        column: String,
        /// Kind of the label column.
        kind: ColumnKind,
        /// The configured task.
        task: Task,
    },

    /// Returned when every row has a missing label.
    #[error("no row has a label value")]
    NoLabelledRows,

    /// Returned when the data spec has no column besides the label.
    #[error("training dataset has zero feature columns")]
    ZeroFeatures,

    /// Returned when a node receives no training example.
    #[error("tree {tree_index} reached an empty node at depth {depth}")]
    EmptyNode {
        /// Index of the tree being grown.
        tree_index: usize,
        /// Depth of the empty node.
        depth: usize,
    },

    /// Returned when the training thread pool cannot be created.
    #[error("failed to build training thread pool")]
    ThreadPool {
        /// The underlying rayon error.
        source: rayon::ThreadPoolBuildError,
    },

    /// Returned when an example has a different width than the data spec.
    #[error("example has {got} values, expected {expected}")]
    ExampleWidthMismatch {
        /// Number of columns in the data spec.
        expected: usize,
        /// Number of values in the example.
        got: usize,
    },

    /// Returned when OOB evaluation fails (no row has any OOB tree).
    #[error("OOB evaluation failed: {reason}")]
    OobEvaluationFailed {
        /// Human-readable description of why OOB evaluation failed.
        reason: String,
    },

    /// Returned when the model directory cannot be created.
    #[error("failed to create model directory {path}")]
    CreateModelDir {
        /// Directory that could not be created.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when writing a model file fails.
    #[error("failed to write model to {path}")]
    WriteModel {
        /// Path to the file that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when reading a model file fails.
    #[error("failed to read model from {path}")]
    ReadModel {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when the trees cannot be serialized.
    #[error("failed to serialize model")]
    SerializeModel {
        /// The underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when the header or data spec cannot be serialized.
    #[error("failed to serialize model metadata")]
    EncodeJson {
        /// The underlying serde_json error.
        source: serde_json::Error,
    },

    /// Returned when a JSON model file cannot be decoded.
    #[error("failed to decode {path}")]
    DecodeJson {
        /// Path to the undecodable file.
        path: PathBuf,
        /// The underlying serde_json error.
        source: serde_json::Error,
    },

    /// Returned when the tree file cannot be decoded.
    #[error("failed to deserialize trees from {path}")]
    DecodeTrees {
        /// Path to the undecodable file.
        path: PathBuf,
        /// The underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when loading a model with an incompatible format version.
    #[error("incompatible model version in {path}: expected {expected}, found {found}")]
    IncompatibleModelVersion {
        /// The model format version this build expects.
        expected: u32,
        /// The model format version found in the file.
        found: u32,
        /// Path to the model file with the incompatible version.
        path: PathBuf,
    },

    /// Returned when a decoded model violates a structural invariant.
    #[error("corrupt model in {path}: {reason}")]
    CorruptModel {
        /// Path to the offending model file.
        path: PathBuf,
        /// Which invariant is violated.
        reason: String,
    },
}

impl RfError {
    /// Return the family this error belongs to.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            RfError::Schema(_) => ErrorCategory::Schema,
            RfError::Encoding(_) => ErrorCategory::Encoding,
            RfError::InvalidTreeCount { .. }
            | RfError::InvalidBootstrapRatio { .. }
            | RfError::EmptyBootstrap { .. }
            | RfError::InvalidMinExamplesPerLeaf { .. }
            | RfError::InvalidCandidateAttributes { .. }
            | RfError::InvalidThreadCount { .. }
            | RfError::UnknownLabelColumn { .. }
            | RfError::LabelColumnOutOfRange { .. }
            | RfError::LabelKindMismatch { .. }
            | RfError::NoLabelledRows
            | RfError::ZeroFeatures => ErrorCategory::Config,
            RfError::EmptyNode { .. }
            | RfError::ThreadPool { .. }
            | RfError::OobEvaluationFailed { .. } => ErrorCategory::Training,
            RfError::ExampleWidthMismatch { .. } => ErrorCategory::Prediction,
            RfError::CreateModelDir { .. }
            | RfError::WriteModel { .. }
            | RfError::ReadModel { .. }
            | RfError::SerializeModel { .. }
            | RfError::EncodeJson { .. } => ErrorCategory::Io,
            RfError::DecodeJson { .. }
            | RfError::DecodeTrees { .. }
            | RfError::IncompatibleModelVersion { .. }
            | RfError::CorruptModel { .. } => ErrorCategory::CorruptModel,
        }
    }
}
