//! Model directory persistence: JSON header and data spec, bincode trees.

use std::path::{Path, PathBuf};

use canopy_io::{ColumnKind, DataSpec};
use tracing::{debug, info, instrument};

use crate::config::Task;
use crate::error::RfError;
use crate::forest::{Model, label_kind};
use crate::node::{LeafValue, Node, Test};
use crate::tree::DecisionTree;

/// Current model format version.
pub const FORMAT_VERSION: u32 = 1;

/// Header file name inside a model directory.
pub const HEADER_FILE: &str = "header.json";
/// Data spec file name inside a model directory.
pub const DATA_SPEC_FILE: &str = "data_spec.json";
/// Tree file name inside a model directory.
pub const TREES_FILE: &str = "trees.bin";

/// Versioned header of a model directory.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct ModelHeader {
    /// Format version for compatibility checking.
    format_version: u32,
    /// Learning task.
    task: Task,
    /// Index of the label column in the data spec.
    label_column: usize,
    /// Number of trees in `trees.bin`.
    num_trees: usize,
}

fn write_file(path: PathBuf, bytes: &[u8]) -> Result<(), RfError> {
    std::fs::write(&path, bytes).map_err(|source| RfError::WriteModel { path, source })
}

fn read_file(path: &Path) -> Result<Vec<u8>, RfError> {
    std::fs::read(path).map_err(|source| RfError::ReadModel {
        path: path.to_path_buf(),
        source,
    })
}

impl Model {
    /// Save the model into directory `dir`, creating it if needed.
    ///
    /// Writes [`HEADER_FILE`], [`DATA_SPEC_FILE`] and [`TREES_FILE`]. The
    /// output is a pure function of the model, so equal models produce
    /// byte-identical directories.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfError::CreateModelDir`] | directory creation failed |
    /// | [`RfError::EncodeJson`] | header or data spec encoding failed |
    /// | [`RfError::SerializeModel`] | bincode encoding failed |
    /// | [`RfError::WriteModel`] | file write failed |
    #[instrument(skip_all, fields(dir = %dir.as_ref().display()))]
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<(), RfError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|source| RfError::CreateModelDir {
            path: dir.to_path_buf(),
            source,
        })?;

        let header = ModelHeader {
            format_version: FORMAT_VERSION,
            task: self.task,
            label_column: self.label_column,
            num_trees: self.trees.len(),
        };
        let header_bytes =
            serde_json::to_vec_pretty(&header).map_err(|source| RfError::EncodeJson { source })?;
        let spec_bytes = serde_json::to_vec_pretty(&self.data_spec)
            .map_err(|source| RfError::EncodeJson { source })?;
        let nodes: Vec<&Vec<Node>> = self.trees.iter().map(|t| &t.nodes).collect();
        let tree_bytes =
            bincode::serialize(&nodes).map_err(|source| RfError::SerializeModel { source })?;

        write_file(dir.join(HEADER_FILE), &header_bytes)?;
        write_file(dir.join(DATA_SPEC_FILE), &spec_bytes)?;
        write_file(dir.join(TREES_FILE), &tree_bytes)?;

        info!(
            size_bytes = tree_bytes.len(),
            num_trees = self.trees.len(),
            "model saved"
        );
        Ok(())
    }

    /// Load a model from directory `dir`.
    ///
    /// Checks the format version and every structural invariant of the
    /// trees before returning.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfError::ReadModel`] | a model file cannot be read |
    /// | [`RfError::DecodeJson`] | header or data spec is not valid JSON |
    /// | [`RfError::IncompatibleModelVersion`] | format version mismatch |
    /// | [`RfError::DecodeTrees`] | tree file is truncated or undecodable |
    /// | [`RfError::CorruptModel`] | a structural invariant is violated |
    #[instrument(skip_all, fields(dir = %dir.as_ref().display()))]
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, RfError> {
        let dir = dir.as_ref();

        let header_path = dir.join(HEADER_FILE);
        let header: ModelHeader = serde_json::from_slice(&read_file(&header_path)?).map_err(
            |source| RfError::DecodeJson {
                path: header_path.clone(),
                source,
            },
        )?;
        if header.format_version != FORMAT_VERSION {
            return Err(RfError::IncompatibleModelVersion {
                expected: FORMAT_VERSION,
                found: header.format_version,
                path: header_path,
            });
        }
        if header.num_trees == 0 {
            return Err(RfError::CorruptModel {
                path: header_path,
                reason: "model has no trees".to_string(),
            });
        }

        let spec_path = dir.join(DATA_SPEC_FILE);
        let data_spec: DataSpec = serde_json::from_slice(&read_file(&spec_path)?).map_err(
            |source| RfError::DecodeJson {
                path: spec_path.clone(),
                source,
            },
        )?;
        let n_classes = check_label(&data_spec, header.task, header.label_column)
            .map_err(|reason| RfError::CorruptModel {
                path: spec_path,
                reason,
            })?;

        let trees_path = dir.join(TREES_FILE);
        let nodes: Vec<Vec<Node>> = bincode::deserialize(&read_file(&trees_path)?).map_err(
            |source| RfError::DecodeTrees {
                path: trees_path.clone(),
                source,
            },
        )?;
        let corrupt = |reason: String| RfError::CorruptModel {
            path: trees_path.clone(),
            reason,
        };
        if nodes.len() != header.num_trees {
            return Err(corrupt(format!(
                "header declares {} trees, found {}",
                header.num_trees,
                nodes.len()
            )));
        }
        let layout = TreeLayout {
            spec: &data_spec,
            task: header.task,
            label_column: header.label_column,
            n_classes,
        };
        for (tree_index, tree) in nodes.iter().enumerate() {
            layout
                .check(tree)
                .map_err(|reason| corrupt(format!("tree {tree_index}: {reason}")))?;
        }

        debug!(
            num_trees = nodes.len(),
            n_columns = data_spec.n_columns(),
            task = %header.task,
            "model loaded"
        );

        Ok(Model {
            data_spec,
            task: header.task,
            label_column: header.label_column,
            trees: nodes.into_iter().map(DecisionTree::from_nodes).collect(),
        })
    }
}

/// Check the label column and return the number of label codes.
fn check_label(spec: &DataSpec, task: Task, label_column: usize) -> Result<usize, String> {
    let column = spec.column(label_column).ok_or_else(|| {
        format!(
            "label column {label_column} out of range for {} columns",
            spec.n_columns()
        )
    })?;
    if column.kind() != label_kind(task) {
        return Err(format!(
            "label column {:?} is {}, expected {} for {task}",
            column.name(),
            column.kind(),
            label_kind(task)
        ));
    }
    Ok(column.dictionary().map_or(0, |d| d.len()))
}

/// What a valid tree of a given model looks like.
struct TreeLayout<'a> {
    spec: &'a DataSpec,
    task: Task,
    label_column: usize,
    n_classes: usize,
}

impl TreeLayout<'_> {
    /// Check one pre-order node arena.
    fn check(&self, nodes: &[Node]) -> Result<(), String> {
        if nodes.is_empty() {
            return Err("tree is empty".to_string());
        }
        let len = nodes.len();
        let mut references = vec![0usize; len];
        references[0] = 1;

        for (i, node) in nodes.iter().enumerate() {
            match node {
                Node::Internal {
                    condition,
                    left,
                    right,
                    ..
                } => {
                    let (l, r) = (left.index(), right.index());
                    if l != i + 1 {
                        return Err(format!("node {i}: left child {l} does not follow its parent"));
                    }
                    if r <= l {
                        return Err(format!("node {i}: right child {r} is not after left child {l}"));
                    }
                    if r >= len {
                        return Err(format!("node {i}: child {r} out of range for {len} nodes"));
                    }
                    references[l] += 1;
                    references[r] += 1;

                    let column = condition.column.index();
                    let Some(spec) = self.spec.column(column) else {
                        return Err(format!("node {i}: split column {column} out of range"));
                    };
                    if column == self.label_column {
                        return Err(format!("node {i}: splits on the label column"));
                    }
                    match (&condition.test, spec.kind()) {
                        (Test::Threshold(t), ColumnKind::Numerical | ColumnKind::Boolean) => {
                            if t.is_nan() {
                                return Err(format!("node {i}: threshold is NaN"));
                            }
                        }
                        (Test::InSet(set), ColumnKind::Categorical) => {
                            let n_codes = spec.dictionary().map_or(0, |d| d.len());
                            if let Some(code) = set.max_code() {
                                if code as usize >= n_codes {
                                    return Err(format!(
                                        "node {i}: category code {code} out of range for {n_codes} codes"
                                    ));
                                }
                            }
                        }
                        (_, kind) => {
                            return Err(format!(
                                "node {i}: condition does not apply to {kind} column {column}"
                            ));
                        }
                    }
                }
                Node::Leaf { value, .. } => match (self.task, value) {
                    (Task::Classification, LeafValue::Classification { counts }) => {
                        if counts.len() != self.n_classes {
                            return Err(format!(
                                "node {i}: distribution has {} classes, expected {}",
                                counts.len(),
                                self.n_classes
                            ));
                        }
                    }
                    (Task::Regression, LeafValue::Regression { .. }) => {}
                    _ => return Err(format!("node {i}: leaf value does not match {}", self.task)),
                },
            }
        }

        if let Some((i, n)) = references.iter().enumerate().find(|&(_, &n)| n != 1) {
            return Err(format!("node {i} referenced {n} times"));
        }
        Ok(())
    }
}
