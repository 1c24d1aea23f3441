//! Random forest training and prediction over encoded CSV data.
//!
//! Provides CART decision trees for classification (Gini impurity) and
//! regression (variance), bagged with bootstrap sampling and trained in
//! parallel via rayon. Also covers out-of-bag evaluation, a deterministic
//! seed-per-tree scheme, and a versioned on-disk model format.

mod config;
mod confusion;
mod error;
mod forest;
mod node;
mod oob;
mod pipeline;
mod predict;
mod result;
mod sampler;
mod serialize;
mod split;
#[cfg(test)]
mod test_util;
mod tree;

pub use config::{MAX_BOOTSTRAP_RATIO, OobMode, Task, TrainingConfig};
pub use confusion::{ClassMetrics, ConfusionMatrix};
pub use error::{ErrorCategory, RfError};
pub use forest::Model;
pub use node::{CategorySet, ColumnIndex, Impurity, LeafValue, Node, NodeIndex, SplitCondition, Test};
pub use oob::OobEvaluation;
pub use pipeline::{label_index, predict_csv, train_csv};
pub use predict::Prediction;
pub use result::{TrainingMetadata, TrainingResult};
pub use serialize::{DATA_SPEC_FILE, FORMAT_VERSION, HEADER_FILE, TREES_FILE};
pub use tree::DecisionTree;
