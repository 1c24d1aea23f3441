//! End-to-end CSV pipelines: schema inference, encoding, then training or prediction.

use std::path::Path;

use canopy_io::{ColumnEncoder, InferenceOptions, SchemaInference, read_header};
use tracing::{info, instrument};

use crate::config::TrainingConfig;
use crate::error::RfError;
use crate::forest::{Model, label_kind};
use crate::predict::Prediction;
use crate::result::TrainingResult;

/// Resolve `label_name` to its position in `header`.
///
/// # Errors
///
/// Returns [`RfError::UnknownLabelColumn`] when the header has no such column.
pub fn label_index(header: &[String], label_name: &str) -> Result<usize, RfError> {
    header
        .iter()
        .position(|name| name == label_name)
        .ok_or_else(|| RfError::UnknownLabelColumn {
            name: label_name.to_string(),
        })
}

/// Train a forest on the CSV file at `path`, predicting column `label_name`.
///
/// Only the header is read before the label is resolved and the
/// data-independent parameters are checked. The label kind is then forced
/// to suit the task (categorical for classification, numerical for
/// regression) and the rest of the schema is inferred. The label column of
/// `config` is overridden by the resolved position.
///
/// # Errors
///
/// | Variant | When |
/// |---|---|
/// | [`RfError::Schema`] | the file cannot be read or its schema inferred |
/// | [`RfError::UnknownLabelColumn`] | `label_name` is not in the header |
/// | [`RfError::Encoding`] | a row cannot be encoded |
/// | any of [`TrainingConfig::fit`] | invalid parameters or training failure |
#[instrument(skip_all, fields(path = %path.display(), label = label_name))]
pub fn train_csv(
    path: &Path,
    label_name: &str,
    config: &TrainingConfig,
    inference: &InferenceOptions,
) -> Result<TrainingResult, RfError> {
    let header = read_header(path)?;
    let label_column = label_index(&header, label_name)?;
    config.validate()?;

    let options = inference
        .clone()
        .with_column_kind(label_name, label_kind(config.task()));
    let spec = SchemaInference::new(options).infer(path)?;
    let dataset = ColumnEncoder::new(&spec).encode(path)?;
    info!(
        n_rows = dataset.n_rows(),
        n_columns = dataset.n_columns(),
        label = label_name,
        "training data ready"
    );

    config.clone().with_label_column(label_column).fit(&dataset)
}

/// Predict every row of the CSV file at `path` with `model`.
///
/// The file must carry the model's columns in order, the label column
/// included; its values are ignored and may be empty.
///
/// # Errors
///
/// | Variant | When |
/// |---|---|
/// | [`RfError::Encoding`] | header differs from the model's columns or a row cannot be encoded |
#[instrument(skip_all, fields(path = %path.display()))]
pub fn predict_csv(model: &Model, path: &Path) -> Result<Vec<Prediction>, RfError> {
    let dataset = ColumnEncoder::new(model.data_spec()).encode(path)?;
    model.predict_dataset(&dataset)
}
