//! CSV schema inference and columnar encoding.
//!
//! Turns raw textual CSV into a typed [`DataSpec`] and a column-major
//! [`Dataset`] ready for tree training.

mod dataset;
mod encoder;
mod error;
mod inference;
mod source;
mod spec;

pub use dataset::{ColumnData, Dataset, DatasetRow, Example, Value};
pub use encoder::{ColumnEncoder, RowEncoder};
pub use error::{EncodingError, SchemaError};
pub use inference::{InferenceOptions, SchemaInference};
pub use source::read_header;
pub use spec::{
    BooleanStats, ColumnKind, ColumnSpec, ColumnStats, DataSpec, Dictionary, DictionaryItem,
    NumericalStats, OOV_CODE, OOV_ITEM,
};
