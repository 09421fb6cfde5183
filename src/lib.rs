//! Tabular binary classification: staging, schema-bound feature encoding,
//! grid-searched random forest training, evaluation and HTTP serving.

pub mod api;
pub mod common;
pub mod data;
pub mod evaluation;
pub mod features;
pub mod inference;
pub mod training;

pub use common::{AppCfg, CoreCode, CoreError, CoreResult};
pub use features::Schema;
pub use training::{ModelBundle, TrainParams};
