//! Held-out evaluation: confusion metrics, classification report, ROC AUC.

pub mod domain;
pub mod service;

pub use domain::{BinaryMetrics, ClassificationReport, EvalReport};
