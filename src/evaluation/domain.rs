//! Metric structures for held-out evaluation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Confusion-matrix-derived metrics for the positive class.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BinaryMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub tp: usize,
    pub fp: usize,
    pub tn: usize,
    #[serde(rename = "fn")]
    pub fn_count: usize,
}

impl std::fmt::Display for BinaryMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "acc={:.4} prec={:.4} rec={:.4} f1={:.4} (tp={} fp={} tn={} fn={})",
            self.accuracy,
            self.precision,
            self.recall,
            self.f1,
            self.tp,
            self.fp,
            self.tn,
            self.fn_count,
        )
    }
}

/// Precision/recall/F1/support of one class or one average.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassScores {
    pub precision: f64,
    pub recall: f64,
    #[serde(rename = "f1-score")]
    pub f1: f64,
    pub support: usize,
}

/// Per-class breakdown plus accuracy and the macro/weighted averages.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    /// Keyed by class label (`"0"`, `"1"`).
    pub classes: BTreeMap<String, ClassScores>,
    pub accuracy: f64,
    pub macro_avg: ClassScores,
    pub weighted_avg: ClassScores,
}

/// Evaluation card written after scoring the held-out split.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvalReport {
    pub classification_report: ClassificationReport,
    /// `None` when only one class is present in the held-out labels.
    pub roc_auc: Option<f64>,
    pub n_test: usize,
}
