//! Domain types for model training: parameters, hyperparameter grid, the
//! persisted model bundle and the training report.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::common::error::{CoreError, CoreResult};
use crate::features::{encode, RecordView, Schema};

use super::forest::RandomForest;

/// Bumped whenever the bundle layout on disk changes.
pub const BUNDLE_FORMAT_VERSION: u32 = 1;

/// Metric maximised by the grid search.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scoring {
    #[default]
    F1,
    Accuracy,
}

/// One point of the hyperparameter grid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hyperparams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
}

impl std::fmt::Display for Hyperparams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.max_depth {
            Some(depth) => write!(
                f,
                "n_estimators={} max_depth={} min_samples_split={}",
                self.n_estimators, depth, self.min_samples_split
            ),
            None => write!(
                f,
                "n_estimators={} max_depth=none min_samples_split={}",
                self.n_estimators, self.min_samples_split
            ),
        }
    }
}

/// Candidate values per hyperparameter; the search covers their product.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HyperGrid {
    #[serde(default)]
    pub n_estimators: Vec<usize>,
    #[serde(default)]
    pub max_depth: Vec<Option<usize>>,
    #[serde(default)]
    pub min_samples_split: Vec<usize>,
}

impl Default for HyperGrid {
    fn default() -> Self {
        Self {
            n_estimators: vec![50, 100],
            max_depth: vec![Some(8), None],
            min_samples_split: vec![2, 10],
        }
    }
}

impl HyperGrid {
    /// Reject grids that cannot produce a usable configuration.
    pub fn validate(&self) -> CoreResult<()> {
        if self.n_estimators.is_empty()
            || self.max_depth.is_empty()
            || self.min_samples_split.is_empty()
        {
            return Err(CoreError::config(
                "hyperparameter grid is empty: every axis needs at least one value",
            ));
        }
        if self.n_estimators.contains(&0) {
            return Err(CoreError::config("n_estimators must be at least 1"));
        }
        if self.max_depth.contains(&Some(0)) {
            return Err(CoreError::config("max_depth must be at least 1 or null"));
        }
        if self.min_samples_split.iter().any(|&m| m < 2) {
            return Err(CoreError::config("min_samples_split must be at least 2"));
        }
        Ok(())
    }

    /// Cartesian product in declaration order: `n_estimators` varies
    /// slowest, `min_samples_split` fastest.
    pub fn combinations(&self) -> Vec<Hyperparams> {
        let mut out = Vec::with_capacity(
            self.n_estimators.len() * self.max_depth.len() * self.min_samples_split.len(),
        );
        for &n_estimators in &self.n_estimators {
            for &max_depth in &self.max_depth {
                for &min_samples_split in &self.min_samples_split {
                    out.push(Hyperparams {
                        n_estimators,
                        max_depth,
                        min_samples_split,
                    });
                }
            }
        }
        out
    }
}

/// Model section of the parameter file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    #[serde(default)]
    pub grid: HyperGrid,
}

/// Training parameters, read from a `params.yaml` style file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainParams {
    pub seed: u64,
    pub test_size: f64,
    pub small_run_rows: usize,
    pub target: String,
    /// Label value (compared case-insensitively, trimmed) mapped to class 1.
    pub positive_label: String,
    pub cv_folds: usize,
    pub scoring: Scoring,
    pub model: ModelParams,
}

impl Default for TrainParams {
    fn default() -> Self {
        Self {
            seed: 42,
            test_size: 0.2,
            small_run_rows: 5000,
            target: "y".to_string(),
            positive_label: "yes".to_string(),
            cv_folds: 3,
            scoring: Scoring::F1,
            model: ModelParams::default(),
        }
    }
}

impl TrainParams {
    /// Parse a parameter file; absent keys keep their defaults.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;
        serde_yaml::from_str(&raw).map_err(|e| {
            CoreError::config(format!("failed parsing params {}: {e}", path.display()))
        })
    }

    /// Configuration checks that must pass before any work starts.
    pub fn validate(&self) -> CoreResult<()> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(CoreError::config(format!(
                "test_size must be in (0, 1), got {}",
                self.test_size
            )));
        }
        if self.cv_folds < 2 {
            return Err(CoreError::config("cv_folds must be at least 2"));
        }
        if self.positive_label.trim().is_empty() {
            return Err(CoreError::config("positive_label must not be empty"));
        }
        self.model.grid.validate()
    }

    /// Map a raw label cell to 0/1. Absent labels are negative.
    pub fn label_of(&self, raw: Option<&str>) -> u8 {
        match raw {
            Some(value) if value.trim().eq_ignore_ascii_case(self.positive_label.trim()) => 1,
            _ => 0,
        }
    }
}

/// Fitted classifier together with the schema that defines its input.
/// Persisted and loaded as one unit.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelBundle {
    pub format_version: u32,
    pub schema: Schema,
    pub schema_fingerprint: String,
    pub params: Hyperparams,
    pub trained_at_ms: u64,
    pub model: RandomForest,
}

impl ModelBundle {
    pub fn new(
        schema: Schema,
        params: Hyperparams,
        model: RandomForest,
        trained_at_ms: u64,
    ) -> CoreResult<Self> {
        let schema_fingerprint = schema.fingerprint()?;
        let bundle = Self {
            format_version: BUNDLE_FORMAT_VERSION,
            schema,
            schema_fingerprint,
            params,
            trained_at_ms,
            model,
        };
        bundle.verify()?;
        Ok(bundle)
    }

    /// Integrity checks run on every load: format version, schema shape,
    /// fingerprint and model input width.
    pub fn verify(&self) -> CoreResult<()> {
        if self.format_version != BUNDLE_FORMAT_VERSION {
            return Err(CoreError::ArtifactCorrupt(format!(
                "bundle format version {} unsupported (expected {BUNDLE_FORMAT_VERSION})",
                self.format_version
            )));
        }
        self.schema.validate()?;
        self.model.validate()?;
        let actual = self.schema.fingerprint()?;
        if actual != self.schema_fingerprint {
            return Err(CoreError::ArtifactCorrupt(
                "schema fingerprint does not match bundle contents".to_string(),
            ));
        }
        if self.model.n_features() != self.schema.width() {
            return Err(CoreError::ArtifactCorrupt(format!(
                "model expects {} features, schema encodes {}",
                self.model.n_features(),
                self.schema.width()
            )));
        }
        Ok(())
    }

    /// Positive-class probability of one raw record.
    pub fn predict_proba<R: RecordView + ?Sized>(&self, record: &R) -> f64 {
        self.model.predict_proba(&encode(&self.schema, record))
    }
}

/// Report written next to the model after a training run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainReport {
    pub best_params: Hyperparams,
    pub scoring: Scoring,
    pub cv_score: f64,
    pub accuracy: f64,
    pub f1: f64,
    pub n_train: usize,
    pub n_test: usize,
}

/// Persistence contract for model bundles and their companion files.
pub trait ArtifactStore: Send + Sync {
    /// Write the schema file, the report and the bundle.
    fn save(&self, bundle: &ModelBundle, report: &TrainReport) -> CoreResult<()>;
    /// Read and verify the bundle together with its schema file.
    fn load(&self) -> CoreResult<ModelBundle>;
}
