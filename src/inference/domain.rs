//! Wire types of the prediction service.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body of a predict call: one raw record under `data`.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct PredictRequest {
    pub data: Map<String, Value>,
}

/// Scored record returned to the caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// `1` when `probability >= 0.5`.
    pub prediction: u8,
    pub probability: f64,
    /// Wall-clock time of encode plus score.
    pub latency_ms: f64,
}

impl PredictionResult {
    pub fn decision(&self) -> bool {
        self.prediction == 1
    }
}

/// Outcome of a health probe.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Error { detail: String },
}

impl HealthStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, HealthStatus::Ok)
    }
}

/// Unit attached to an emitted measurement.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum MetricUnit {
    Milliseconds,
    Count,
}

/// One named measurement pushed to the telemetry collector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricDatum {
    pub metric_name: String,
    pub value: f64,
    pub unit: MetricUnit,
}

impl MetricDatum {
    pub fn new(metric_name: impl Into<String>, value: f64, unit: MetricUnit) -> Self {
        Self {
            metric_name: metric_name.into(),
            value,
            unit,
        }
    }
}
