//! Prediction context: one-time bundle load, per-record scoring and metric
//! emission.

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::common::error::{CoreError, CoreResult};
use crate::common::time::Stopwatch;
use crate::training::domain::{ArtifactStore, ModelBundle};

use super::domain::{HealthStatus, MetricDatum, MetricUnit, PredictionResult};
use super::workers::MetricsSink;

pub const LATENCY_METRIC: &str = "inference_latency_ms";
pub const PREDICTIONS_METRIC: &str = "predictions";

/// Shared state of the serving process. The bundle is loaded at most once
/// and is read-only afterwards.
pub struct AppContext {
    store: Arc<dyn ArtifactStore>,
    bundle: OnceCell<Arc<ModelBundle>>,
    metrics: MetricsSink,
}

impl AppContext {
    pub fn new(store: Arc<dyn ArtifactStore>, metrics: MetricsSink) -> Self {
        Self {
            store,
            bundle: OnceCell::new(),
            metrics,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.bundle.initialized()
    }

    /// Return the loaded bundle, loading it on first use. Concurrent first
    /// callers wait for a single load; a failed load leaves the context
    /// unloaded so the next call tries again.
    pub async fn ensure_loaded(&self) -> CoreResult<Arc<ModelBundle>> {
        self.bundle
            .get_or_try_init(|| async {
                let store = Arc::clone(&self.store);
                let bundle = tokio::task::spawn_blocking(move || store.load())
                    .await
                    .map_err(|e| CoreError::internal(format!("artifact load task failed: {e}")))?
                    .map_err(|e| {
                        warn!(code = e.code().as_str(), error = %e, "model load failed");
                        e
                    })?;
                Ok::<_, CoreError>(Arc::new(bundle))
            })
            .await
            .map(Arc::clone)
    }

    pub async fn health(&self) -> HealthStatus {
        match self.ensure_loaded().await {
            Ok(_) => HealthStatus::Ok,
            Err(e) => HealthStatus::Error {
                detail: e.to_string(),
            },
        }
    }

    /// Score one raw record. Only an unavailable bundle fails; every field
    /// problem falls back to the encoder defaults.
    pub async fn predict(&self, record: &Map<String, Value>) -> CoreResult<PredictionResult> {
        let bundle = self.ensure_loaded().await?;

        let watch = Stopwatch::start();
        let probability = bundle.predict_proba(record);
        let latency_ms = watch.elapsed_ms();

        let result = PredictionResult {
            prediction: u8::from(probability >= 0.5),
            probability,
            latency_ms,
        };
        debug!(
            prediction = result.prediction,
            probability,
            latency_ms,
            fields = record.len(),
            "scored record"
        );
        self.metrics.emit(vec![
            MetricDatum::new(LATENCY_METRIC, latency_ms, MetricUnit::Milliseconds),
            MetricDatum::new(PREDICTIONS_METRIC, 1.0, MetricUnit::Count),
        ]);
        Ok(result)
    }
}
