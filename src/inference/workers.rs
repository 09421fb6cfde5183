//! Background worker that ships prediction metrics to a telemetry collector.
//!
//! Handlers hand batches to a bounded channel and return immediately; one
//! task drains the channel and POSTs each batch with a per-request timeout.
//! A full channel drops the batch. Collector failures are logged and never
//! reach the request path.
//!
//! TODO: Coalesce queued batches into one POST when the collector falls behind.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use crate::common::config::TelemetryCfg;
use crate::common::error::{CoreError, CoreResult};

use super::domain::MetricDatum;

#[derive(Serialize)]
struct MetricBatch<'a> {
    namespace: &'a str,
    metric_data: &'a [MetricDatum],
}

/// Cloneable handle for emitting metric batches.
#[derive(Clone, Debug)]
pub struct MetricsSink {
    tx: Option<mpsc::Sender<Vec<MetricDatum>>>,
}

impl MetricsSink {
    /// Sink that discards everything.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Start the worker when publishing is enabled and an endpoint is set;
    /// otherwise return a disabled sink. Must run inside a tokio runtime.
    pub fn spawn(cfg: &TelemetryCfg) -> CoreResult<Self> {
        let endpoint = match (cfg.publish, cfg.endpoint.as_deref()) {
            (true, Some(endpoint)) if !endpoint.is_empty() => endpoint.to_string(),
            (true, _) => {
                warn!("metric publishing enabled without an endpoint; metrics disabled");
                return Ok(Self::disabled());
            }
            (false, _) => return Ok(Self::disabled()),
        };

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(cfg.timeout_ms))
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(|e| CoreError::config(format!("metrics client: {e}")))?;
        let (tx, rx) = mpsc::channel(cfg.queue_capacity.max(1));
        let namespace = cfg.namespace.clone();

        info!(endpoint = %endpoint, namespace = %namespace, "metrics worker started");
        tokio::spawn(run_worker(client, endpoint, namespace, rx));
        Ok(Self { tx: Some(tx) })
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Queue a batch without waiting.
    pub fn emit(&self, batch: Vec<MetricDatum>) {
        let Some(tx) = &self.tx else {
            return;
        };
        match tx.try_send(batch) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => debug!("metrics queue full; batch dropped"),
            Err(TrySendError::Closed(_)) => debug!("metrics worker gone; batch dropped"),
        }
    }
}

async fn run_worker(
    client: reqwest::Client,
    endpoint: String,
    namespace: String,
    mut rx: mpsc::Receiver<Vec<MetricDatum>>,
) {
    while let Some(batch) = rx.recv().await {
        let body = MetricBatch {
            namespace: &namespace,
            metric_data: &batch,
        };
        match client.post(&endpoint).json(&body).send().await {
            Ok(resp) if resp.status().is_success() => {
                debug!(points = batch.len(), "metrics published");
            }
            Ok(resp) => warn!(status = %resp.status(), "metrics collector rejected batch"),
            Err(e) => warn!(error = %e, "metrics publish failed"),
        }
    }
    debug!("metrics worker stopped");
}
