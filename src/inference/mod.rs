//! Online serving: lazily loaded model context and best-effort metrics.

pub mod domain;
pub mod service;
pub mod workers;

pub use domain::{HealthStatus, PredictRequest, PredictionResult};
pub use service::AppContext;
pub use workers::MetricsSink;
