//! Structured logging setup.
//!
//! `RUST_LOG` takes precedence over the configured level. The JSON format
//! emits one object per line for log shippers.

use tracing_subscriber::EnvFilter;

use crate::common::config::LogFormat;

/// Install the global tracing subscriber. Calling it twice is harmless; the
/// second call is ignored.
pub fn init_tracing(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let result = match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(false)
            .try_init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
    };

    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
