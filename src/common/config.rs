//! Runtime configuration loaded from an optional YAML file and the environment.
//!
//! Precedence is defaults, then file, then environment. Training parameters
//! live in their own `params.yaml` (see [`crate::training::TrainParams`]).

use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::common::error::{CoreError, CoreResult};

/// Output format for the tracing subscriber.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Telemetry collector settings for the prediction service.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryCfg {
    /// Gate for all metric emission.
    pub publish: bool,
    pub namespace: String,
    /// Collector URL receiving JSON metric batches. `None` disables emission
    /// even when `publish` is set.
    pub endpoint: Option<String>,
    pub timeout_ms: u64,
    pub queue_capacity: usize,
}

impl Default for TelemetryCfg {
    fn default() -> Self {
        Self {
            publish: false,
            namespace: "MLOpsStarter".to_string(),
            endpoint: None,
            timeout_ms: 500,
            queue_capacity: 1024,
        }
    }
}

/// Snapshot of configuration values consumed by the core.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AppCfg {
    pub data_root: PathBuf,
    pub model_path: PathBuf,
    pub schema_path: PathBuf,
    pub metrics_path: PathBuf,
    pub eval_report_path: PathBuf,
    pub listen_addr: String,
    pub log_level: String,
    pub log_format: LogFormat,
    pub telemetry: TelemetryCfg,
}

impl Default for AppCfg {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("data"),
            model_path: PathBuf::from("artifacts/model.json"),
            schema_path: PathBuf::from("artifacts/feature_info.json"),
            metrics_path: PathBuf::from("artifacts/metrics.json"),
            eval_report_path: PathBuf::from("artifacts/eval_report.json"),
            listen_addr: "0.0.0.0:8080".to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            telemetry: TelemetryCfg::default(),
        }
    }
}

impl AppCfg {
    /// Build a configuration snapshot: defaults, then `path` (if any), then
    /// the process environment.
    pub fn load(path: Option<&Path>) -> CoreResult<Self> {
        let mut cfg = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        cfg.apply_env_overrides(|key| env::var(key).ok());
        Ok(cfg)
    }

    /// Parse a YAML configuration file; missing keys keep their defaults.
    pub fn from_file(path: &Path) -> CoreResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;
        serde_yaml::from_str(&raw).map_err(|e| {
            CoreError::config(format!("failed parsing config {}: {e}", path.display()))
        })
    }

    /// Directory holding staged tables and dataset metadata.
    pub fn staged_dir(&self) -> PathBuf {
        self.data_root.join("staged")
    }

    /// Default location of the staged training table.
    pub fn staged_table(&self) -> PathBuf {
        self.staged_dir().join("data.csv")
    }

    /// Apply overrides from a key lookup. The lookup is injected so tests do
    /// not have to mutate the process environment.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get("MLCORE_DATA_ROOT") {
            self.data_root = PathBuf::from(v);
        }
        if let Some(v) = get("MODEL_PATH") {
            self.model_path = PathBuf::from(v);
        }
        if let Some(v) = get("FEATURE_INFO_PATH") {
            self.schema_path = PathBuf::from(v);
        }
        if let Some(v) = get("METRICS_PATH") {
            self.metrics_path = PathBuf::from(v);
        }
        if let Some(v) = get("LISTEN_ADDR") {
            self.listen_addr = v;
        }
        if let Some(v) = get("MLCORE_LOG_LEVEL") {
            self.log_level = v;
        }
        if let Some(v) = get("MLCORE_LOG_FORMAT") {
            if v.eq_ignore_ascii_case("json") {
                self.log_format = LogFormat::Json;
            } else if v.eq_ignore_ascii_case("text") {
                self.log_format = LogFormat::Text;
            }
        }
        if let Some(v) = get("PUBLISH_CW") {
            self.telemetry.publish = parse_flag(&v);
        }
        if let Some(v) = get("METRICS_NAMESPACE") {
            self.telemetry.namespace = v;
        }
        if let Some(v) = get("METRICS_ENDPOINT") {
            self.telemetry.endpoint = Some(v);
        }
        if let Some(v) = get("METRICS_TIMEOUT_MS") {
            if let Ok(parsed) = v.parse::<u64>() {
                self.telemetry.timeout_ms = parsed;
            }
        }
    }
}

/// `1`, `true`, `yes` and `on` enable a flag; anything else disables it.
pub fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_match_artifact_layout() {
        let cfg = AppCfg::default();
        assert_eq!(cfg.model_path, PathBuf::from("artifacts/model.json"));
        assert_eq!(cfg.schema_path, PathBuf::from("artifacts/feature_info.json"));
        assert!(!cfg.telemetry.publish);
        assert_eq!(cfg.staged_table(), PathBuf::from("data/staged/data.csv"));
    }

    #[test]
    fn file_values_override_defaults() {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(
            br#"
model_path: "/srv/model.json"
log_format: json
telemetry:
  publish: true
  endpoint: "http://collector:4318/metrics"
"#,
        )
        .unwrap();

        let cfg = AppCfg::from_file(f.path()).unwrap();
        assert_eq!(cfg.model_path, PathBuf::from("/srv/model.json"));
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert!(cfg.telemetry.publish);
        assert_eq!(cfg.telemetry.namespace, "MLOpsStarter");
        assert_eq!(cfg.listen_addr, "0.0.0.0:8080");
    }

    #[test]
    fn malformed_file_is_config_error() {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(b"telemetry: [not, a, map").unwrap();
        let err = AppCfg::from_file(f.path()).unwrap_err();
        assert_eq!(err.code(), crate::common::error::CoreCode::Config);
    }

    #[test]
    fn env_overrides_win() {
        let vars: HashMap<&str, &str> = [
            ("MODEL_PATH", "/m/model.json"),
            ("PUBLISH_CW", "1"),
            ("METRICS_NAMESPACE", "Bank"),
            ("METRICS_TIMEOUT_MS", "not-a-number"),
            ("LISTEN_ADDR", "   "),
        ]
        .into_iter()
        .collect();

        let mut cfg = AppCfg::default();
        cfg.apply_env_overrides(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.model_path, PathBuf::from("/m/model.json"));
        assert!(cfg.telemetry.publish);
        assert_eq!(cfg.telemetry.namespace, "Bank");
        assert_eq!(cfg.telemetry.timeout_ms, 500);
        assert_eq!(cfg.listen_addr, "0.0.0.0:8080");
    }

    #[test]
    fn flags_parse_loosely() {
        assert!(parse_flag("1"));
        assert!(parse_flag("TRUE"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("nope"));
    }
}
