//! Filesystem artefact store for model bundles, schema and report files.
//!
//! TODO: fsync temp files and the parent directory before renaming.
//! TODO: Keep the previous bundle on save so a bad run can be rolled back.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::common::config::AppCfg;
use crate::common::error::{CoreError, CoreResult};
use crate::features::Schema;

use super::domain::{ArtifactStore, ModelBundle, TrainReport};

/// Write `value` as pretty JSON through a sibling temp file and a rename,
/// creating parent directories as needed.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> CoreResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| CoreError::io(parent, e))?;
    }
    let body = serde_json::to_vec_pretty(value)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, body).map_err(|e| CoreError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| CoreError::io(path, e))?;
    debug!(path = %path.display(), "wrote json artefact");
    Ok(())
}

fn read_artifact<T: DeserializeOwned>(path: &Path, what: &str) -> CoreResult<T> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(CoreError::ArtifactMissing(format!(
                "{what} not found at {}",
                path.display()
            )))
        }
        Err(e) => return Err(CoreError::io(path, e)),
    };
    serde_json::from_slice(&raw).map_err(|e| {
        CoreError::ArtifactCorrupt(format!("{what} at {} is unreadable: {e}", path.display()))
    })
}

/// Artefact store backed by three files: bundle, schema and training report.
#[derive(Clone, Debug)]
pub struct FsArtifactStore {
    model_path: PathBuf,
    schema_path: PathBuf,
    metrics_path: PathBuf,
}

impl FsArtifactStore {
    pub fn new(cfg: &AppCfg) -> Self {
        Self::with_paths(&cfg.model_path, &cfg.schema_path, &cfg.metrics_path)
    }

    pub fn with_paths(model_path: &Path, schema_path: &Path, metrics_path: &Path) -> Self {
        Self {
            model_path: model_path.to_path_buf(),
            schema_path: schema_path.to_path_buf(),
            metrics_path: metrics_path.to_path_buf(),
        }
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn schema_path(&self) -> &Path {
        &self.schema_path
    }

    pub fn metrics_path(&self) -> &Path {
        &self.metrics_path
    }
}

impl ArtifactStore for FsArtifactStore {
    fn save(&self, bundle: &ModelBundle, report: &TrainReport) -> CoreResult<()> {
        bundle.verify()?;
        // The bundle goes last: its presence marks a complete run.
        write_json(&self.schema_path, &bundle.schema)?;
        write_json(&self.metrics_path, report)?;
        write_json(&self.model_path, bundle)?;
        info!(
            model = %self.model_path.display(),
            schema = %self.schema_path.display(),
            metrics = %self.metrics_path.display(),
            "saved model artefacts"
        );
        Ok(())
    }

    fn load(&self) -> CoreResult<ModelBundle> {
        let bundle: ModelBundle = read_artifact(&self.model_path, "model bundle")?;
        bundle.verify()?;

        let schema: Schema = read_artifact(&self.schema_path, "schema file")?;
        schema.validate()?;
        if schema.fingerprint()? != bundle.schema_fingerprint {
            return Err(CoreError::ArtifactCorrupt(format!(
                "schema file {} does not match the model bundle",
                self.schema_path.display()
            )));
        }
        info!(
            model = %self.model_path.display(),
            trees = bundle.model.trees().len(),
            width = bundle.schema.width(),
            "loaded model bundle"
        );
        Ok(bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::error::CoreCode;
    use crate::data::domain::Table;
    use crate::training::domain::{Hyperparams, Scoring};
    use crate::training::forest::RandomForest;

    fn store(dir: &Path) -> FsArtifactStore {
        FsArtifactStore::with_paths(
            &dir.join("out/model.json"),
            &dir.join("out/feature_info.json"),
            &dir.join("out/metrics.json"),
        )
    }

    fn bundle() -> (ModelBundle, TrainReport) {
        let table = Table::new(
            vec!["color".into(), "size".into(), "y".into()],
            vec![
                vec!["red".into(), "1".into(), "yes".into()],
                vec!["blue".into(), "2".into(), "no".into()],
                vec!["red".into(), "3".into(), "yes".into()],
                vec!["blue".into(), "4".into(), "no".into()],
            ],
        )
        .unwrap();
        let schema = Schema::extract(&table, "y").unwrap();
        let x = crate::features::encode_table(&schema, &table);
        let y = vec![1, 0, 1, 0];
        let params = Hyperparams {
            n_estimators: 3,
            max_depth: None,
            min_samples_split: 2,
        };
        let forest = RandomForest::fit(&x, &y, &[0, 1, 2, 3], &params, 1).unwrap();
        let report = TrainReport {
            best_params: params.clone(),
            scoring: Scoring::F1,
            cv_score: 1.0,
            accuracy: 1.0,
            f1: 1.0,
            n_train: 4,
            n_test: 0,
        };
        (ModelBundle::new(schema, params, forest, 0).unwrap(), report)
    }

    #[test]
    fn save_then_load_returns_the_same_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let (bundle, report) = bundle();
        store.save(&bundle, &report).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.schema, bundle.schema);
        assert_eq!(loaded.model, bundle.model);
        assert!(store.metrics_path().exists());
    }

    #[test]
    fn missing_model_is_reported_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = store(dir.path()).load().unwrap_err();
        assert_eq!(err.code(), CoreCode::ArtifactMissing);
    }

    #[test]
    fn garbage_model_is_reported_as_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        fs::create_dir_all(dir.path().join("out")).unwrap();
        fs::write(store.model_path(), b"{not json").unwrap();
        let err = store.load().unwrap_err();
        assert_eq!(err.code(), CoreCode::ArtifactCorrupt);
    }

    #[test]
    fn mismatched_schema_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let (bundle, report) = bundle();
        store.save(&bundle, &report).unwrap();

        let mut other = bundle.schema.clone();
        other.numeric_columns.push("extra".to_string());
        write_json(store.schema_path(), &other).unwrap();

        let err = store.load().unwrap_err();
        assert_eq!(err.code(), CoreCode::ArtifactCorrupt);
    }
}
