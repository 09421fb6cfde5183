//! Filesystem-backed repository for dataset metadata.

use std::fs;
use std::path::{Path, PathBuf};

use crate::common::error::{CoreError, CoreResult};

use super::domain::{DataRepo, Dataset, DatasetId};

/// Filesystem repository rooted at `<data_root>/datasets`.
pub struct FsDataRepo {
    root: PathBuf,
}

impl FsDataRepo {
    pub fn new(data_root: &Path) -> Self {
        Self {
            root: data_root.join("datasets"),
        }
    }

    fn metadata_path(&self, id: &DatasetId) -> PathBuf {
        self.root.join(format!("{}.json", id.as_str()))
    }
}

impl DataRepo for FsDataRepo {
    fn put_dataset(&self, dataset: &Dataset) -> CoreResult<()> {
        fs::create_dir_all(&self.root).map_err(|e| CoreError::io(&self.root, e))?;
        let path = self.metadata_path(&dataset.id);
        let body = serde_json::to_vec_pretty(dataset)?;
        fs::write(&path, body).map_err(|e| CoreError::io(&path, e))
    }

    fn get_dataset(&self, id: &DatasetId) -> CoreResult<Dataset> {
        let path = self.metadata_path(id);
        if !path.exists() {
            return Err(CoreError::invalid(format!("unknown dataset {id}")));
        }
        let raw = fs::read(&path).map_err(|e| CoreError::io(&path, e))?;
        Ok(serde_json::from_slice(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_dataset_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FsDataRepo::new(dir.path());
        let err = repo.get_dataset(&DatasetId::new("ds-missing")).unwrap_err();
        assert_eq!(err.code(), crate::common::error::CoreCode::InvalidInput);
    }
}
