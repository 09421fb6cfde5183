//! Data domain: staging, loading and validation of tabular datasets.

pub mod domain;
pub mod repo_fs;
pub mod service;

pub use domain::{ColumnKind, DataRepo, Dataset, DatasetId, RowView, Table, ValidationReport};
pub use repo_fs::FsDataRepo;
