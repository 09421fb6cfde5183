//! Model training: parameters, the forest learner, grid search and the
//! artefact store.

pub mod domain;
pub mod forest;
pub mod repo_fs;
pub mod search;
pub mod service;
pub mod split;

pub use domain::{
    ArtifactStore, HyperGrid, Hyperparams, ModelBundle, Scoring, TrainParams, TrainReport,
};
pub use forest::RandomForest;
pub use repo_fs::FsArtifactStore;
pub use service::{train, TrainOutcome};
