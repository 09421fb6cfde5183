//! Error handling primitives shared across the core.
//!
//! Every failure carries a stable [`CoreCode`] so the HTTP layer and the
//! CLI can report a category without matching on message text.

use thiserror::Error;

/// Stable error codes surfaced to callers (HTTP bodies, process exit codes).
#[repr(u32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CoreCode {
    /// Success code used as a sentinel.
    Ok = 0,
    /// Input failed validation.
    InvalidInput = 1,
    /// Training or serving configuration is unusable.
    Config = 2,
    /// Requested model artefact was not available.
    ArtifactMissing = 3,
    /// Model artefact exists but cannot be decoded or fails its integrity check.
    ArtifactCorrupt = 4,
    /// Filesystem failure outside the artefact paths.
    Io = 5,
    /// Catch-all for bugs.
    Internal = 6,
}

impl CoreCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoreCode::Ok => "ok",
            CoreCode::InvalidInput => "invalid_input",
            CoreCode::Config => "config",
            CoreCode::ArtifactMissing => "artifact_missing",
            CoreCode::ArtifactCorrupt => "artifact_corrupt",
            CoreCode::Io => "io",
            CoreCode::Internal => "internal",
        }
    }
}

/// Canonical error type for the core.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("artifact missing: {0}")]
    ArtifactMissing(String),

    #[error("artifact corrupt: {0}")]
    ArtifactCorrupt(String),

    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result alias used throughout the crate.
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Validation helper.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Configuration helper.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Internal error helper.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Wrap an IO failure together with the path that caused it.
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    /// Machine parsable code for this error.
    pub fn code(&self) -> CoreCode {
        match self {
            CoreError::InvalidInput(_) => CoreCode::InvalidInput,
            CoreError::Config(_) => CoreCode::Config,
            CoreError::ArtifactMissing(_) => CoreCode::ArtifactMissing,
            CoreError::ArtifactCorrupt(_) => CoreCode::ArtifactCorrupt,
            CoreError::Io { .. } => CoreCode::Io,
            CoreError::Serialization(_) => CoreCode::Internal,
            CoreError::Internal(_) => CoreCode::Internal,
        }
    }
}
