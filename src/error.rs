//! Error taxonomy for indexing, change detection and persistence.
//!
//! Only provider, detection and commit-validation failures abort a run.
//! Per-file read problems during scanning are recorded as skipped files instead.
use std::path::PathBuf;

use thiserror::Error;

use crate::provider::ProviderError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("source directory not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("no index found for source '{name}' in {}", .dir.display())]
    IndexNotFound { dir: PathBuf, name: String },

    #[error(
        "failed to get embedding for chunk {chunk_index} (size: {bytes} bytes, ~{} tokens): {source}",
        .bytes / 4
    )]
    Provider {
        chunk_index: usize,
        bytes: usize,
        #[source]
        source: ProviderError,
    },

    #[error("change detection failed: {0}")]
    Detection(#[from] DetectionError),

    #[error("validation failed for {}: {reason}", .path.display())]
    Validation { path: PathBuf, reason: String },

    #[error("persistence failed for {}: {source}", .path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("index file {} is corrupt: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("file watcher failed: {0}")]
    Watch(#[from] notify::Error),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl Error {
    pub(crate) fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }

    /// Whether the caller should fall back to a full re-index.
    #[must_use]
    pub fn is_detection(&self) -> bool {
        matches!(self, Self::Detection(_))
    }
}

/// Reasons the recorded index state cannot be diffed against the source tree.
#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("no last commit recorded - full re-index required")]
    NoRecordedCommit,

    #[error("{} is not a git repository", .0.display())]
    NotGitRepository(PathBuf),

    #[error("recorded commit {commit} is not reachable from HEAD (history rewritten?)")]
    UnreachableCommit { commit: String },

    #[error("`git {command}` failed: {stderr}")]
    Git { command: String, stderr: String },

    #[error("failed to walk {}: {message}", .root.display())]
    Walk { root: PathBuf, message: String },

    #[error("index was built with embedding model '{recorded}', current model is '{current}'")]
    ModelChanged { recorded: String, current: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_reports_size_context() {
        let err = Error::Provider {
            chunk_index: 7,
            bytes: 4000,
            source: ProviderError::RequestFailed("timeout".to_string()),
        };
        let msg = err.to_string();
        assert!(msg.contains("chunk 7"), "{msg}");
        assert!(msg.contains("4000 bytes"), "{msg}");
        assert!(msg.contains("~1000 tokens"), "{msg}");
        assert!(msg.contains("timeout"), "{msg}");
    }

    #[test]
    fn test_detection_errors_are_flagged_for_fallback() {
        let err: Error = DetectionError::UnreachableCommit {
            commit: "deadbeef".to_string(),
        }
        .into();
        assert!(err.is_detection());
        assert!(!Error::SourceNotFound(PathBuf::from("x")).is_detection());
    }
}
