//! Change detection: what changed in the source tree since the index was built.
//!
//! Two strategies produce the same `ChangeSet`: a git diff from the recorded
//! commit when one exists and the source is a checkout, or an mtime scan
//! against the recorded timestamp otherwise.
pub mod git;
pub mod mtime;

use std::fmt;
use std::path::Path;

use crate::error::DetectionError;
use crate::store::StoreMetadata;

/// Added, modified and deleted paths, relative to the source root.
///
/// Recomputed on every run; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub deleted: Vec<String>,
}

impl ChangeSet {
    #[must_use]
    pub fn has_changes(&self) -> bool {
        !(self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty())
    }

    /// Files whose fresh content must be loaded: added ∪ modified.
    #[must_use]
    pub fn changed_files(&self) -> Vec<String> {
        let mut files: Vec<String> = self.added.iter().chain(&self.modified).cloned().collect();
        files.sort();
        files.dedup();
        files
    }

    /// Files whose stored chunks must go: modified ∪ deleted.
    #[must_use]
    pub fn removed_files(&self) -> Vec<String> {
        let mut files: Vec<String> = self.modified.iter().chain(&self.deleted).cloned().collect();
        files.sort();
        files.dedup();
        files
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.added.len() + self.modified.len() + self.deleted.len()
    }

    pub(crate) fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.added.retain(|p| keep(p));
        self.modified.retain(|p| keep(p));
        self.deleted.retain(|p| keep(p));
    }

    /// Sort and dedup each list.
    pub(crate) fn normalize(&mut self) {
        for list in [&mut self.added, &mut self.modified, &mut self.deleted] {
            list.sort();
            list.dedup();
        }
    }
}

impl fmt::Display for ChangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} added, {} modified, {} deleted",
            self.added.len(),
            self.modified.len(),
            self.deleted.len()
        )
    }
}

/// Which strategy produced a `ChangeSet`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionMethod {
    Git,
    Mtime,
}

/// Pick a strategy from the recorded state and run it.
pub fn detect_changes(
    root: &Path,
    metadata: &StoreMetadata,
    index_path: &Path,
    extensions: &[String],
) -> Result<(ChangeSet, DetectionMethod), DetectionError> {
    let commit = metadata.last_commit.as_deref().filter(|c| !c.trim().is_empty());

    match commit {
        Some(commit) if git::is_git_repo(root) => {
            let changes = git::detect_git_changes(root, Some(commit), extensions)?;
            Ok((changes, DetectionMethod::Git))
        }
        _ => {
            let since = mtime::reference_time(metadata, index_path);
            let changes = mtime::detect_mtime_changes(
                root,
                &metadata.indexed_files,
                &metadata.skipped_files,
                since,
                extensions,
            )?;
            Ok((changes, DetectionMethod::Mtime))
        }
    }
}
