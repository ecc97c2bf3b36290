//! Mtime-based change detection against the recorded index timestamp.
use std::collections::HashSet;
use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::ChangeSet;
use crate::error::DetectionError;
use crate::indexer::loader::{has_allowed_extension, walk_source_files};
use crate::models::SkippedFile;
use crate::paths;
use crate::store::StoreMetadata;

/// Compare the tree under `root` with `indexed_files` as of `since`.
///
/// Walked and unrecorded ⇒ added; recorded and touched after `since` ⇒
/// modified; recorded but no longer walked ⇒ deleted. A file the loader
/// skipped last time is only added again once it is touched after `since`.
pub fn detect_mtime_changes(
    root: &Path,
    indexed_files: &[String],
    skipped_files: &[SkippedFile],
    since: SystemTime,
    extensions: &[String],
) -> Result<ChangeSet, DetectionError> {
    if !root.is_dir() {
        return Err(DetectionError::Walk {
            root: root.to_path_buf(),
            message: "not a directory".to_string(),
        });
    }

    let recorded: HashSet<&str> = indexed_files.iter().map(String::as_str).collect();
    let skipped: HashSet<&str> = skipped_files.iter().map(|s| s.path.as_str()).collect();
    let mut seen: HashSet<String> = HashSet::new();
    let mut changes = ChangeSet::default();

    for file in walk_source_files(root) {
        if !has_allowed_extension(&file.rel_path, extensions) {
            continue;
        }

        let touched = file.modified.is_some_and(|m| m > since);
        let path = file.rel_path.as_str();
        if !recorded.contains(path) {
            if touched || !skipped.contains(path) {
                changes.added.push(file.rel_path.clone());
            }
        } else if touched {
            changes.modified.push(file.rel_path.clone());
        }
        seen.insert(file.rel_path);
    }

    changes.deleted = indexed_files
        .iter()
        .filter(|f| !seen.contains(f.as_str()))
        .cloned()
        .collect();

    changes.normalize();
    debug!(
        "mtime scan of {}: {} added, {} modified, {} deleted",
        root.display(),
        changes.added.len(),
        changes.modified.len(),
        changes.deleted.len()
    );
    Ok(changes)
}

/// When the index was last brought up to date.
///
/// Recorded `indexed_at`, else the date in the index filename, else the
/// index file's own mtime. With none of those, every file counts as modified.
#[must_use]
pub fn reference_time(metadata: &StoreMetadata, index_path: &Path) -> SystemTime {
    if let Some(ts) = metadata.indexed_at {
        return ts.into();
    }
    if let Some(date) = paths::index_date_of(index_path) {
        let midnight: DateTime<Utc> = date.and_time(chrono::NaiveTime::MIN).and_utc();
        return midnight.into();
    }
    std::fs::metadata(index_path)
        .and_then(|m| m.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH)
}
