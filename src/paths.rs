//! Index file naming and directory layout.
//!
//! One authoritative file per source name, optionally date-suffixed
//! (`docs_20240115.lrindex`). Checkpoint and temp files live next to it and
//! are never listed as indexes.
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::error::{Error, Result};

/// Suffix of compressed index files.
pub const INDEX_SUFFIX: &str = ".lrindex";
/// Suffix of legacy plain-JSON index files.
pub const LEGACY_SUFFIX: &str = ".json";

const CHECKPOINT_MARKER: &str = ".checkpoint";
const TEMP_MARKER: &str = ".tmp";

static DATE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+)_(\d{8})$").expect("date suffix pattern is valid"));

/// Whether `path` names a compressed index (signalled by suffix).
#[must_use]
pub fn is_compressed(path: &Path) -> bool {
    path.to_string_lossy().ends_with(INDEX_SUFFIX)
}

/// `x.lrindex` → `x.checkpoint.lrindex`, `x.json` → `x.checkpoint.json`.
#[must_use]
pub fn checkpoint_path(final_path: &Path) -> PathBuf {
    with_marker(final_path, CHECKPOINT_MARKER)
}

/// `x.lrindex` → `x.tmp.lrindex`; anything else gets `.tmp` appended.
#[must_use]
pub fn temp_path(final_path: &Path) -> PathBuf {
    let s = final_path.to_string_lossy();
    match s.strip_suffix(INDEX_SUFFIX) {
        Some(stem) => PathBuf::from(format!("{stem}{TEMP_MARKER}{INDEX_SUFFIX}")),
        None => PathBuf::from(format!("{s}{TEMP_MARKER}")),
    }
}

fn with_marker(final_path: &Path, marker: &str) -> PathBuf {
    let s = final_path.to_string_lossy();
    for suffix in [INDEX_SUFFIX, LEGACY_SUFFIX] {
        if let Some(stem) = s.strip_suffix(suffix) {
            return PathBuf::from(format!("{stem}{marker}{suffix}"));
        }
    }
    PathBuf::from(format!("{s}{marker}"))
}

/// `dir/name_YYYYMMDD.lrindex`
#[must_use]
pub fn dated_index_file(dir: &Path, name: &str, date: NaiveDate) -> PathBuf {
    dir.join(format!("{name}_{}{INDEX_SUFFIX}", date.format("%Y%m%d")))
}

/// Checkpoint and temp files share the index directory but are never canonical.
#[must_use]
pub fn is_auxiliary(file_name: &str) -> bool {
    file_name.contains(CHECKPOINT_MARKER)
        || file_name.ends_with(TEMP_MARKER)
        || file_name.contains(&format!("{TEMP_MARKER}{INDEX_SUFFIX}"))
}

fn file_stem_of(path: &Path) -> Option<&str> {
    let name = path.file_name()?.to_str()?;
    if is_auxiliary(name) {
        return None;
    }
    name.strip_suffix(INDEX_SUFFIX)
        .or_else(|| name.strip_suffix(LEGACY_SUFFIX))
}

/// Source name of an index file: suffix and 8-digit date stripped.
///
/// Returns `None` for checkpoint/temp files and non-index files.
#[must_use]
pub fn source_name_of(path: &Path) -> Option<String> {
    let stem = file_stem_of(path)?;
    let name = match DATE_SUFFIX.captures(stem) {
        Some(caps) => caps.get(1).map_or(stem, |m| m.as_str()),
        None => stem,
    };
    Some(name.to_string())
}

/// Date encoded in an index filename, if any.
#[must_use]
pub fn index_date_of(path: &Path) -> Option<NaiveDate> {
    let stem = file_stem_of(path)?;
    let caps = DATE_SUFFIX.captures(stem)?;
    NaiveDate::parse_from_str(caps.get(2)?.as_str(), "%Y%m%d").ok()
}

/// Every authoritative index file in `dir`, sorted by path.
pub fn list_indexes(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| Error::persistence(dir, e))?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && source_name_of(p).is_some())
        .collect();
    files.sort();
    Ok(files)
}

/// Lexicographically last (most recent) authoritative index for `name`.
pub fn find_latest_index(dir: &Path, name: &str) -> Result<PathBuf> {
    list_indexes(dir)?
        .into_iter()
        .filter(|p| source_name_of(p).as_deref() == Some(name))
        .max()
        .ok_or_else(|| Error::IndexNotFound {
            dir: dir.to_path_buf(),
            name: name.to_string(),
        })
}

/// `$XDG_DATA_HOME/lr/indexes`, falling back to `~/.local/share/lr/indexes`.
#[must_use]
pub fn default_index_dir() -> PathBuf {
    index_dir_from(std::env::var_os("XDG_DATA_HOME").map(PathBuf::from), dirs::home_dir())
}

fn index_dir_from(xdg_data_home: Option<PathBuf>, home: Option<PathBuf>) -> PathBuf {
    let data = match xdg_data_home {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => home
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".local")
            .join("share"),
    };
    data.join("lr").join("indexes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_checkpoint_and_temp_paths() {
        assert_eq!(
            checkpoint_path(Path::new("/i/docs_20240101.lrindex")),
            PathBuf::from("/i/docs_20240101.checkpoint.lrindex")
        );
        assert_eq!(
            checkpoint_path(Path::new("/i/docs.json")),
            PathBuf::from("/i/docs.checkpoint.json")
        );
        assert_eq!(
            temp_path(Path::new("/i/docs.lrindex")),
            PathBuf::from("/i/docs.tmp.lrindex")
        );
        assert_eq!(
            temp_path(Path::new("/i/docs.json")),
            PathBuf::from("/i/docs.json.tmp")
        );
    }

    #[test]
    fn test_source_name_strips_date_suffix() {
        assert_eq!(
            source_name_of(Path::new("docs_20240115.lrindex")).as_deref(),
            Some("docs")
        );
        assert_eq!(
            source_name_of(Path::new("my_project.json")).as_deref(),
            Some("my_project")
        );
        assert_eq!(
            source_name_of(Path::new("api_v2_20231231.lrindex")).as_deref(),
            Some("api_v2")
        );
        assert_eq!(source_name_of(Path::new("docs.checkpoint.lrindex")), None);
        assert_eq!(source_name_of(Path::new("docs.tmp.lrindex")), None);
        assert_eq!(source_name_of(Path::new("notes.txt")), None);
    }

    #[test]
    fn test_index_date_of() {
        assert_eq!(
            index_date_of(Path::new("docs_20240115.lrindex")),
            NaiveDate::from_ymd_opt(2024, 1, 15)
        );
        assert_eq!(index_date_of(Path::new("docs.lrindex")), None);
    }

    #[test]
    fn test_find_latest_index_skips_auxiliary_files() {
        let dir = TempDir::new().unwrap();
        for name in [
            "docs_20240101.lrindex",
            "docs_20240301.lrindex",
            "docs_20240301.checkpoint.lrindex",
            "docs_20240401.tmp.lrindex",
            "other_20250101.lrindex",
        ] {
            std::fs::write(dir.path().join(name), b"{}").unwrap();
        }

        let latest = find_latest_index(dir.path(), "docs").unwrap();
        assert!(latest.ends_with("docs_20240301.lrindex"));

        let all = list_indexes(dir.path()).unwrap();
        assert_eq!(all.len(), 3);

        let missing = find_latest_index(dir.path(), "nope").unwrap_err();
        assert!(matches!(missing, Error::IndexNotFound { .. }));
    }

    #[test]
    fn test_index_dir_resolution() {
        assert_eq!(
            index_dir_from(Some(PathBuf::from("/xdg")), Some(PathBuf::from("/home/u"))),
            PathBuf::from("/xdg/lr/indexes")
        );
        assert_eq!(
            index_dir_from(Some(PathBuf::new()), Some(PathBuf::from("/home/u"))),
            PathBuf::from("/home/u/.local/share/lr/indexes")
        );
    }
}
