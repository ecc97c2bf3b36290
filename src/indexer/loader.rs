//! Source tree scanning: which files become `Document`s, which are skipped and why.
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::SystemTime;

use glob::Pattern;
use ignore::WalkBuilder;
use tracing::{debug, info, warn};

use super::languages::doc_type_for_path;
use super::split::split_by_lines;
use crate::error::{Error, Result};
use crate::models::{Document, SkippedFile};

/// Dependency, build and VCS directories never descended into.
pub const SKIP_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    "vendor",
    "dist",
    "build",
    ".github",
    ".next",
    "target",
];

static TEST_FILE_PATTERNS: LazyLock<Vec<Pattern>> = LazyLock::new(|| {
    [
        "*_test.go",
        "*_test.ts",
        "*_test.js",
        "*.test.ts",
        "*.test.js",
        "*.spec.ts",
        "*.spec.js",
        "*_test.py",
        "test_*",
        "*Test.java",
    ]
    .iter()
    .filter_map(|p| Pattern::new(p).ok())
    .collect()
});

/// A regular file found by [`walk_source_files`].
#[derive(Debug, Clone)]
pub struct WalkedFile {
    pub path: PathBuf,
    /// Forward-slash path relative to the walk root.
    pub rel_path: String,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

/// Walk `root` the same way for scans and change detection.
///
/// Respects `.gitignore` (even outside a git checkout), includes hidden
/// files, and prunes [`SKIP_DIRS`]. Unreadable entries are logged and skipped.
pub fn walk_source_files(root: &Path) -> Vec<WalkedFile> {
    let walker = WalkBuilder::new(root)
        .hidden(false)
        .require_git(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(|entry| {
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            !(entry.depth() > 0
                && is_dir
                && entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| SKIP_DIRS.contains(&name)))
        })
        .build();

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {e}", root.display());
                continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }

        let path = entry.path();
        let Ok(rel) = path.strip_prefix(root) else {
            continue;
        };
        let metadata = entry.metadata().ok();
        files.push(WalkedFile {
            path: path.to_path_buf(),
            rel_path: rel.to_string_lossy().replace('\\', "/"),
            size: metadata.as_ref().map_or(0, |m| m.len()),
            modified: metadata.and_then(|m| m.modified().ok()),
        });
    }
    files
}

/// Whether `file_name` looks like a test file.
#[must_use]
pub fn is_test_file(file_name: &str) -> bool {
    TEST_FILE_PATTERNS.iter().any(|p| p.matches(file_name))
}

/// Whether `path` ends with one of `extensions` (case-insensitive).
#[must_use]
pub fn has_allowed_extension(path: &str, extensions: &[String]) -> bool {
    let lower = path.to_lowercase();
    extensions
        .iter()
        .any(|ext| lower.ends_with(&ext.to_lowercase()))
}

/// Whether any directory component of a root-relative path is in [`SKIP_DIRS`].
///
/// Git diffs, watch events and explicit file lists go through this so they
/// agree with what [`walk_source_files`] prunes.
#[must_use]
pub fn is_in_skipped_dir(rel_path: &str) -> bool {
    let mut components: Vec<&str> = rel_path.split(['/', '\\']).collect();
    components.pop();
    components.iter().any(|c| SKIP_DIRS.contains(c))
}

#[derive(Debug, Default)]
pub struct LoadResult {
    pub documents: Vec<Document>,
    pub skipped_files: Vec<SkippedFile>,
    /// Files considered, including skipped ones.
    pub total_files: usize,
}

impl LoadResult {
    /// Distinct file paths that produced at least one document.
    #[must_use]
    pub fn loaded_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .documents
            .iter()
            .map(|d| d.metadata.path.clone())
            .collect();
        paths.dedup();
        paths
    }
}

#[derive(Debug, Clone)]
pub struct Loader {
    pub extensions: Vec<String>,
    pub max_file_size: u64,
    pub split_large_files: bool,
    pub include_tests: bool,
}

impl Loader {
    #[must_use]
    pub fn new(extensions: Vec<String>) -> Self {
        Self {
            extensions,
            max_file_size: 100 * 1024,
            split_large_files: false,
            include_tests: false,
        }
    }

    /// Load every admitted file under `root`.
    pub fn load_dir(&self, root: &Path) -> Result<LoadResult> {
        if !root.is_dir() {
            return Err(Error::SourceNotFound(root.to_path_buf()));
        }

        let mut result = LoadResult::default();
        for file in walk_source_files(root) {
            result.total_files += 1;
            self.load_one(&file.path, &file.rel_path, file.size, &mut result);
        }

        info!(
            "Loaded {} documents from {} files ({} skipped)",
            result.documents.len(),
            result.total_files,
            result.skipped_files.len()
        );
        Ok(result)
    }

    /// Load an explicit list of root-relative paths with the same rules.
    pub fn load_files<S: AsRef<str>>(&self, root: &Path, rel_paths: &[S]) -> LoadResult {
        let mut result = LoadResult::default();
        for rel in rel_paths {
            let rel = rel.as_ref();
            // Pruned by the walker too, so never a candidate
            if is_in_skipped_dir(rel) {
                debug!("Ignoring {rel}: inside a skipped directory");
                continue;
            }
            result.total_files += 1;
            let path = root.join(rel);
            match fs::metadata(&path) {
                Ok(m) if m.is_file() => self.load_one(&path, rel, m.len(), &mut result),
                _ => result.skipped_files.push(SkippedFile {
                    path: rel.to_string(),
                    reason: "not found".to_string(),
                    size: 0,
                }),
            }
        }
        result
    }

    fn load_one(&self, path: &Path, rel: &str, size: u64, result: &mut LoadResult) {
        let mut skip = |reason: String, size: u64| {
            debug!("Skipping {rel}: {reason}");
            result.skipped_files.push(SkippedFile {
                path: rel.to_string(),
                reason,
                size,
            });
        };

        if !has_allowed_extension(rel, &self.extensions) {
            // Extensionless files are not worth reporting
            if let Some(ext) = Path::new(rel).extension() {
                skip(format!("wrong extension (.{})", ext.to_string_lossy()), size);
            }
            return;
        }

        let file_name = Path::new(rel)
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        if !self.include_tests && is_test_file(&file_name) {
            skip("test file".to_string(), size);
            return;
        }

        if size > self.max_file_size && !self.split_large_files {
            skip(self.too_large(size), size);
            return;
        }

        let bytes = match fs::read(path) {
            Ok(b) => b,
            Err(e) => {
                skip(format!("unreadable: {e}"), size);
                return;
            }
        };
        let content = match String::from_utf8(bytes) {
            Ok(c) => c,
            Err(_) => {
                skip("not valid UTF-8".to_string(), size);
                return;
            }
        };

        let doc_type = doc_type_for_path(rel);
        let len = content.len() as u64;
        if len > self.max_file_size {
            if !self.split_large_files {
                skip(self.too_large(len), len);
                return;
            }
            let budget = usize::try_from(self.max_file_size).unwrap_or(usize::MAX);
            let parts = split_by_lines(&content, budget);
            info!("Split large file {rel} into {} parts", parts.len());
            result.documents.extend(
                parts
                    .into_iter()
                    .enumerate()
                    .map(|(i, part)| Document::part(part, rel, doc_type, i + 1)),
            );
            return;
        }

        result.documents.push(Document::new(content, rel, doc_type));
    }

    fn too_large(&self, size: u64) -> String {
        format!(
            "too large ({}KB, max {}KB)",
            size / 1024,
            self.max_file_size / 1024
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_is_test_file() {
        assert!(is_test_file("store_test.go"));
        assert!(is_test_file("app.test.ts"));
        assert!(is_test_file("test_loader.py"));
        assert!(is_test_file("LoaderTest.java"));
        assert!(!is_test_file("latest_news.md"));
        assert!(!is_test_file("main.go"));
    }

    #[test]
    fn test_walk_skips_dependency_dirs_and_gitignored() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "docs/a.md", "a");
        write(root, "node_modules/pkg/readme.md", "x");
        write(root, "target/debug/out.md", "x");
        write(root, ".git/HEAD", "ref");
        write(root, "secret/ignored.md", "x");
        write(root, ".gitignore", "secret/\n");
        write(root, ".notes/hidden.md", "h");

        let rels: Vec<String> = walk_source_files(root).into_iter().map(|f| f.rel_path).collect();
        assert!(rels.contains(&"docs/a.md".to_string()));
        assert!(rels.contains(&".notes/hidden.md".to_string()));
        assert!(!rels.iter().any(|r| r.starts_with("node_modules")));
        assert!(!rels.iter().any(|r| r.starts_with("target")));
        assert!(!rels.iter().any(|r| r.starts_with(".git/")));
        assert!(!rels.iter().any(|r| r.starts_with("secret")));
    }

    #[test]
    fn test_load_dir_records_skips() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "guide.md", "# Guide\nhello");
        write(root, "main.go", "package main");
        write(root, "main_test.go", "package main");
        write(root, "logo.png", "png");
        write(root, "big.go", &"// filler line\n".repeat(100));

        let mut loader = Loader::new(vec![".md".into(), ".go".into()]);
        loader.max_file_size = 1000;
        let result = loader.load_dir(root).unwrap();

        let sources: Vec<&str> = result.documents.iter().map(|d| d.source.as_str()).collect();
        assert_eq!(sources, vec!["guide.md", "main.go"]);
        assert_eq!(result.documents[0].metadata.doc_type, "markdown");
        assert_eq!(result.documents[1].metadata.doc_type, "go");

        let reason = |p: &str| {
            result
                .skipped_files
                .iter()
                .find(|s| s.path == p)
                .map(|s| s.reason.clone())
        };
        assert_eq!(reason("main_test.go").as_deref(), Some("test file"));
        assert_eq!(reason("logo.png").as_deref(), Some("wrong extension (.png)"));
        assert!(reason("big.go").unwrap().starts_with("too large"));
    }

    #[test]
    fn test_split_large_files_into_parts() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "big.md", &"a line of markdown text\n".repeat(100));

        let mut loader = Loader::new(vec![".md".into()]);
        loader.max_file_size = 1000;
        loader.split_large_files = true;
        let result = loader.load_dir(root).unwrap();

        assert!(result.documents.len() >= 3);
        assert_eq!(result.documents[0].source, "big.md (part 1)");
        assert_eq!(result.documents[1].metadata.part, Some(2));
        assert!(result.documents.iter().all(|d| d.content.len() <= 1000));
        assert_eq!(result.loaded_paths(), vec!["big.md"]);
    }

    #[test]
    fn test_load_files_reports_missing_and_non_utf8() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "a.md", "alpha");
        fs::write(root.join("bin.md"), [0xff, 0xfe, 0x00]).unwrap();

        let loader = Loader::new(vec![".md".into()]);
        let result = loader.load_files(root, &["a.md", "gone.md", "bin.md"]);
        assert_eq!(result.documents.len(), 1);
        assert_eq!(result.skipped_files.len(), 2);
        assert_eq!(result.skipped_files[0].reason, "not found");
        assert_eq!(result.skipped_files[1].reason, "not valid UTF-8");
    }

    #[test]
    fn test_skipped_dirs_apply_to_explicit_paths() {
        assert!(is_in_skipped_dir("vendor/dep.md"));
        assert!(is_in_skipped_dir("docs/node_modules/pkg/readme.md"));
        assert!(!is_in_skipped_dir("docs/build.md"));
        assert!(!is_in_skipped_dir("target.md"));

        let dir = TempDir::new().unwrap();
        write(dir.path(), "vendor/dep.md", "# Dep\n\nvendored file body\n");
        write(dir.path(), "a.md", "# A\n\nregular file body\n");
        let result = Loader::new(vec![".md".to_string()]).load_files(dir.path(), &["a.md", "vendor/dep.md"]);
        assert_eq!(result.loaded_paths(), vec!["a.md"]);
        assert_eq!(result.total_files, 1);
        assert!(result.skipped_files.is_empty());
    }

    #[test]
    fn test_missing_root_is_source_not_found() {
        let loader = Loader::new(vec![".md".into()]);
        let err = loader.load_dir(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, Error::SourceNotFound(_)));
    }
}
