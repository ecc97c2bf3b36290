//! Git-based change detection: diff the recorded commit against HEAD.
use std::path::Path;
use std::process::{Command, Output};

use tracing::debug;

use super::ChangeSet;
use crate::error::DetectionError;
use crate::indexer::loader::{has_allowed_extension, is_in_skipped_dir};

fn git(root: &Path, args: &[&str]) -> Result<Output, DetectionError> {
    Command::new("git")
        .arg("-C")
        .arg(root)
        .args(args)
        .output()
        .map_err(|e| DetectionError::Git {
            command: args.join(" "),
            stderr: e.to_string(),
        })
}

fn git_ok(root: &Path, args: &[&str]) -> Result<String, DetectionError> {
    let output = git(root, args)?;
    if !output.status.success() {
        return Err(DetectionError::Git {
            command: args.join(" "),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Whether `root` is inside a git work tree (and git is installed).
#[must_use]
pub fn is_git_repo(root: &Path) -> bool {
    git(root, &["rev-parse", "--is-inside-work-tree"])
        .is_ok_and(|o| o.status.success() && String::from_utf8_lossy(&o.stdout).trim() == "true")
}

/// Full hash of HEAD.
pub fn head_commit(root: &Path) -> Result<String, DetectionError> {
    Ok(git_ok(root, &["rev-parse", "HEAD"])?.trim().to_string())
}

/// Changes between `last_commit` and HEAD, limited to `root` and `extensions`.
///
/// Paths under skipped directories are dropped, as a full scan never sees them.
///
/// Renames become delete-old plus add-new. A missing or unreachable recorded
/// commit is an error so the caller can fall back to a full re-index.
pub fn detect_git_changes(
    root: &Path,
    last_commit: Option<&str>,
    extensions: &[String],
) -> Result<ChangeSet, DetectionError> {
    let commit = last_commit
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or(DetectionError::NoRecordedCommit)?;

    if !is_git_repo(root) {
        return Err(DetectionError::NotGitRepository(root.to_path_buf()));
    }

    ensure_reachable(root, commit)?;

    // --relative: paths relative to `root`, even when it is a subdirectory
    let raw = git_ok(
        root,
        &[
            "diff",
            "--name-status",
            "--find-renames",
            "--relative",
            "-z",
            commit,
            "HEAD",
        ],
    )?;

    let mut changes = parse_name_status(&raw);
    changes.retain(|path| has_allowed_extension(path, extensions) && !is_in_skipped_dir(path));
    debug!(
        "git diff {commit}..HEAD: {} added, {} modified, {} deleted",
        changes.added.len(),
        changes.modified.len(),
        changes.deleted.len()
    );
    Ok(changes)
}

fn ensure_reachable(root: &Path, commit: &str) -> Result<(), DetectionError> {
    let unreachable = || DetectionError::UnreachableCommit {
        commit: commit.to_string(),
    };

    let exists = git(root, &["cat-file", "-e", &format!("{commit}^{{commit}}")])?;
    if !exists.status.success() {
        return Err(unreachable());
    }

    // Exit 1 means "not an ancestor" (rebased or force-pushed history)
    let ancestor = git(root, &["merge-base", "--is-ancestor", commit, "HEAD"])?;
    match ancestor.status.code() {
        Some(0) => Ok(()),
        Some(1) => Err(unreachable()),
        _ => Err(DetectionError::Git {
            command: format!("merge-base --is-ancestor {commit} HEAD"),
            stderr: String::from_utf8_lossy(&ancestor.stderr).trim().to_string(),
        }),
    }
}

/// Parse `git diff --name-status -z` output.
fn parse_name_status(raw: &str) -> ChangeSet {
    let mut changes = ChangeSet::default();
    let mut fields = raw.split('\0').filter(|f| !f.is_empty());

    while let Some(status) = fields.next() {
        match status.chars().next() {
            Some('A') => changes.added.extend(fields.next().map(str::to_string)),
            Some('M' | 'T') => changes.modified.extend(fields.next().map(str::to_string)),
            Some('D') => changes.deleted.extend(fields.next().map(str::to_string)),
            Some('R') => {
                changes.deleted.extend(fields.next().map(str::to_string));
                changes.added.extend(fields.next().map(str::to_string));
            }
            Some('C') => {
                // Source of a copy is unchanged
                fields.next();
                changes.added.extend(fields.next().map(str::to_string));
            }
            _ => {
                fields.next();
            }
        }
    }

    changes.normalize();
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn run(repo: &Path, args: &[&str]) -> Option<String> {
        let out = Command::new("git").arg("-C").arg(repo).args(args).output().ok()?;
        assert!(
            out.status.success(),
            "git {args:?} failed: {}",
            String::from_utf8_lossy(&out.stderr)
        );
        Some(String::from_utf8_lossy(&out.stdout).trim().to_string())
    }

    /// Temp repo with one commit, or `None` when git is unavailable.
    fn init_repo() -> Option<TempDir> {
        let dir = TempDir::new().unwrap();
        let repo = dir.path();
        Command::new("git").arg("--version").output().ok()?;
        run(repo, &["init", "-q"])?;
        run(repo, &["config", "user.email", "test@example.com"])?;
        run(repo, &["config", "user.name", "Test"])?;
        run(repo, &["config", "commit.gpgsign", "false"])?;
        Some(dir)
    }

    fn commit_all(repo: &Path, msg: &str) -> String {
        run(repo, &["add", "-A"]).unwrap();
        run(repo, &["commit", "-q", "-m", msg]).unwrap();
        run(repo, &["rev-parse", "HEAD"]).unwrap()
    }

    #[test]
    fn test_parse_name_status() {
        let raw = "A\0new.md\0M\0changed.md\0D\0gone.md\0R087\0old.md\0renamed.md\0C100\0src.md\0copy.md\0";
        let changes = parse_name_status(raw);
        assert_eq!(changes.added, vec!["copy.md", "new.md", "renamed.md"]);
        assert_eq!(changes.modified, vec!["changed.md"]);
        assert_eq!(changes.deleted, vec!["gone.md", "old.md"]);
    }

    #[test]
    fn test_no_recorded_commit() {
        let err = detect_git_changes(Path::new("."), None, &[".md".into()]).unwrap_err();
        assert!(matches!(err, DetectionError::NoRecordedCommit));
        let err = detect_git_changes(Path::new("."), Some("  "), &[".md".into()]).unwrap_err();
        assert!(matches!(err, DetectionError::NoRecordedCommit));
    }

    #[test]
    fn test_detects_changes_between_commits() {
        let Some(dir) = init_repo() else {
            return;
        };
        let repo = dir.path();
        fs::write(repo.join("keep.md"), "keep").unwrap();
        fs::write(repo.join("edit.md"), "v1").unwrap();
        fs::write(repo.join("drop.md"), "bye").unwrap();
        fs::write(repo.join("move.md"), "a fairly long body so rename detection works\n").unwrap();
        let c1 = commit_all(repo, "c1");

        fs::write(repo.join("edit.md"), "v2").unwrap();
        fs::remove_file(repo.join("drop.md")).unwrap();
        fs::rename(repo.join("move.md"), repo.join("moved.md")).unwrap();
        fs::write(repo.join("new.md"), "new").unwrap();
        fs::write(repo.join("main.go"), "package main").unwrap();
        commit_all(repo, "c2");

        assert!(is_git_repo(repo));
        let changes = detect_git_changes(repo, Some(&c1), &[".md".into()]).unwrap();
        assert_eq!(changes.added, vec!["moved.md", "new.md"]);
        assert_eq!(changes.modified, vec!["edit.md"]);
        assert_eq!(changes.deleted, vec!["drop.md", "move.md"]);
    }

    #[test]
    fn test_skipped_dirs_are_not_reported() {
        let Some(dir) = init_repo() else {
            return;
        };
        let repo = dir.path();
        fs::write(repo.join("a.md"), "a").unwrap();
        let c1 = commit_all(repo, "c1");

        fs::create_dir_all(repo.join("vendor/lib")).unwrap();
        fs::create_dir_all(repo.join("node_modules/pkg")).unwrap();
        fs::write(repo.join("vendor/lib/dep.md"), "vendored").unwrap();
        fs::write(repo.join("node_modules/pkg/readme.md"), "package").unwrap();
        fs::write(repo.join("build.md"), "a file, not a directory").unwrap();
        fs::write(repo.join("a.md"), "a2").unwrap();
        commit_all(repo, "c2");

        let changes = detect_git_changes(repo, Some(&c1), &[".md".into()]).unwrap();
        assert_eq!(changes.added, vec!["build.md"]);
        assert_eq!(changes.modified, vec!["a.md"]);
        assert!(changes.deleted.is_empty());
    }

    #[test]
    fn test_rewritten_history_is_unreachable() {
        let Some(dir) = init_repo() else {
            return;
        };
        let repo = dir.path();
        fs::write(repo.join("a.md"), "one").unwrap();
        commit_all(repo, "c1");
        fs::write(repo.join("a.md"), "two").unwrap();
        let c2 = commit_all(repo, "c2");

        // Drop c2 from history, as a force-push would
        run(repo, &["reset", "-q", "--hard", "HEAD~1"]).unwrap();
        fs::write(repo.join("a.md"), "three").unwrap();
        commit_all(repo, "c3");

        let err = detect_git_changes(repo, Some(&c2), &[".md".into()]).unwrap_err();
        assert!(matches!(err, DetectionError::UnreachableCommit { .. }), "{err}");

        let err = detect_git_changes(repo, Some("0123456789abcdef0123456789abcdef01234567"), &[".md".into()])
            .unwrap_err();
        assert!(matches!(err, DetectionError::UnreachableCommit { .. }), "{err}");
    }

    #[test]
    fn test_not_a_repository() {
        if Command::new("git").arg("--version").output().is_err() {
            return;
        }
        let dir = TempDir::new().unwrap();
        let err = detect_git_changes(dir.path(), Some("abc"), &[".md".into()]).unwrap_err();
        assert!(matches!(err, DetectionError::NotGitRepository(_)), "{err}");
    }
}
