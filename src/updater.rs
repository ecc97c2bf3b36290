/// Incremental index updates.
///
/// DETECT → REMOVE-STALE → LOAD-CHANGED → CHUNK → EMBED → COMMIT. Detection
/// errors abort before anything is mutated, provider errors leave the
/// checkpoint as the recovery point, and a failed commit leaves the previous
/// index file untouched.
use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use chrono::Utc;
use tracing::{info, warn};

use crate::changes::{self, ChangeSet, DetectionMethod};
use crate::config::Config;
use crate::error::{DetectionError, Error, Result};
use crate::indexer::checkpoint::{self, EmbedOptions};
use crate::indexer::core::{absolute, chunk_documents, recorded_commit};
use crate::indexer::{IndexReport, Indexer};
use crate::models::{SkippedFile, source_path};
use crate::paths;
use crate::provider::Embedder;
use crate::store::{StoreMetadata, VectorStore, atomic_save_expecting};

// ── Reports ──────────────────────────────────────────────────────────

/// What a committed change batch did to the store.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ApplyStats {
    pub removed_chunks: usize,
    pub added_chunks: usize,
    pub total_chunks: usize,
    /// New chunks recovered from a checkpoint instead of re-embedded.
    pub resumed: usize,
    /// Changed files that could not be loaded this time.
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateReport {
    pub changes: ChangeSet,
    pub method: DetectionMethod,
    pub dry_run: bool,
    /// `None` when nothing was committed (no changes, or a dry run).
    pub applied: Option<ApplyStats>,
}

/// Result of [`Updater::refresh`].
#[derive(Debug)]
pub enum RefreshOutcome {
    Updated(UpdateReport),
    Rebuilt(IndexReport),
}

// ── Updater ──────────────────────────────────────────────────────────

pub struct Updater<'a> {
    pub embedder: &'a dyn Embedder,
    pub config: &'a Config,
}

impl<'a> Updater<'a> {
    pub fn new(embedder: &'a dyn Embedder, config: &'a Config) -> Self {
        Self { embedder, config }
    }

    /// Bring the index at `index_path` up to date with the tree under `root`.
    ///
    /// With `dry_run` the change set is detected and reported, nothing else.
    pub fn update(&self, root: &Path, index_path: &Path, dry_run: bool) -> Result<UpdateReport> {
        let mut store = VectorStore::load(index_path)?;
        info!("Loaded {} existing chunks", store.len());

        migrate_indexed_files(&mut store);

        if !root.is_dir() {
            return Err(Error::SourceNotFound(root.to_path_buf()));
        }
        check_model(&store.metadata, self.embedder)?;

        let (changes, method) =
            changes::detect_changes(root, &store.metadata, index_path, &self.config.extensions)?;
        info!("Detected changes via {method:?}: {changes}");

        let mut report = UpdateReport {
            changes,
            method,
            dry_run,
            applied: None,
        };

        if !report.changes.has_changes() {
            info!("No changes detected, index is up to date");
            return Ok(report);
        }
        if dry_run {
            for f in &report.changes.added {
                info!("  + {f}");
            }
            for f in &report.changes.modified {
                info!("  ~ {f}");
            }
            for f in &report.changes.deleted {
                info!("  - {f}");
            }
            return Ok(report);
        }

        report.applied = Some(self.apply_changes(&mut store, root, &report.changes, index_path)?);
        Ok(report)
    }

    /// REMOVE-STALE through COMMIT for an already-detected change set.
    ///
    /// On error `store` may already have lost stale chunks; the file at
    /// `index_path` is unchanged, so reload it before trying again.
    pub fn apply_changes(
        &self,
        store: &mut VectorStore,
        root: &Path,
        changes: &ChangeSet,
        index_path: &Path,
    ) -> Result<ApplyStats> {
        let started = Utc::now();

        let removed_files = changes.removed_files();
        let stale = stale_sources(store, &removed_files);
        let removed_chunks = store.remove_by_source(&stale);
        if removed_chunks > 0 {
            info!(
                "Removed {removed_chunks} chunks from {} changed/deleted files",
                removed_files.len()
            );
        }

        let changed_files = changes.changed_files();
        let loaded = self.config.loader().load_files(root, &changed_files);
        let new_chunks = chunk_documents(&loaded.documents, self.config.chunk_size);
        info!(
            "Created {} new chunks from {} changed files",
            new_chunks.len(),
            changed_files.len()
        );

        let checkpoint_path = paths::checkpoint_path(index_path);
        let embedded = checkpoint::embed_chunks(
            &new_chunks,
            self.embedder,
            &checkpoint_path,
            &EmbedOptions::from(self.config),
        )?;
        let added_chunks = embedded.store.len();
        let expected = store.len() + added_chunks;
        store.append(embedded.store);

        let skipped = loaded.skipped_files.len();
        reconcile_metadata(
            &mut store.metadata,
            changes,
            &loaded.loaded_paths(),
            loaded.skipped_files,
        );
        let meta = &mut store.metadata;
        meta.indexed_at = Some(started);
        meta.source_path = absolute(root).display().to_string();
        meta.file_count = meta.indexed_files.len();
        meta.chunk_count = expected;
        meta.embedding_model = Some(self.embedder.model_name().to_string());
        if let Some(commit) = recorded_commit(root) {
            meta.last_commit = Some(commit);
        }

        atomic_save_expecting(store, index_path, expected)?;
        checkpoint::clear_checkpoint(&checkpoint_path);
        info!("Incremental update complete ({} total chunks)", store.len());

        Ok(ApplyStats {
            removed_chunks,
            added_chunks,
            total_chunks: store.len(),
            resumed: embedded.resumed,
            skipped,
        })
    }

    /// Incremental update, or a full rebuild when the index is missing or
    /// its recorded state cannot be diffed against the tree.
    pub fn refresh(&self, root: &Path, index_path: &Path) -> Result<RefreshOutcome> {
        if !index_path.exists() {
            info!("No index at {}, building from scratch", index_path.display());
            return self.rebuild(root, index_path);
        }

        match self.update(root, index_path, false) {
            Ok(report) => Ok(RefreshOutcome::Updated(report)),
            Err(e) if e.is_detection() => {
                warn!("{e}; falling back to full re-index");
                self.rebuild(root, index_path)
            }
            Err(e) => Err(e),
        }
    }

    fn rebuild(&self, root: &Path, index_path: &Path) -> Result<RefreshOutcome> {
        Indexer::new(self.embedder, self.config)
            .index_source(root, index_path)
            .map(RefreshOutcome::Rebuilt)
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

/// Older indexes carry chunks but no file list; rebuild it from chunk sources.
pub fn migrate_indexed_files(store: &mut VectorStore) -> bool {
    if !store.metadata.indexed_files.is_empty() || store.is_empty() {
        return false;
    }
    let files: BTreeSet<&str> = store.sources().into_iter().map(source_path).collect();
    let files: Vec<String> = files.into_iter().map(str::to_string).collect();
    info!("Migrated index: found {} indexed files from chunks", files.len());
    store.metadata.indexed_files = files;
    true
}

fn check_model(metadata: &StoreMetadata, embedder: &dyn Embedder) -> Result<()> {
    match metadata.embedding_model.as_deref() {
        Some(recorded) if recorded != embedder.model_name() => {
            Err(DetectionError::ModelChanged {
                recorded: recorded.to_string(),
                current: embedder.model_name().to_string(),
            }
            .into())
        }
        _ => Ok(()),
    }
}

/// Every chunk source belonging to `files`, split-file parts included.
fn stale_sources(store: &VectorStore, files: &[String]) -> Vec<String> {
    let files: HashSet<&str> = files.iter().map(String::as_str).collect();
    store
        .sources()
        .into_iter()
        .filter(|s| files.contains(source_path(s)))
        .map(str::to_string)
        .collect()
}

/// IndexedFiles becomes (old − modified − deleted) ∪ loaded; skip records
/// for touched files are replaced by this run's.
fn reconcile_metadata(
    meta: &mut StoreMetadata,
    changes: &ChangeSet,
    loaded: &[String],
    skipped: Vec<SkippedFile>,
) {
    let removed: HashSet<&str> = changes
        .modified
        .iter()
        .chain(&changes.deleted)
        .map(String::as_str)
        .collect();
    let mut files: BTreeSet<String> = meta
        .indexed_files
        .iter()
        .filter(|f| !removed.contains(f.as_str()))
        .cloned()
        .collect();
    files.extend(loaded.iter().cloned());
    meta.indexed_files = files.into_iter().collect();

    let touched: HashSet<&str> = changes
        .added
        .iter()
        .chain(&changes.modified)
        .chain(&changes.deleted)
        .map(String::as_str)
        .collect();
    meta.skipped_files.retain(|s| !touched.contains(s.path.as_str()));
    meta.skipped_files.extend(skipped);
}

// ── Tests ────────────────────────────────────────────────────────────
