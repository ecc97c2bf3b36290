//! Watch mode: filesystem events → debounced batches → incremental commits.
//!
//! Events accumulate in a pending set; every new event restarts the quiet
//! window. Once the window passes without events the whole set is classified
//! and pushed through the same REMOVE-STALE → COMMIT path as `update`.
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use notify::{EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::changes::ChangeSet;
use crate::config::Config;
use crate::error::Result;
use crate::handle::StoreHandle;
use crate::indexer::core::absolute;
use crate::indexer::loader::{SKIP_DIRS, has_allowed_extension, is_in_skipped_dir, walk_source_files};
use crate::provider::Embedder;
use crate::store::VectorStore;
use crate::updater::Updater;

// ── Debouncer ────────────────────────────────────────────────────────

/// Pending paths plus a quiet-window timer.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    pending: BTreeSet<PathBuf>,
    last_event: Option<Instant>,
}

impl Debouncer {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: BTreeSet::new(),
            last_event: None,
        }
    }

    /// Record an event, restarting the window.
    pub fn push(&mut self, path: PathBuf, now: Instant) {
        self.pending.insert(path);
        self.last_event = Some(now);
    }

    /// When the pending batch becomes due, if there is one.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.last_event
            .filter(|_| !self.pending.is_empty())
            .map(|t| t + self.window)
    }

    /// The whole pending batch, once `window` has passed since the last event.
    pub fn take_due(&mut self, now: Instant) -> Option<Vec<PathBuf>> {
        match self.deadline() {
            Some(due) if now >= due => Some(self.drain()),
            _ => None,
        }
    }

    /// Everything pending, due or not.
    pub fn drain(&mut self) -> Vec<PathBuf> {
        self.last_event = None;
        std::mem::take(&mut self.pending).into_iter().collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

// ── Batch classification ─────────────────────────────────────────────

/// Classify a flushed batch against the store's recorded files.
///
/// Missing and indexed ⇒ deleted; present and indexed ⇒ modified; present and
/// unindexed ⇒ added. A missing directory deletes every indexed file under
/// it and an existing directory adds its unindexed files, since a moved
/// directory is reported as a single event. Filtered extensions, skipped
/// directories and paths outside `root` are ignored.
#[must_use]
pub fn batch_changes(
    store: &VectorStore,
    root: &Path,
    paths: &[PathBuf],
    extensions: &[String],
) -> ChangeSet {
    let indexed: HashSet<&str> = store
        .metadata
        .indexed_files
        .iter()
        .map(String::as_str)
        .collect();
    let mut changes = ChangeSet::default();

    for path in paths {
        let Ok(rel) = path.strip_prefix(root) else {
            continue;
        };
        let rel = rel.to_string_lossy().replace('\\', "/");
        let name = rel.rsplit('/').next().unwrap_or_default();
        if rel.is_empty() || is_in_skipped_dir(&rel) || SKIP_DIRS.contains(&name) {
            continue;
        }

        if path.is_dir() {
            for file in walk_source_files(path) {
                let nested = format!("{rel}/{}", file.rel_path);
                if has_allowed_extension(&nested, extensions) && !indexed.contains(nested.as_str()) {
                    changes.added.push(nested);
                }
            }
            continue;
        }

        if !path.exists() {
            if indexed.contains(rel.as_str()) {
                changes.deleted.push(rel);
            } else {
                let prefix = format!("{rel}/");
                changes.deleted.extend(
                    indexed
                        .iter()
                        .filter(|f| f.starts_with(&prefix))
                        .map(|f| (*f).to_string()),
                );
            }
            continue;
        }

        if !has_allowed_extension(&rel, extensions) {
            continue;
        }
        if indexed.contains(rel.as_str()) {
            changes.modified.push(rel);
        } else {
            changes.added.push(rel);
        }
    }

    changes.normalize();
    changes
}

// ── Watch loop ───────────────────────────────────────────────────────

/// What to watch and where to commit.
#[derive(Clone)]
pub struct WatchTarget {
    pub root: PathBuf,
    pub index_path: PathBuf,
    pub config: Arc<Config>,
    pub embedder: Arc<dyn Embedder>,
    /// Reloaded after each commit when `config.watch.reload_handle` is set.
    pub handle: Option<StoreHandle>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WatchSummary {
    pub batches: usize,
    pub failed_batches: usize,
    pub added_chunks: usize,
    pub removed_chunks: usize,
}

/// Watch `target.root` until `cancel` fires; pending events are flushed first.
pub async fn watch(target: WatchTarget, cancel: CancellationToken) -> Result<WatchSummary> {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        match res {
            Ok(event) if !matches!(event.kind, EventKind::Access(_)) => {
                for path in event.paths {
                    // Receiver gone means the loop has stopped
                    let _ = tx.send(path);
                }
            }
            Ok(_) => {}
            Err(e) => warn!("Watch error: {e}"),
        }
    })?;
    watcher.watch(&target.root, RecursiveMode::Recursive)?;
    info!("Watching {} for changes", target.root.display());

    let summary = watch_events(target, rx, cancel).await;
    drop(watcher);
    summary
}

/// The loop behind [`watch`], fed from any event source.
pub async fn watch_events(
    target: WatchTarget,
    mut events: mpsc::UnboundedReceiver<PathBuf>,
    cancel: CancellationToken,
) -> Result<WatchSummary> {
    let root = absolute(&target.root);
    let index_path = target.index_path.clone();
    let mut store = tokio::task::spawn_blocking(move || VectorStore::load(&index_path)).await??;

    let mut debouncer = Debouncer::new(target.config.debounce());
    let mut summary = WatchSummary::default();

    loop {
        let deadline = debouncer.deadline();
        tokio::select! {
            () = cancel.cancelled() => break,
            event = events.recv() => match event {
                Some(path) => debouncer.push(path, Instant::now()),
                None => break,
            },
            () = sleep_until(deadline) => {
                if let Some(batch) = debouncer.take_due(Instant::now()) {
                    store = process_batch(&target, &root, store, batch, &mut summary).await?;
                }
            }
        }
    }

    while let Ok(path) = events.try_recv() {
        debouncer.push(path, Instant::now());
    }
    if !debouncer.is_empty() {
        let batch = debouncer.drain();
        process_batch(&target, &root, store, batch, &mut summary).await?;
    }

    info!(
        "Stopped watching {} ({} batches, {} failed)",
        root.display(),
        summary.batches,
        summary.failed_batches
    );
    Ok(summary)
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(due) => tokio::time::sleep_until(tokio::time::Instant::from_std(due)).await,
        None => std::future::pending().await,
    }
}

/// Commit one batch. A failed batch is logged and the store reloaded from
/// disk, so the loop keeps running.
async fn process_batch(
    target: &WatchTarget,
    root: &Path,
    mut store: VectorStore,
    batch: Vec<PathBuf>,
    summary: &mut WatchSummary,
) -> Result<VectorStore> {
    let changes = batch_changes(&store, root, &batch, &target.config.extensions);
    if !changes.has_changes() {
        debug!("Ignoring batch of {} events", batch.len());
        return Ok(store);
    }
    info!("Updating {} file(s): {changes}", changes.total());

    let config = Arc::clone(&target.config);
    let embedder = Arc::clone(&target.embedder);
    let root = root.to_path_buf();
    let index_path = target.index_path.clone();

    let (store, outcome) = tokio::task::spawn_blocking(move || {
        if config.watch.review {
            store.metadata.review = true;
        }
        let outcome = Updater::new(embedder.as_ref(), &config).apply_changes(
            &mut store,
            &root,
            &changes,
            &index_path,
        );
        (store, outcome)
    })
    .await?;

    summary.batches += 1;
    match outcome {
        Ok(stats) => {
            summary.added_chunks += stats.added_chunks;
            summary.removed_chunks += stats.removed_chunks;
            if let Some(handle) = target.handle.as_ref().filter(|_| target.config.watch.reload_handle) {
                if let Err(e) = handle.reload().await {
                    warn!("Failed to reload store handle: {e}");
                }
            }
            Ok(store)
        }
        Err(e) => {
            summary.failed_batches += 1;
            warn!("Batch update failed: {e}");
            let index_path = target.index_path.clone();
            Ok(tokio::task::spawn_blocking(move || VectorStore::load(&index_path)).await??)
        }
    }
}
