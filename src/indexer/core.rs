use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::changes::git;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::indexer::checkpoint::{self, EmbedOptions};
use crate::indexer::chunker;
use crate::models::{Chunk, Document};
use crate::paths;
use crate::provider::Embedder;
use crate::store::{StoreMetadata, atomic_save};

/// Outcome of a full index build.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct IndexReport {
    pub path: PathBuf,
    pub file_count: usize,
    pub chunk_count: usize,
    pub skipped: usize,
    /// Chunks recovered from a checkpoint instead of re-embedded.
    pub resumed: usize,
}

pub struct Indexer<'a> {
    pub embedder: &'a dyn Embedder,
    pub config: &'a Config,
}

impl<'a> Indexer<'a> {
    pub fn new(embedder: &'a dyn Embedder, config: &'a Config) -> Self {
        Self { embedder, config }
    }

    /// Build a fresh index of `root` and commit it to `out_path`.
    ///
    /// An interrupted build resumes from `out_path`'s checkpoint file. The
    /// checkpoint is removed only once the index has been committed.
    pub fn index_source(&self, root: &Path, out_path: &Path) -> Result<IndexReport> {
        let started = Utc::now();
        if !root.is_dir() {
            return Err(Error::SourceNotFound(root.to_path_buf()));
        }

        let loaded = self.config.loader().load_dir(root)?;
        let chunks = chunk_documents(&loaded.documents, self.config.chunk_size);
        info!(
            "Created {} chunks from {} documents",
            chunks.len(),
            loaded.documents.len()
        );

        let checkpoint_path = paths::checkpoint_path(out_path);
        let embedded = checkpoint::embed_chunks(
            &chunks,
            self.embedder,
            &checkpoint_path,
            &EmbedOptions::from(self.config),
        )?;

        let mut store = embedded.store;
        let indexed_files = loaded.loaded_paths();
        store.metadata = StoreMetadata {
            indexed_at: Some(started),
            source_path: absolute(root).display().to_string(),
            file_count: indexed_files.len(),
            chunk_count: store.len(),
            indexed_files,
            skipped_files: loaded.skipped_files,
            last_commit: recorded_commit(root),
            review: false,
            embedding_model: Some(self.embedder.model_name().to_string()),
        };

        atomic_save(&store, out_path)?;
        checkpoint::clear_checkpoint(&checkpoint_path);

        info!(
            "Indexed {} files into {} ({} chunks)",
            store.metadata.file_count,
            out_path.display(),
            store.len()
        );

        Ok(IndexReport {
            path: out_path.to_path_buf(),
            file_count: store.metadata.file_count,
            chunk_count: store.len(),
            skipped: store.metadata.skipped_files.len(),
            resumed: embedded.resumed,
        })
    }
}

/// Chunk every document, in order.
pub fn chunk_documents(documents: &[Document], max_chunk_size: usize) -> Vec<Chunk> {
    documents
        .iter()
        .flat_map(|doc| chunker::chunk_document(doc, max_chunk_size))
        .collect()
}

/// HEAD of the source checkout, if it is one.
pub(crate) fn recorded_commit(root: &Path) -> Option<String> {
    if !git::is_git_repo(root) {
        return None;
    }
    match git::head_commit(root) {
        Ok(commit) => {
            debug!("Recording commit {commit}");
            Some(commit)
        }
        Err(e) => {
            // Unborn branch: no commit to record yet
            warn!("Could not read HEAD of {}: {e}", root.display());
            None
        }
    }
}

pub(crate) fn absolute(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
