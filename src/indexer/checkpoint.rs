//! Sequential, checkpointed embedding of a chunk list.
//!
//! The checkpoint file holds only the pairs embedded by the current run, in
//! chunk order, so its length is the resume position. Before a checkpoint is
//! trusted its chunks must equal the head of the freshly produced list;
//! otherwise it is discarded and embedding restarts from the first chunk.
use std::fs;
use std::path::Path;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::Chunk;
use crate::provider::Embedder;
use crate::store::VectorStore;

#[derive(Debug, Clone)]
pub struct EmbedOptions {
    /// Chunks embedded between checkpoint writes.
    pub checkpoint_interval: usize,
    /// Pause between consecutive provider calls.
    pub delay: Duration,
    pub show_progress: bool,
}

impl Default for EmbedOptions {
    fn default() -> Self {
        Self {
            checkpoint_interval: 100,
            delay: Duration::from_millis(50),
            show_progress: false,
        }
    }
}

impl From<&Config> for EmbedOptions {
    fn from(cfg: &Config) -> Self {
        Self {
            checkpoint_interval: cfg.checkpoint_interval.max(1),
            delay: cfg.embed_delay(),
            show_progress: cfg.show_progress,
        }
    }
}

/// Result of [`embed_chunks`].
#[derive(Debug)]
pub struct Embedded {
    /// Every input chunk paired with its embedding, in input order.
    pub store: VectorStore,
    /// Chunks taken from the checkpoint instead of the provider.
    pub resumed: usize,
}

/// Embed `chunks` one at a time, checkpointing progress to `checkpoint_path`.
///
/// On a provider failure the progress so far is checkpointed and the error
/// is returned with the failing chunk's index and size. The checkpoint file
/// is left in place on success; the caller deletes it after committing.
pub fn embed_chunks(
    chunks: &[Chunk],
    embedder: &dyn Embedder,
    checkpoint_path: &Path,
    opts: &EmbedOptions,
) -> Result<Embedded> {
    let mut store = resume_from_checkpoint(chunks, checkpoint_path);
    let start = store.len();
    if start > 0 {
        info!("Resuming from chunk {start}/{}", chunks.len());
    }

    let progress = progress_bar(opts.show_progress, chunks.len() - start, start > 0);
    let interval = opts.checkpoint_interval.max(1);

    for (i, chunk) in chunks.iter().enumerate().skip(start) {
        if i > start && !opts.delay.is_zero() {
            std::thread::sleep(opts.delay);
        }

        let embedding = match embedder.embed(&chunk.text) {
            Ok(e) => e,
            Err(source) => {
                progress.abandon();
                if store.len() > start {
                    write_checkpoint(&store, checkpoint_path);
                }
                return Err(Error::Provider {
                    chunk_index: i,
                    bytes: chunk.text.len(),
                    source,
                });
            }
        };

        store.add(chunk.clone(), embedding);
        progress.inc(1);

        if (i + 1) % interval == 0 {
            write_checkpoint(&store, checkpoint_path);
        }
    }

    progress.finish_and_clear();
    Ok(Embedded {
        store,
        resumed: start,
    })
}

/// Remove the checkpoint after a successful commit.
pub fn clear_checkpoint(checkpoint_path: &Path) {
    if checkpoint_path.exists() {
        match fs::remove_file(checkpoint_path) {
            Ok(()) => debug!("Removed checkpoint {}", checkpoint_path.display()),
            Err(e) => warn!(
                "Failed to remove checkpoint {}: {e}",
                checkpoint_path.display()
            ),
        }
    }
}

fn resume_from_checkpoint(chunks: &[Chunk], checkpoint_path: &Path) -> VectorStore {
    if !checkpoint_path.exists() {
        return VectorStore::new();
    }

    info!("Found checkpoint {}", checkpoint_path.display());
    let checkpoint = match VectorStore::load(checkpoint_path) {
        Ok(cp) => cp,
        Err(e) => {
            warn!("Could not load checkpoint, starting over: {e}");
            return VectorStore::new();
        }
    };

    let matches = checkpoint.len() <= chunks.len()
        && checkpoint
            .chunks()
            .iter()
            .zip(chunks)
            .all(|(saved, fresh)| saved.text == fresh.text && saved.source == fresh.source);

    if matches {
        checkpoint
    } else {
        warn!(
            "Checkpoint {} does not match the current chunks, discarding it",
            checkpoint_path.display()
        );
        clear_checkpoint(checkpoint_path);
        VectorStore::new()
    }
}

fn write_checkpoint(store: &VectorStore, checkpoint_path: &Path) {
    match store.save(checkpoint_path) {
        Ok(()) => info!("Checkpoint saved ({} chunks)", store.len()),
        Err(e) => warn!("Failed to save checkpoint: {e}"),
    }
}

fn progress_bar(enabled: bool, len: usize, resuming: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("  {msg} {bar:40.cyan/blue} {pos}/{len} chunks ({per_sec})")
    {
        pb.set_style(style.progress_chars("█▓░"));
    }
    pb.set_message(if resuming {
        "resuming embeddings"
    } else {
        "generating embeddings"
    });
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMetadata;
    use crate::provider::ProviderError;
    use crate::provider::mock::MockEmbedder;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn chunks(n: usize) -> Vec<Chunk> {
        (0..n)
            .map(|i| Chunk {
                text: format!("chunk body {i}"),
                source: format!("file{}.md", i / 3),
                metadata: ChunkMetadata {
                    source: format!("file{}.md", i / 3),
                    doc_type: "markdown".to_string(),
                    chunk_index: (i % 3).to_string(),
                },
            })
            .collect()
    }

    /// Fails once `fail_at` calls have succeeded.
    struct FlakyEmbedder {
        inner: MockEmbedder,
        calls: AtomicUsize,
        fail_at: usize,
    }

    impl FlakyEmbedder {
        fn new(fail_at: usize) -> Self {
            Self {
                inner: MockEmbedder::new(8),
                calls: AtomicUsize::new(0),
                fail_at,
            }
        }
    }

    impl Embedder for FlakyEmbedder {
        fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, ProviderError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) >= self.fail_at {
                return Err(ProviderError::RateLimited("quota exceeded".to_string()));
            }
            self.inner.embed(text)
        }

        fn dimensions(&self) -> usize {
            self.inner.dimensions()
        }

        fn model_name(&self) -> &str {
            "mock"
        }
    }

    fn opts(interval: usize) -> EmbedOptions {
        EmbedOptions {
            checkpoint_interval: interval,
            delay: Duration::ZERO,
            show_progress: false,
        }
    }

    #[test]
    fn test_uninterrupted_run() {
        let dir = TempDir::new().unwrap();
        let cp = dir.path().join("idx.checkpoint.lrindex");
        let input = chunks(7);

        let out = embed_chunks(&input, &MockEmbedder::new(8), &cp, &opts(3)).unwrap();
        assert_eq!(out.store.len(), 7);
        assert_eq!(out.resumed, 0);
        assert_eq!(out.store.chunks(), input.as_slice());
        // Last periodic checkpoint was after chunk 6
        assert_eq!(VectorStore::load(&cp).unwrap().len(), 6);
    }

    #[test]
    fn test_resume_after_provider_failure() {
        let dir = TempDir::new().unwrap();
        let cp = dir.path().join("idx.checkpoint.lrindex");
        let input = chunks(10);

        let err = embed_chunks(&input, &FlakyEmbedder::new(5), &cp, &opts(2)).unwrap_err();
        match err {
            Error::Provider { chunk_index, bytes, .. } => {
                assert_eq!(chunk_index, 5);
                assert_eq!(bytes, input[5].text.len());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(VectorStore::load(&cp).unwrap().len(), 5);

        let resumed = embed_chunks(&input, &MockEmbedder::new(8), &cp, &opts(2)).unwrap();
        assert_eq!(resumed.resumed, 5);

        let dir2 = TempDir::new().unwrap();
        let fresh = embed_chunks(
            &input,
            &MockEmbedder::new(8),
            &dir2.path().join("x.checkpoint.lrindex"),
            &opts(2),
        )
        .unwrap();
        assert_eq!(resumed.store.len(), fresh.store.len());
        assert_eq!(resumed.store.chunks(), fresh.store.chunks());
        assert_eq!(resumed.store.embeddings(), fresh.store.embeddings());
    }

    #[test]
    fn test_mismatched_checkpoint_is_discarded() {
        let dir = TempDir::new().unwrap();
        let cp = dir.path().join("idx.checkpoint.lrindex");

        let mut stale = VectorStore::new();
        for chunk in chunks(4).into_iter().rev() {
            stale.add(chunk, vec![0.0; 8]);
        }
        stale.save(&cp).unwrap();

        let input = chunks(4);
        let out = embed_chunks(&input, &MockEmbedder::new(8), &cp, &opts(100)).unwrap();
        assert_eq!(out.resumed, 0);
        assert_eq!(out.store.chunks(), input.as_slice());
        assert!(out.store.embeddings().iter().all(|e| e.iter().any(|v| *v != 0.0)));
    }

    #[test]
    fn test_clear_checkpoint() {
        let dir = TempDir::new().unwrap();
        let cp = dir.path().join("idx.checkpoint.json");
        VectorStore::new().save(&cp).unwrap();
        clear_checkpoint(&cp);
        assert!(!cp.exists());
        clear_checkpoint(&cp);
    }
}
