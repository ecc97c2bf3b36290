//! Durable save/load of a `VectorStore` and the atomic commit protocol.
//!
//! `.lrindex` files are gzip-compressed JSON; any other suffix is written as
//! plain JSON. Loading trusts the suffix first and falls back to sniffing the
//! gzip magic bytes, so renamed files still open.
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Read};
use std::path::Path;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use tracing::{debug, warn};

use super::VectorStore;
use crate::error::{Error, Result};
use crate::paths;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

impl VectorStore {
    /// Serialize to `path`, compressing when the suffix says so.
    ///
    /// Returns only after the file contents have been synced to disk.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::persistence(parent, e))?;
        }

        let file = File::create(path).map_err(|e| Error::persistence(path, e))?;
        let mut writer = BufWriter::new(file);

        if paths::is_compressed(path) {
            let mut encoder = GzEncoder::new(&mut writer, Compression::default());
            serde_json::to_writer(&mut encoder, self)
                .map_err(|e| Error::persistence(path, e.into()))?;
            encoder.finish().map_err(|e| Error::persistence(path, e))?;
        } else {
            serde_json::to_writer(&mut writer, self)
                .map_err(|e| Error::persistence(path, e.into()))?;
        }

        let file = writer
            .into_inner()
            .map_err(|e| Error::persistence(path, e.into_error()))?;
        file.sync_all().map_err(|e| Error::persistence(path, e))?;

        debug!("Saved {} chunks to {}", self.len(), path.display());
        Ok(())
    }

    /// Load a store written by `save` (or by older plain-JSON writers).
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::persistence(path, e))?;
        let mut reader = BufReader::new(file);

        let compressed = if paths::is_compressed(path) {
            true
        } else {
            // Peek without consuming
            let head = reader.fill_buf().map_err(|e| Error::persistence(path, e))?;
            head.starts_with(&GZIP_MAGIC)
        };

        let mut data = Vec::new();
        if compressed {
            GzDecoder::new(reader)
                .read_to_end(&mut data)
                .map_err(|e| Error::persistence(path, e))?;
        } else {
            reader
                .read_to_end(&mut data)
                .map_err(|e| Error::persistence(path, e))?;
        }

        let store: VectorStore = serde_json::from_slice(&data).map_err(|e| Error::Corrupt {
            path: path.to_path_buf(),
            source: e,
        })?;

        if store.chunks.len() != store.embeddings.len() {
            return Err(Error::Validation {
                path: path.to_path_buf(),
                reason: format!(
                    "{} chunks but {} embeddings",
                    store.chunks.len(),
                    store.embeddings.len()
                ),
            });
        }

        Ok(store)
    }
}

/// Commit `store` to `final_path` via temp file, reload check and rename.
pub fn atomic_save(store: &VectorStore, final_path: &Path) -> Result<()> {
    atomic_save_expecting(store, final_path, store.len())
}

/// Like [`atomic_save`], but the reloaded temp file must hold exactly
/// `expected_chunks` chunks (and as many as `store`). On any failure the
/// temp file is removed and `final_path` is left untouched.
pub fn atomic_save_expecting(
    store: &VectorStore,
    final_path: &Path,
    expected_chunks: usize,
) -> Result<()> {
    let temp = paths::temp_path(final_path);

    let result = write_and_verify(store, &temp, expected_chunks)
        .and_then(|()| fs::rename(&temp, final_path).map_err(|e| Error::persistence(final_path, e)));

    if let Err(e) = result {
        if temp.exists() {
            if let Err(rm) = fs::remove_file(&temp) {
                warn!("Failed to remove temp file {}: {rm}", temp.display());
            }
        }
        return Err(e);
    }

    sync_parent_dir(final_path);
    Ok(())
}

fn write_and_verify(store: &VectorStore, temp: &Path, expected_chunks: usize) -> Result<()> {
    store.save(temp)?;

    let reloaded = VectorStore::load(temp).map_err(|e| Error::Validation {
        path: temp.to_path_buf(),
        reason: format!("temp file failed to reload: {e}"),
    })?;

    if reloaded.len() != expected_chunks || reloaded.len() != store.len() {
        return Err(Error::Validation {
            path: temp.to_path_buf(),
            reason: format!(
                "chunk count mismatch: reloaded {}, expected {expected_chunks}, in memory {}",
                reloaded.len(),
                store.len()
            ),
        });
    }
    Ok(())
}

/// Persist the rename itself; failures here are not fatal.
#[cfg(unix)]
fn sync_parent_dir(path: &Path) {
    let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return;
    };
    if let Err(e) = File::open(parent).and_then(|dir| dir.sync_all()) {
        warn!("Failed to sync directory {}: {e}", parent.display());
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Chunk, ChunkMetadata, SkippedFile};
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn sample_store() -> VectorStore {
        let mut store = VectorStore::new();
        for i in 0..3 {
            let source = format!("doc{i}.md");
            store.add(
                Chunk {
                    text: format!("chunk number {i} with some text"),
                    source: source.clone(),
                    metadata: ChunkMetadata {
                        source,
                        doc_type: "markdown".to_string(),
                        chunk_index: i.to_string(),
                    },
                },
                vec![0.1 * i as f32, 0.333_333_34, -1.0e-7, f32::MAX],
            );
        }
        store.metadata.indexed_at = Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 45).unwrap());
        store.metadata.source_path = "/src/docs".to_string();
        store.metadata.file_count = 3;
        store.metadata.chunk_count = 3;
        store.metadata.indexed_files = vec!["doc0.md".into(), "doc1.md".into(), "doc2.md".into()];
        store.metadata.skipped_files = vec![SkippedFile {
            path: "big.md".to_string(),
            reason: "too large (150KB, max 100KB)".to_string(),
            size: 153_600,
        }];
        store.metadata.last_commit = Some("abc123".to_string());
        store.metadata.embedding_model = Some("mock".to_string());
        store
    }

    #[test]
    fn test_round_trip_compressed_and_plain() {
        let dir = TempDir::new().unwrap();
        let store = sample_store();

        for name in ["docs.lrindex", "docs.json"] {
            let path = dir.path().join(name);
            store.save(&path).unwrap();
            let loaded = VectorStore::load(&path).unwrap();
            assert_eq!(loaded.chunks(), store.chunks());
            assert_eq!(loaded.embeddings(), store.embeddings());
            assert_eq!(loaded.metadata, store.metadata);
        }

        let raw = fs::read(dir.path().join("docs.lrindex")).unwrap();
        assert_eq!(&raw[..2], &GZIP_MAGIC);
        let raw = fs::read(dir.path().join("docs.json")).unwrap();
        assert_eq!(raw[0], b'{');
    }

    #[test]
    fn test_load_sniffs_gzip_without_suffix() {
        let dir = TempDir::new().unwrap();
        let store = sample_store();
        let compressed = dir.path().join("docs.lrindex");
        store.save(&compressed).unwrap();

        let renamed = dir.path().join("docs.bak");
        fs::rename(&compressed, &renamed).unwrap();
        let loaded = VectorStore::load(&renamed).unwrap();
        assert_eq!(loaded.len(), 3);
    }

    #[test]
    fn test_load_legacy_capitalized_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("legacy.json");
        fs::write(
            &path,
            r#"{"Chunks":[{"Text":"hello","Source":"a.md","Metadata":{"source":"a.md","type":"markdown","chunk_index":"0"}}],
               "Embeddings":[[1.0,0.0]],
               "Metadata":{"IndexedAt":"2024-01-15T10:00:00Z","SourcePath":"/docs","FileCount":1,"ChunkCount":1,"IndexedFiles":["a.md"]}}"#,
        )
        .unwrap();

        let store = VectorStore::load(&path).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.metadata.indexed_files, vec!["a.md"]);
        assert!(store.metadata.indexed_at.is_some());
    }

    #[test]
    fn test_load_rejects_misaligned_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(
            &path,
            r#"{"chunks":[{"text":"a","source":"a.md"}],"embeddings":[],"metadata":{}}"#,
        )
        .unwrap();
        assert!(matches!(
            VectorStore::load(&path),
            Err(Error::Validation { .. })
        ));

        fs::write(&path, "not json").unwrap();
        assert!(matches!(VectorStore::load(&path), Err(Error::Corrupt { .. })));
    }

    #[test]
    fn test_atomic_save_replaces_final() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("docs.lrindex");
        atomic_save(&VectorStore::new(), &path).unwrap();
        atomic_save(&sample_store(), &path).unwrap();

        assert_eq!(VectorStore::load(&path).unwrap().len(), 3);
        assert!(!paths::temp_path(&path).exists());
    }

    #[test]
    fn test_atomic_save_mismatch_leaves_previous_index_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("docs_20240101.lrindex");

        let mut previous = sample_store();
        previous.remove_by_source(&["doc2.md"]);
        previous.save(&path).unwrap();
        let before = fs::read(&path).unwrap();

        let err = atomic_save_expecting(&sample_store(), &path, 99).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }), "{err}");

        assert_eq!(fs::read(&path).unwrap(), before);
        assert!(!paths::temp_path(&path).exists());
    }
}
