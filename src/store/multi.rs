//! Named aggregation of many `VectorStore`s for cross-corpus search.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info};

use super::{VectorStore, atomic_save};
use crate::error::Result;
use crate::models::Chunk;
use crate::paths;

/// A search hit tagged with the source it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcedResult {
    pub source_name: String,
    pub chunk: Chunk,
    pub similarity: f32,
}

/// name → store, populated from a directory of index files.
#[derive(Debug, Default)]
pub struct MultiSourceStore {
    base_dir: PathBuf,
    sources: BTreeMap<String, VectorStore>,
}

impl MultiSourceStore {
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            sources: BTreeMap::new(),
        }
    }

    /// Open `base_dir` and load the latest index of every source found there.
    pub fn open(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let mut multi = Self::new(base_dir);
        multi.load_all()?;
        Ok(multi)
    }

    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Load the most recent index for each source name in the directory.
    ///
    /// A missing directory yields an empty store; an unreadable index aborts.
    pub fn load_all(&mut self) -> Result<()> {
        if !self.base_dir.is_dir() {
            debug!("Index directory {} does not exist", self.base_dir.display());
            return Ok(());
        }

        // Sorted, so the last file per name is the most recent snapshot
        let mut latest: BTreeMap<String, PathBuf> = BTreeMap::new();
        for path in paths::list_indexes(&self.base_dir)? {
            if let Some(name) = paths::source_name_of(&path) {
                latest.insert(name, path);
            }
        }

        for (name, path) in latest {
            let store = VectorStore::load(&path)?;
            debug!("Loaded source '{name}' ({} chunks)", store.len());
            self.sources.insert(name, store);
        }

        info!("Loaded {} sources from {}", self.sources.len(), self.base_dir.display());
        Ok(())
    }

    /// Load (or reload) a single source by name.
    pub fn load_source(&mut self, name: &str) -> Result<&VectorStore> {
        let path = paths::find_latest_index(&self.base_dir, name)?;
        let store = VectorStore::load(&path)?;
        let slot = self.sources.entry(name.to_string()).or_default();
        *slot = store;
        Ok(&*slot)
    }

    pub fn insert(&mut self, name: impl Into<String>, store: VectorStore) {
        self.sources.insert(name.into(), store);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&VectorStore> {
        self.sources.get(name)
    }

    /// Global top-k across `names` (every loaded source when empty).
    ///
    /// Unknown names are skipped.
    #[must_use]
    pub fn search<S: AsRef<str>>(
        &self,
        query: &[f32],
        top_k: usize,
        names: &[S],
    ) -> Vec<SourcedResult> {
        let selected: Vec<(&String, &VectorStore)> = if names.is_empty() {
            self.sources.iter().collect()
        } else {
            names
                .iter()
                .filter_map(|n| self.sources.get_key_value(n.as_ref()))
                .collect()
        };

        let mut results: Vec<SourcedResult> = selected
            .into_iter()
            .flat_map(|(name, store)| {
                store
                    .search(query, top_k)
                    .into_iter()
                    .map(move |r| SourcedResult {
                        source_name: name.clone(),
                        chunk: r.chunk,
                        similarity: r.similarity,
                    })
            })
            .collect();

        results.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        results.truncate(top_k);
        results
    }

    /// Loaded source names, sorted.
    #[must_use]
    pub fn list_sources(&self) -> Vec<String> {
        self.sources.keys().cloned().collect()
    }

    /// name → chunk count.
    #[must_use]
    pub fn source_stats(&self) -> BTreeMap<String, usize> {
        self.sources
            .iter()
            .map(|(name, store)| (name.clone(), store.len()))
            .collect()
    }

    /// Write `store` as today's snapshot for `name` and keep it loaded.
    pub fn save_source(&mut self, name: &str, store: VectorStore) -> Result<PathBuf> {
        let path = paths::dated_index_file(&self.base_dir, name, Utc::now().date_naive());
        atomic_save(&store, &path)?;
        info!("Saved source '{name}' to {}", path.display());
        self.sources.insert(name.to_string(), store);
        Ok(path)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Whether an authoritative index for `name` exists in `dir`.
#[must_use]
pub fn source_exists(dir: &Path, name: &str) -> bool {
    paths::find_latest_index(dir, name).is_ok()
}
