//! Shared, swappable store for long-lived query serving.
//!
//! The lock guards only the `Arc` pointer. A reload builds a complete
//! `MultiSourceStore` off to the side and swaps it in, so a reader holds
//! either the whole old store or the whole new one.
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::error::{Error, Result};
use crate::provider::Embedder;
use crate::store::{MultiSourceStore, SourcedResult};

/// A strongly typed retrieval request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub text: String,
    pub top_k: usize,
    /// Source names to search; empty means all.
    pub sources: Vec<String>,
}

impl Query {
    pub fn new(text: impl Into<String>, top_k: usize) -> Self {
        Self {
            text: text.into(),
            top_k,
            sources: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_sources(mut self, sources: Vec<String>) -> Self {
        self.sources = sources;
        self
    }
}

#[derive(Clone, Default)]
pub struct StoreHandle {
    inner: Arc<RwLock<Arc<MultiSourceStore>>>,
}

impl StoreHandle {
    pub fn new(store: MultiSourceStore) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(store))),
        }
    }

    /// Load every source under `dir` and wrap the result.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self::new(load_off_path(dir.into()).await?))
    }

    /// The current store; unaffected by later swaps.
    pub async fn snapshot(&self) -> Arc<MultiSourceStore> {
        Arc::clone(&*self.inner.read().await)
    }

    /// Replace the store, returning the previous one.
    pub async fn swap(&self, store: MultiSourceStore) -> Arc<MultiSourceStore> {
        let mut guard = self.inner.write().await;
        std::mem::replace(&mut *guard, Arc::new(store))
    }

    /// Rebuild from the current store's directory and swap the result in.
    ///
    /// On failure the current store stays in place.
    pub async fn reload(&self) -> Result<()> {
        let dir = self.snapshot().await.base_dir().to_path_buf();
        let fresh = load_off_path(dir).await?;
        let sources = fresh.len();
        self.swap(fresh).await;
        info!("Reloaded store handle ({sources} sources)");
        Ok(())
    }

    /// Embed the query text and search the current snapshot.
    ///
    /// Embedding runs on the blocking pool, so a provider doing network I/O
    /// does not stall the runtime.
    pub async fn query<E>(&self, query: &Query, embedder: &Arc<E>) -> Result<Vec<SourcedResult>>
    where
        E: Embedder + ?Sized + 'static,
    {
        let embedder = Arc::clone(embedder);
        let text = query.text.clone();
        let embedding = tokio::task::spawn_blocking(move || embedder.embed(&text))
            .await?
            .map_err(|source| Error::Provider {
                chunk_index: 0,
                bytes: query.text.len(),
                source,
            })?;
        let store = self.snapshot().await;
        Ok(store.search(&embedding, query.top_k, &query.sources))
    }
}

async fn load_off_path(dir: PathBuf) -> Result<MultiSourceStore> {
    tokio::task::spawn_blocking(move || MultiSourceStore::open(dir)).await?
}
