//! In-memory vector store: chunks, parallel embeddings and index metadata.
//!
//! `chunks[i]` and `embeddings[i]` always describe the same chunk; every
//! mutation goes through `add`/`remove_by_source`, which keep the arrays
//! aligned.
pub mod multi;
pub mod persist;

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Chunk, SkippedFile, nullable};

pub use multi::{MultiSourceStore, SourcedResult};
pub use persist::{atomic_save, atomic_save_expecting};

/// Index-level bookkeeping persisted alongside the chunks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreMetadata {
    #[serde(alias = "IndexedAt", default, with = "indexed_at")]
    pub indexed_at: Option<DateTime<Utc>>,
    #[serde(alias = "SourcePath", default)]
    pub source_path: String,
    #[serde(alias = "FileCount", default)]
    pub file_count: usize,
    #[serde(alias = "ChunkCount", default)]
    pub chunk_count: usize,
    #[serde(alias = "IndexedFiles", default, deserialize_with = "nullable")]
    pub indexed_files: Vec<String>,
    #[serde(alias = "SkippedFiles", default, deserialize_with = "nullable")]
    pub skipped_files: Vec<SkippedFile>,
    #[serde(
        alias = "LastCommit",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub last_commit: Option<String>,
    #[serde(alias = "Review", default, skip_serializing_if = "std::ops::Not::not")]
    pub review: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
}

/// `IndexedAt` as RFC 3339; older writers stored the zero value as "".
mod indexed_at {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(ts) => serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") | Some("0001-01-01T00:00:00Z") => Ok(None),
            Some(s) => DateTime::parse_from_rfc3339(s)
                .map(|ts| Some(ts.with_timezone(&Utc)))
                .map_err(serde::de::Error::custom),
        }
    }
}

/// A chunk ranked against a query.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub chunk: Chunk,
    pub similarity: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VectorStore {
    #[serde(alias = "Chunks", default, deserialize_with = "nullable")]
    chunks: Vec<Chunk>,
    #[serde(alias = "Embeddings", default, deserialize_with = "nullable")]
    embeddings: Vec<Vec<f32>>,
    #[serde(alias = "Metadata", default, deserialize_with = "nullable")]
    pub metadata: StoreMetadata,
}

impl VectorStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and its embedding. Dimensions are not validated.
    pub fn add(&mut self, chunk: Chunk, embedding: Vec<f32>) {
        self.chunks.push(chunk);
        self.embeddings.push(embedding);
    }

    /// Move every pair of `other` to the end of this store; metadata is kept.
    pub fn append(&mut self, other: VectorStore) {
        self.chunks.extend(other.chunks);
        self.embeddings.extend(other.embeddings);
    }

    #[must_use]
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    #[must_use]
    pub fn embeddings(&self) -> &[Vec<f32>] {
        &self.embeddings
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Rank every chunk by cosine similarity and keep the best `top_k`.
    #[must_use]
    pub fn search(&self, query: &[f32], top_k: usize) -> Vec<SearchResult> {
        let mut scored: Vec<(usize, f32)> = self
            .embeddings
            .iter()
            .enumerate()
            .map(|(i, emb)| (i, cosine_similarity(query, emb)))
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);

        scored
            .into_iter()
            .map(|(i, similarity)| SearchResult {
                chunk: self.chunks[i].clone(),
                similarity,
            })
            .collect()
    }

    /// Remove every chunk whose source is in `sources`. Returns the removed count.
    pub fn remove_by_source<S: AsRef<str>>(&mut self, sources: &[S]) -> usize {
        let drop: HashSet<&str> = sources.iter().map(AsRef::as_ref).collect();
        if !self.chunks.iter().any(|c| drop.contains(c.source.as_str())) {
            return 0;
        }

        let before = self.chunks.len();
        let (chunks, embeddings): (Vec<_>, Vec<_>) = std::mem::take(&mut self.chunks)
            .into_iter()
            .zip(std::mem::take(&mut self.embeddings))
            .filter(|(chunk, _)| !drop.contains(chunk.source.as_str()))
            .unzip();
        self.chunks = chunks;
        self.embeddings = embeddings;
        before - self.chunks.len()
    }

    /// Distinct chunk sources, sorted.
    #[must_use]
    pub fn sources(&self) -> BTreeSet<&str> {
        self.chunks.iter().map(|c| c.source.as_str()).collect()
    }
}

/// `dot(a, b) / (|a| * |b|)`; 0 when either norm is 0 or dimensions differ.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())) as f32
}
