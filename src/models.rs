//! Documents, chunks and skipped-file records.
//!
//! Field aliases accept the capitalised keys written by older `lr` builds,
//! so legacy index files still load.
use serde::{Deserialize, Deserializer, Serialize};

/// One loaded source file (or one part of a split large file).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub content: String,
    /// Relative path, or `"path (part N)"` for split large files.
    pub source: String,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DocumentMetadata {
    /// Type tag driving the chunking strategy (`markdown`, `go`, `text`, ...).
    pub doc_type: String,
    pub path: String,
    pub part: Option<usize>,
}

impl Document {
    pub fn new(content: impl Into<String>, path: impl Into<String>, doc_type: &str) -> Self {
        let path = path.into();
        Self {
            content: content.into(),
            source: path.clone(),
            metadata: DocumentMetadata {
                doc_type: doc_type.to_string(),
                path,
                part: None,
            },
        }
    }

    /// Build one part of a split large file.
    pub fn part(content: impl Into<String>, path: &str, doc_type: &str, part: usize) -> Self {
        Self {
            content: content.into(),
            source: format!("{path} (part {part})"),
            metadata: DocumentMetadata {
                doc_type: doc_type.to_string(),
                path: path.to_string(),
                part: Some(part),
            },
        }
    }
}

/// Bounded text unit; the atomic unit of embedding and retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    #[serde(alias = "Text")]
    pub text: String,
    #[serde(alias = "Source")]
    pub source: String,
    #[serde(alias = "Metadata", default, deserialize_with = "nullable")]
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(default)]
    pub source: String,
    #[serde(rename = "type", default)]
    pub doc_type: String,
    /// `"i"` for a whole section, `"i.j"` for sub-chunk `j` of section `i`.
    #[serde(default)]
    pub chunk_index: String,
}

/// A file left out of the index, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: String,
    /// e.g. "too large (150KB, max 100KB)", "test file", "wrong extension (.png)"
    pub reason: String,
    #[serde(default)]
    pub size: u64,
}

/// Strip the `" (part N)"` suffix of a split-file source, yielding the file path.
#[must_use]
pub fn source_path(source: &str) -> &str {
    match source.rfind(" (part ") {
        Some(idx) if source.ends_with(')') => &source[..idx],
        _ => source,
    }
}

/// Deserialize `null` as the type's default (older writers emitted `null` for empty lists).
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
