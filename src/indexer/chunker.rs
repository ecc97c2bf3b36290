//! Turns one `Document` into bounded, source-tagged `Chunk`s.
use super::code::{Paragraphs, SectionSplitter};
use super::languages::LanguageConfig;
use super::split::{split_by_lines, split_by_paragraphs};
use crate::models::{Chunk, ChunkMetadata, Document};

/// Sections shorter than this (trimmed, in chars) are dropped as noise.
pub const MIN_SECTION_CHARS: usize = 50;
/// Token estimate (bytes / 4) above which a section is cut by lines.
pub const MAX_SECTION_TOKENS: usize = 5000;
/// Byte budget of each line-based piece (~4000 tokens).
pub const LINE_SPLIT_SIZE: usize = 16_000;

/// Split `doc` into chunks of roughly `max_chunk_size` bytes.
///
/// The strategy is picked by `doc.metadata.doc_type`. Every chunk inherits
/// `doc.source`; `chunk_index` is `"i"` for a whole section and `"i.j"` for
/// piece `j` of section `i`.
#[must_use]
pub fn chunk_document(doc: &Document, max_chunk_size: usize) -> Vec<Chunk> {
    let doc_type = doc.metadata.doc_type.as_str();
    let splitter: &dyn SectionSplitter = match LanguageConfig::get_by_name(doc_type) {
        Some(lang) => lang,
        None => &Paragraphs,
    };
    let sections = splitter.split_sections(&doc.content, max_chunk_size);

    let make = |text: String, chunk_index: String| Chunk {
        text,
        source: doc.source.clone(),
        metadata: ChunkMetadata {
            source: doc.source.clone(),
            doc_type: doc_type.to_string(),
            chunk_index,
        },
    };

    let mut chunks = Vec::new();
    for (i, section) in sections.into_iter().enumerate() {
        if section.trim().chars().count() < MIN_SECTION_CHARS {
            continue;
        }

        if section.len() / 4 > MAX_SECTION_TOKENS {
            // Oversized function or minified blob
            for (j, piece) in split_by_lines(&section, LINE_SPLIT_SIZE).into_iter().enumerate() {
                chunks.push(make(piece, format!("{i}.{j}")));
            }
        } else if section.len() <= max_chunk_size {
            chunks.push(make(section, i.to_string()));
        } else {
            for (j, piece) in split_by_paragraphs(&section, max_chunk_size)
                .into_iter()
                .enumerate()
            {
                chunks.push(make(piece, format!("{i}.{j}")));
            }
        }
    }

    chunks
}
